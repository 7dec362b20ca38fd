//! Outbound stat messages.
//!
//! Builders consume the engine's lazy row stream (the single pass over the
//! ranked result) and package rows into the JSON payloads the downstream
//! notification queue expects. Delivery goes through a pluggable
//! [`MessageSink`]; only stdout and an append-mode JSON-lines file ship here,
//! the production broker lives behind the same trait elsewhere.
//!
//! Null columns are omitted from row objects (Arrow's JSON writer default),
//! so e.g. an artist without an MBID simply has no `artist_mbid` key.

use async_trait::async_trait;
use datafusion::arrow::error::ArrowError;
use datafusion::arrow::json::ArrayWriter;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::error::DataFusionError;
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::engine::GeneratedStats;
use crate::models::Entity;

/// Errors while draining result rows into messages.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Failed to read result rows: {0}")]
    Query(#[from] DataFusionError),

    #[error("Failed to serialize result rows: {0}")]
    Arrow(#[from] ArrowError),

    #[error("Failed to decode result rows: {0}")]
    Json(#[from] serde_json::Error),
}

/// A single outbound message for the notification queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsMessage {
    #[serde(rename = "type")]
    pub message_type: String,

    pub stats_range: String,

    /// Window start, epoch seconds.
    pub from_ts: i64,

    /// Window end, epoch seconds.
    pub to_ts: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,

    pub data: Value,
}

/// Convert collected record batches into JSON row objects.
pub fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<Value>, MessageError> {
    let mut writer = ArrayWriter::new(Vec::new());
    for batch in batches {
        writer.write(batch)?;
    }
    writer.finish()?;

    let buf = writer.into_inner();
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(&buf)?)
}

/// Drain the lazy row stream into JSON rows.
pub async fn collect_rows(stats: GeneratedStats) -> Result<Vec<Value>, MessageError> {
    let batches: Vec<RecordBatch> = stats.rows.try_collect().await?;
    batches_to_rows(&batches)
}

/// Sitewide listening-activity message: `data` is the first result row's
/// nested histogram. Returns `None` when the run produced no rows.
pub async fn sitewide_listening_activity_message(
    stats: GeneratedStats,
    stats_range: &str,
) -> Result<Option<StatsMessage>, MessageError> {
    let from_ts = stats.from_date.timestamp();
    let to_ts = stats.to_date.timestamp();

    let rows = collect_rows(stats).await?;
    let Some(first) = rows.into_iter().next() else {
        return Ok(None);
    };
    let data = first
        .get("listening_activity")
        .cloned()
        .unwrap_or(Value::Null);

    Ok(Some(StatsMessage {
        message_type: "sitewide_listening_activity".to_string(),
        stats_range: stats_range.to_string(),
        from_ts,
        to_ts,
        entity: None,
        data,
    }))
}

/// Sitewide entity message: `data` is the full ranked list.
pub async fn sitewide_entity_message(
    stats: GeneratedStats,
    entity: Entity,
    stats_range: &str,
) -> Result<StatsMessage, MessageError> {
    let from_ts = stats.from_date.timestamp();
    let to_ts = stats.to_date.timestamp();
    let rows = collect_rows(stats).await?;

    Ok(StatsMessage {
        message_type: "sitewide_entity".to_string(),
        stats_range: stats_range.to_string(),
        from_ts,
        to_ts,
        entity: Some(entity.as_str().to_string()),
        data: Value::Array(rows),
    })
}

/// User entity message: one `data` element per user row.
pub async fn user_entity_message(
    stats: GeneratedStats,
    entity: Entity,
    stats_range: &str,
) -> Result<StatsMessage, MessageError> {
    let from_ts = stats.from_date.timestamp();
    let to_ts = stats.to_date.timestamp();
    let rows = collect_rows(stats).await?;

    Ok(StatsMessage {
        message_type: "user_entity".to_string(),
        stats_range: stats_range.to_string(),
        from_ts,
        to_ts,
        entity: Some(entity.as_str().to_string()),
        data: Value::Array(rows),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────────────────────────

/// Errors from message sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Message serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Destination for outbound messages.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send a batch of messages.
    ///
    /// Returns the number of messages successfully sent.
    async fn send_batch(&self, messages: &[StatsMessage]) -> Result<usize, SinkError>;

    /// Get the sink name for logging.
    fn name(&self) -> &'static str;
}

/// Writes messages as JSON lines to stdout.
pub struct StdoutSink;

#[async_trait]
impl MessageSink for StdoutSink {
    async fn send_batch(&self, messages: &[StatsMessage]) -> Result<usize, SinkError> {
        let mut stdout = tokio::io::stdout();
        for message in messages {
            let line = serde_json::to_string(message)?;
            stdout.write_all(line.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
        }
        stdout.flush().await?;
        Ok(messages.len())
    }

    fn name(&self) -> &'static str {
        "stdout"
    }
}

/// Appends messages as JSON lines to a file.
pub struct JsonLinesSink {
    path: String,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MessageSink for JsonLinesSink {
    async fn send_batch(&self, messages: &[StatsMessage]) -> Result<usize, SinkError> {
        if messages.is_empty() {
            return Ok(0);
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        for message in messages {
            let line = serde_json::to_string(message)?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        file.flush().await?;
        Ok(messages.len())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
