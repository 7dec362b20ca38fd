//! Outbound message sink configuration.

use serde::{Deserialize, Serialize};

/// Message sink backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SinkBackend {
    /// Write messages as JSON lines to stdout.
    #[default]
    Stdout,

    /// Append messages as JSON lines to a file.
    File,
}

/// Outbound message delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MessagingConfig {
    /// Sink backend to use.
    #[serde(default)]
    pub sink: SinkBackend,

    /// Output file for the `file` sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl MessagingConfig {
    /// Validate the messaging configuration.
    pub fn validate(&self) -> Result<(), String> {
        match self.sink {
            SinkBackend::Stdout => Ok(()),
            SinkBackend::File => {
                if self.path.as_deref().unwrap_or_default().is_empty() {
                    return Err(
                        "File sink requires [messaging] path to be set".to_string()
                    );
                }
                Ok(())
            }
        }
    }
}
