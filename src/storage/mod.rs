//! Pluggable storage client for engine-managed artifacts.
//!
//! The engine persists full aggregates and bookkeeping records, and probes
//! event dumps, through this client. The local filesystem implementation
//! covers single-node deployments and tests; a distributed deployment would
//! add an object-store implementation behind the same trait.
//!
//! Bulk tabular IO (Parquet scan/write) goes through DataFusion directly;
//! this client only handles existence checks, directory management and small
//! metadata files.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Filesystem-like operations the stats engine needs from its storage layer.
///
/// Implementations must be `Send + Sync` to support async contexts.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Whether a file or directory exists at `path`.
    async fn exists(&self, path: &str) -> StorageResult<bool>;

    /// Recursively create `path`. Idempotent.
    async fn makedirs(&self, path: &str) -> StorageResult<()>;

    /// Recursively remove `path`. Absence is not an error.
    async fn remove_all(&self, path: &str) -> StorageResult<()>;

    /// Read a small text artifact.
    async fn read_to_string(&self, path: &str) -> StorageResult<String>;

    /// Write a small text artifact, replacing any previous content.
    async fn write_string(&self, path: &str, contents: &str) -> StorageResult<()>;

    /// Get the backend type name (for logging/debugging).
    fn backend_name(&self) -> &'static str;
}

/// Local-filesystem storage client.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalStorageClient;

impl LocalStorageClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StorageClient for LocalStorageClient {
    async fn exists(&self, path: &str) -> StorageResult<bool> {
        tokio::fs::try_exists(path).await.map_err(|e| io_err(path, e))
    }

    async fn makedirs(&self, path: &str) -> StorageResult<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| io_err(path, e))
    }

    async fn remove_all(&self, path: &str) -> StorageResult<()> {
        match tokio::fs::remove_dir_all(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            // The target may be a plain file (e.g. a bookkeeping record).
            Err(_) => match tokio::fs::remove_file(path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(io_err(path, e)),
            },
        }
    }

    async fn read_to_string(&self, path: &str) -> StorageResult<String> {
        tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_err(path, e))
    }

    async fn write_string(&self, path: &str, contents: &str) -> StorageResult<()> {
        tokio::fs::write(path, contents)
            .await
            .map_err(|e| io_err(path, e))
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}

fn io_err(path: &str, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_string(),
        source,
    }
}
