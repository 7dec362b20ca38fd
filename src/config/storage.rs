//! Storage layout configuration.
//!
//! All engine-managed artifacts (full aggregates, bookkeeping records) and
//! the event dumps live under one base path:
//!
//! ```text
//! {base_path}/aggregates/{scope}/{entity}/{range}/   # Parquet directory
//! {base_path}/bookkeeping/{scope}/{entity}/{range}.json
//! {base_path}/listens/                               # full-history dump
//! {base_path}/incremental/listens/                   # incremental dump
//! ```

use serde::{Deserialize, Serialize};

/// Storage backend type.
///
/// Only the local filesystem ships today; a distributed deployment would add
/// an object-store backend behind the same [`crate::storage::StorageClient`]
/// trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Local,
}

/// Storage configuration for persisted aggregates and bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Storage backend to use.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Base directory for all engine-managed artifacts.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Create the base directory on startup if it doesn't exist.
    #[serde(default = "default_true")]
    pub create_dirs: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            base_path: default_base_path(),
            create_dirs: true,
        }
    }
}

impl StorageConfig {
    /// Validate the storage configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_path.is_empty() {
            return Err("Storage base_path cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Locations of the raw event datasets.
///
/// Both default to well-known paths under the storage base path.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// Full-history listen dump (Parquet directory).
    #[serde(default)]
    pub listens_path: Option<String>,

    /// Pre-seeded incremental listens (Parquet directory). Its presence is
    /// optional; the engine checks existence before reading.
    #[serde(default)]
    pub incremental_path: Option<String>,
}

impl EventsConfig {
    /// Full-history dump path, defaulting to `{base}/listens`.
    pub fn resolved_listens_path(&self, base: &str) -> String {
        self.listens_path
            .clone()
            .unwrap_or_else(|| format!("{}/listens", base.trim_end_matches('/')))
    }

    /// Incremental dump path, defaulting to `{base}/incremental/listens`.
    pub fn resolved_incremental_path(&self, base: &str) -> String {
        self.incremental_path
            .clone()
            .unwrap_or_else(|| format!("{}/incremental/listens", base.trim_end_matches('/')))
    }
}

fn default_base_path() -> String {
    "/var/lib/playrank".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_storage_config() {
        let config: StorageConfig = toml::from_str("").unwrap();
        assert!(matches!(config.backend, StorageBackend::Local));
        assert_eq!(config.base_path, "/var/lib/playrank");
        assert!(config.create_dirs);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_base_path_is_invalid() {
        let config: StorageConfig = toml::from_str(r#"base_path = """#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn event_paths_default_under_base() {
        let events = EventsConfig::default();
        assert_eq!(events.resolved_listens_path("/data/"), "/data/listens");
        assert_eq!(
            events.resolved_incremental_path("/data"),
            "/data/incremental/listens"
        );
    }

    #[test]
    fn event_paths_can_be_overridden() {
        let events: EventsConfig = toml::from_str(
            r#"
            listens_path = "/dumps/full"
            incremental_path = "/dumps/spool"
            "#,
        )
        .unwrap();
        assert_eq!(events.resolved_listens_path("/data"), "/dumps/full");
        assert_eq!(events.resolved_incremental_path("/data"), "/dumps/spool");
    }
}
