//! Configuration for the stats engine.
//!
//! Configured via a TOML file, with support for environment variable
//! interpolation using `${VAR_NAME}` syntax.
//!
//! # Example
//!
//! ```toml
//! [storage]
//! base_path = "/var/lib/playrank"
//!
//! [stats]
//! top_entity_limit = 1000
//!
//! [messaging]
//! sink = "file"
//! path = "${PLAYRANK_OUT}/messages.jsonl"
//! ```

mod messaging;
mod observability;
mod stats;
mod storage;

use std::path::{Path, PathBuf};

pub use messaging::*;
pub use observability::*;
use serde::{Deserialize, Serialize};
pub use stats::*;
pub use storage::*;
use thiserror::Error;

/// Root configuration for the stats engine.
///
/// All sections are optional with sensible defaults, allowing minimal
/// configuration for local runs.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct PlayrankConfig {
    /// Storage layout for aggregates, bookkeeping records and event dumps.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Locations of the raw event datasets.
    #[serde(default)]
    pub events: EventsConfig,

    /// Ranking and capping knobs.
    #[serde(default)]
    pub stats: StatsConfig,

    /// Outbound message sink.
    #[serde(default)]
    pub messaging: MessagingConfig,

    /// Observability configuration (logging).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl PlayrankConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing required variables will cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: Self = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate().map_err(ConfigError::Invalid)?;
        self.messaging.validate().map_err(ConfigError::Invalid)?;
        Ok(())
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Expand `${VAR_NAME}` references against the process environment.
///
/// Variables appearing after a `#` comment marker on a line are left alone.
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern compiles");
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let whole = cap.get(0).expect("capture 0 always present");

            // Skip variables inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    Ok(result)
}
