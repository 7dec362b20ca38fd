//! Tracing/logging initialisation.
//!
//! `RUST_LOG` takes precedence over the configured level and filter
//! directives, so operators can raise verbosity without touching the config
//! file.

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// Initialise the global tracing subscriber from logging configuration.
///
/// Panics if a subscriber is already installed; call once, early in main.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = build_env_filter(config);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(config.file_line)
        .with_line_number(config.file_line);

    match (config.format, config.timestamps) {
        (LogFormat::Pretty, true) => builder.pretty().init(),
        (LogFormat::Pretty, false) => builder.pretty().without_time().init(),
        (LogFormat::Compact, true) => builder.compact().init(),
        (LogFormat::Compact, false) => builder.compact().without_time().init(),
        (LogFormat::Json, true) => builder.json().init(),
        (LogFormat::Json, false) => builder.json().without_time().init(),
    }
}

fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
    // RUST_LOG wins when set and parseable
    if let Ok(env_filter) = std::env::var("RUST_LOG") {
        return EnvFilter::try_new(env_filter)
            .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));
    }

    let mut directives = config.level.as_str().to_string();
    if let Some(extra) = &config.filter {
        directives = format!("{directives},{extra}");
    }

    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
}
