use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use datafusion::prelude::SessionContext;
use playrank::config::{PlayrankConfig, SinkBackend};
use playrank::engine::{GeneratedStats, IncrementalStatsEngine};
use playrank::events::ParquetEventSource;
use playrank::messages::{self, JsonLinesSink, MessageSink, StatsMessage, StdoutSink};
use playrank::models::{Entity, Scope, StatsRange};
use playrank::storage::{LocalStorageClient, StorageClient};
use playrank::{observability, providers, ranges};
use tracing::{error, info};

/// Incremental ranked listening statistics.
#[derive(Parser)]
#[command(name = "playrank", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, global = true, default_value = "playrank.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compute one statistic and emit its messages.
    Generate {
        /// Entity to rank: artists, releases or listening_activity.
        #[arg(long)]
        entity: Entity,

        /// Scope: sitewide or user.
        #[arg(long, default_value = "sitewide")]
        scope: Scope,

        /// Stats range: week, month, year or all_time.
        #[arg(long, default_value = "week")]
        range: StatsRange,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match PlayrankConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("playrank: {e}");
            return ExitCode::FAILURE;
        }
    };

    observability::init_tracing(&config.observability.logging);

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: PlayrankConfig) -> Result<(), Box<dyn std::error::Error>> {
    let Command::Generate {
        entity,
        scope,
        range,
    } = command;

    let ctx = SessionContext::new();
    let storage: Arc<dyn StorageClient> = Arc::new(LocalStorageClient::new());
    if config.storage.create_dirs {
        storage.makedirs(&config.storage.base_path).await?;
    }

    let base = &config.storage.base_path;
    let events = Arc::new(ParquetEventSource::new(
        ctx.clone(),
        storage.clone(),
        config.events.resolved_listens_path(base),
        config.events.resolved_incremental_path(base),
    ));
    let engine = IncrementalStatsEngine::new(ctx, storage, events, &config);

    let provider = providers::provider_for(entity, scope, range)
        .ok_or_else(|| format!("no statistic registered for {entity}/{scope}"))?;
    let date_range = ranges::date_range_for(range, chrono::Utc::now());

    info!(
        entity = %entity,
        scope = %scope,
        range = %range,
        from_date = %date_range.from_date,
        to_date = %date_range.to_date,
        "Generating statistic"
    );
    let stats = engine
        .generate_stats(provider.as_ref(), range, &date_range)
        .await?;

    let message = build_message(stats, entity, scope, range).await?;

    let sink: Box<dyn MessageSink> = match config.messaging.sink {
        SinkBackend::Stdout => Box::new(StdoutSink),
        SinkBackend::File => Box::new(JsonLinesSink::new(
            config.messaging.path.clone().unwrap_or_default(),
        )),
    };

    match message {
        Some(message) => {
            let sent = sink.send_batch(std::slice::from_ref(&message)).await?;
            info!(sink = sink.name(), sent, "Messages delivered");
        }
        None => info!("No rows produced, nothing to send"),
    }

    Ok(())
}

async fn build_message(
    stats: GeneratedStats,
    entity: Entity,
    scope: Scope,
    range: StatsRange,
) -> Result<Option<StatsMessage>, messages::MessageError> {
    let stats_range = range.as_str();
    match (entity, scope) {
        (Entity::ListeningActivity, _) => {
            messages::sitewide_listening_activity_message(stats, stats_range).await
        }
        (_, Scope::Sitewide) => {
            Ok(Some(messages::sitewide_entity_message(stats, entity, stats_range).await?))
        }
        (_, Scope::User) => {
            Ok(Some(messages::user_entity_message(stats, entity, stats_range).await?))
        }
    }
}
