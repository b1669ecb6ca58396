//! reciprocity-worker: runs the scheduled match sweep.
//!
//! Usage:
//!   reciprocity-worker              run sweeps every SWEEP_INTERVAL_SECS until ctrl-c
//!   reciprocity-worker --once       run one sweep and exit
//!   reciprocity-worker --inline ID  run the inline pipeline for one user and exit

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use reciprocity_core::MatchingConfig;
use reciprocity_db::{Database, PoolConfig};
use reciprocity_jobs::{
    Collaborators, MatchOrchestrator, SweepConfig, SweepWorker, WebhookConfig,
    WebhookNotificationSink,
};

enum Command {
    Serve,
    Once,
    Inline(String),
}

fn parse_args() -> anyhow::Result<Command> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [] => Ok(Command::Serve),
        [flag] if flag == "--once" => Ok(Command::Once),
        [flag, user_id] if flag == "--inline" => Ok(Command::Inline(user_id.clone())),
        _ => bail!("usage: reciprocity-worker [--once | --inline USER_ID]"),
    }
}

/// Initialize tracing.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables daily-rolling file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "reciprocity=info")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "reciprocity_jobs=info,reciprocity_scoring=info,reciprocity_db=info".into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let dir = path.parent().unwrap_or(std::path::Path::new("."));
        let name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("reciprocity-worker.log");
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));

        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(log_ansi.unwrap_or(false)),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();
    let command = parse_args()?;

    let matching = MatchingConfig::from_env().context("invalid matching configuration")?;
    let sweep = SweepConfig::from_env();
    let webhook = WebhookConfig::from_env()
        .context("RECIPROCITY_BACKEND_URL must be set to deliver notifications")?;

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    info!(
        algorithm = %matching.algorithm,
        threshold = matching.similarity_threshold,
        max_matches_per_cycle = matching.max_matches_per_cycle,
        "Connecting to database..."
    );
    let pool_config = PoolConfig::for_sweep(
        sweep.max_concurrent,
        reciprocity_core::defaults::SYNC_WRITER_SHARDS,
    );
    let db = Database::connect_with_config(&database_url, pool_config).await?;

    info!("Running database migrations...");
    db.migrate().await?;

    let sink = Arc::new(WebhookNotificationSink::new(webhook)?);
    let orchestrator = Arc::new(
        MatchOrchestrator::new(matching, Collaborators::from_database(&db, sink))
            .with_max_concurrent(sweep.max_concurrent),
    );

    match command {
        Command::Once => {
            let report = orchestrator.run_sweep().await?;
            info!(report = %serde_json::to_string(&report)?, "Sweep finished");
        }
        Command::Inline(user_id) => {
            let report = orchestrator.run_inline(&user_id).await?;
            info!(report = %serde_json::to_string(&report)?, "Inline run finished");
        }
        Command::Serve => {
            let handle = SweepWorker::new(orchestrator.clone(), sweep).start();
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            info!("Shutdown signal received");
            handle.shutdown().await?;
            handle.join().await;
        }
    }

    reciprocity_db::log_pool_metrics(db.pool());
    Ok(())
}
