//! nitk-ingest - Noise recording ingestion service
//!
//! Watches a directory for TDMS and WAV recordings, computes acoustic
//! metrics for each new file, stores them in SQLite and pushes live
//! results over WebSocket. Lifecycle events are streamed over SSE.

use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use nitk_common::config::TomlConfig;
use nitk_common::events::EventBus;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nitk_ingest::retention::spawn_retention_sweeper;
use nitk_ingest::{
    AppState, Broadcaster, FormatNormalizer, MetricsEngine, OrchestratorOptions, Pipeline,
    ResultStore, WatchController,
};

/// Command-line arguments for nitk-ingest
#[derive(Parser, Debug)]
#[command(name = "nitk-ingest")]
#[command(about = "Noise recording ingestion service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "NITK_CONFIG")]
    config: Option<PathBuf>,

    /// Directory to watch for new recordings
    #[arg(short, long, env = "NITK_WATCH_DIR")]
    watch_dir: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "NITK_DATABASE")]
    database: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "NITK_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "NITK_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::load(args.config.as_deref())
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
    if let Some(dir) = args.watch_dir {
        config.watch_directory = dir;
    }
    if let Some(db) = args.database {
        config.database_path = db;
    }
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }

    init_tracing(&config)?;

    info!("Starting nitk-ingest");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Watch directory: {}", config.watch_directory.display());
    info!("Database: {}", config.database_path.display());

    let pool = nitk_ingest::db::init_database_pool(&config.database_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
    info!("Database connection established");

    let store = ResultStore::new(pool);
    let event_bus = EventBus::new(config.event_channel_capacity.max(16));
    let pipeline = Pipeline::new(
        store.clone(),
        Broadcaster::new(),
        event_bus.clone(),
        FormatNormalizer::new(config.default_sample_rate),
        MetricsEngine::new(),
    );

    let controller = Arc::new(WatchController::new(
        pipeline,
        OrchestratorOptions::from(&config),
        config.watch_directory.clone(),
    ));
    controller
        .start()
        .await
        .context("Failed to start directory monitoring")?;

    let background = CancellationToken::new();
    let sweeper = (config.retention_days > 0).then(|| {
        spawn_retention_sweeper(
            store,
            event_bus,
            config.retention_days,
            config.retention_sweep_interval(),
            background.clone(),
        )
    });

    let app = nitk_ingest::build_router(AppState::new(Arc::clone(&controller)));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.host, config.port))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    background.cancel();
    if let Some(sweeper) = sweeper {
        if let Err(e) = sweeper.await {
            warn!("Retention sweeper ended abnormally: {}", e);
        }
    }
    controller.stop().await;

    served.context("Server error")?;
    info!("Shutdown complete");
    Ok(())
}

/// Console output plus an optional append-only log file
fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "nitk_ingest={level},nitk_common={level},tower_http=info",
            level = config.logging.level
        )
        .into()
    });

    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
