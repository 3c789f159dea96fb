//! Pothole detection server
//!
//! # Usage
//!
//! ```bash
//! # Serve on the default address with data under ./Server
//! cargo run --release
//!
//! # Custom bind address and data directory
//! ./pothole-server --addr 127.0.0.1:9000 --data-dir /var/lib/pothole
//!
//! # Run a single consolidation pass and exit
//! ./pothole-server --consolidate-once
//! ```
//!
//! # Environment Variables
//!
//! - `POTHOLE_CONFIG`: Path to a TOML config file (default: ./pothole.toml)
//! - `POTHOLE_SERVER_ADDR`, `POTHOLE_DATA_DIR`, `CONSOLIDATION_INTERVAL_SECS`
//! - `POTHOLE_CORS_ORIGINS`: Comma-separated allowed origins
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use axum::Router;
use pothole_ingest::api::{create_app, ServerState};
use pothole_ingest::config::ServerConfig;
use pothole_ingest::consolidation::{ConsolidationEngine, ConsolidationError};
use pothole_ingest::storage::{ArtifactStore, FileArtifactStore, ProcessLock};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "pothole-server")]
#[command(about = "Pothole detection ingestion and consolidation server")]
#[command(version)]
struct CliArgs {
    /// Override the server address (default: "0.0.0.0:8000")
    #[arg(short, long)]
    addr: Option<String>,

    /// Load configuration from this TOML file instead of the search order
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the data directory (default: "./Server")
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Run one consolidation pass over the stored data and exit
    #[arg(long)]
    consolidate_once: bool,
}

fn resolve_config(args: &CliArgs) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = ServerConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            config.apply_env_overrides();
            config
        }
        None => ServerConfig::load(),
    };

    if let Some(addr) = &args.addr {
        config.server.addr = addr.clone();
    }
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

// ============================================================================
// Supervised Tasks
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    ConsolidationScheduler,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::ConsolidationScheduler => write!(f, "ConsolidationScheduler"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Run one consolidation pass off the async runtime.
async fn consolidate_blocking(engine: Arc<ConsolidationEngine>) -> Result<()> {
    match tokio::task::spawn_blocking(move || engine.consolidate()).await {
        Ok(Ok(_report)) => Ok(()),
        Ok(Err(ConsolidationError::AlreadyRunning)) => {
            info!("[Consolidation] Previous pass still running, skipping tick");
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Consolidation task panicked: {}", e)),
    }
}

/// Spawn the periodic consolidation task.
fn spawn_consolidation_scheduler(
    task_set: &mut JoinSet<Result<TaskName>>,
    engine: Arc<ConsolidationEngine>,
    period: Duration,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[ConsolidationScheduler] Task starting with interval {:?}", period);

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; startup already ran a pass.
        interval.tick().await;
        let mut passes = 0u64;

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("[ConsolidationScheduler] Received shutdown signal after {} passes", passes);
                    return Ok(TaskName::ConsolidationScheduler);
                }
                _ = interval.tick() => {
                    consolidate_blocking(Arc::clone(&engine)).await?;
                    passes += 1;
                }
            }
        }
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let in-flight requests drain before returning.
    while let Some(result) = task_set.join_next().await {
        if let Ok(Err(e)) = result {
            warn!("Task ended with error during shutdown: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let config = resolve_config(&args)?;

    info!(
        addr = %config.server.addr,
        data_dir = %config.storage.data_dir.display(),
        interval_secs = config.consolidation.interval_secs,
        gps_scope = ?config.consolidation.gps_scope,
        "Pothole server starting"
    );

    let _process_lock = ProcessLock::acquire(&config.storage.data_dir)?;

    let store: Arc<dyn ArtifactStore> = Arc::new(
        FileArtifactStore::open(&config.storage.data_dir)
            .context("Failed to open artifact store")?,
    );
    let state = ServerState::build(store, &config).context("Failed to load detection state")?;
    info!(
        detections = state.index.len(),
        summarized = state.index.summarized_count(),
        "Detection index ready"
    );

    // Catch up on anything that became complete while the server was down
    consolidate_blocking(Arc::clone(&state.engine)).await?;

    if args.consolidate_once {
        info!("Single consolidation pass complete");
        return Ok(());
    }

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let listener = tokio::net::TcpListener::bind(&config.server.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server.addr))?;
    info!("HTTP server listening on {}", config.server.addr);

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    let engine = Arc::clone(&state.engine);
    let app = create_app(state, config.server.max_body_bytes);
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    if config.consolidation.interval_secs > 0 {
        spawn_consolidation_scheduler(
            &mut task_set,
            engine,
            Duration::from_secs(config.consolidation.interval_secs),
            cancel_token.clone(),
        );
    } else {
        info!("Periodic consolidation disabled (interval 0)");
    }

    run_supervisor(&mut task_set, cancel_token).await?;

    info!("Pothole server shutdown complete");
    Ok(())
}
