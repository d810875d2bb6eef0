//! Tessera server binary

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tessera_logging::TesseraSubscriberBuilder;
use tessera_server::{AppState, ServerConfig, create_router};
use tessera_service::RetentionTask;
use tokio::sync::broadcast;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tessera-server", version, about = "Timed access codes for gated content")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Use the redb backend at this path (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Default log level (overrides config)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config = config.with_bind(bind);
    }
    if let Some(db) = cli.db {
        config = config.with_db(db);
    }
    if let Some(level) = cli.log_level {
        config = config.with_log_level(level);
    }
    config.validate()?;

    let _log_guard = TesseraSubscriberBuilder::new()
        .with_config(config.logging.clone())
        .init();

    info!(bind = %config.bind, "Starting Tessera server");

    let state = Arc::new(AppState::from_config(&config)?);

    let (shutdown_tx, _) = broadcast::channel(1);
    let retention = RetentionTask::spawn(
        state.service.clone(),
        config.policy.sweep_interval(),
        shutdown_tx.subscribe(),
    );

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!(addr = %config.bind, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(());
    if let Err(e) = retention.await {
        error!(error = %e, "Retention task panicked");
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
