//! Capstan Daemon - app definition API server

use anyhow::{Context, Result};
use capstan_core::{constants, ServerConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod daemon;

use daemon::Daemon;

#[derive(Parser, Debug)]
#[command(name = "capstand")]
#[command(author, version, about = "Capstan daemon - app definitions and deployments")]
struct Args {
    /// Config file (capstan.toml, .yaml or .json)
    #[arg(short, long, env = "CAPSTAN_CONFIG")]
    config: Option<PathBuf>,

    /// Override the bind address
    #[arg(short, long, env = "CAPSTAN_BIND")]
    bind: Option<String>,

    /// Override the database path
    #[arg(long, env = "CAPSTAN_DB")]
    db: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => {
            let (config, path) = ServerConfig::find_and_load(&constants::capstan_home())?;
            match path {
                Some(path) => info!("Loaded config from {}", path.display()),
                None => info!("No config file found, using defaults"),
            }
            config
        }
    };

    if let Some(bind) = &args.bind {
        config.bind_addr = bind.clone();
    }
    if let Some(db) = &args.db {
        config.db_path = db.clone();
    }
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "capstand=info,capstan_engine=info,capstan_web=info,capstan_db=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Capstan Daemon starting...");

    // CAPSTAN_* overrides may come from a .env next to the daemon
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let args = Args::parse();
    let config = load_config(&args)?;

    // Ensure home directory exists
    let home = constants::capstan_home();
    if !home.exists() {
        std::fs::create_dir_all(&home)?;
        info!("Created Capstan home directory: {}", home.display());
    }

    let daemon = Daemon::new(config).await?;
    daemon.run(shutdown_signal()).await?;

    info!("Daemon shutdown complete");
    Ok(())
}
