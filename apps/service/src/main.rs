mod config;
mod monitoring;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use uuid::Uuid;

use config::Config;
use monitoring::Scheduler;
use store::models::Url;
use store::{MemoryStore, Store};

#[derive(Debug, Parser)]
#[command(name = "httpmon", about = "Periodic http url monitoring daemon", version)]
struct Args {
    /// Path to the TOML config file (defaults to the XDG location).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_tracing();

    let args = Args::parse();
    let config = Config::from_config(args.config.as_deref()).context("loading configuration")?;
    info!(
        workers = config.monitoring.workers,
        timeout = ?config.request_timeout(),
        targets = config.targets.len(),
        "loaded configuration"
    );

    let store = Arc::new(MemoryStore::new());
    // A partially seeded schedule is worse than failing loudly.
    seed_targets(store.as_ref(), &config).await.context("seeding configured targets")?;

    let scheduler =
        Scheduler::new(config.monitoring.workers, config.request_timeout(), store);
    scheduler.run(shutdown_signal()).await
}

/// Registers the configured targets under one locally generated owner.
async fn seed_targets(store: &dyn Store, config: &Config) -> Result<()> {
    let owner = Uuid::new_v4();
    for target in &config.targets {
        let url = Url::new(owner, target.url.clone(), target.interval(), target.threshold);
        info!(url = %url.url, interval = ?url.interval, "registering configured target");
        store.urls().add(url).await?;
    }
    Ok(())
}

/// Resolves on either SIGINT (ctrl-c) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed installing ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed installing sigterm handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
