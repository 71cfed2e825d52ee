//! Proxy control daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!     control-cli / embedders
//!            │ SaveRequest
//!            ▼
//!   ┌─────────────────────────────────────────────────────────────┐
//!   │                          ENGINE                              │
//!   │  validation ──▶ store tx (entities, links, out_json, log)   │
//!   │                   │ in-tx add/remove        │ commit         │
//!   │                   ▼                         ▼                │
//!   │              core adapter ◀──── post-commit restarts         │
//!   └───────────────────┬─────────────────────────────────────────┘
//!                       │
//!      ┌────────────────┼───────────────────┐
//!      ▼                ▼                   ▼
//!  RegistryCore    sweep task         follower task
//!  (+ snapshot)    (depletion)        (external writes → resync)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use proxy_control::config::load_config;
use proxy_control::core::{CoreAdapter, RegistryCore};
use proxy_control::lifecycle::{build_engine, signals, Shutdown};
use proxy_control::observability::{logging, metrics};
use proxy_control::tasks::{ChangeFollower, SweepMonitor};

/// Proxy configuration control daemon.
#[derive(Debug, Parser)]
#[command(name = "proxy-control", version)]
struct Args {
    /// Path to the TOML config file.
    #[arg(short, long, default_value = "config/control.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = if args.config.exists() {
        load_config(&args.config)?
    } else {
        proxy_control::ControlConfig::default()
    };

    if let Err(e) = logging::init(&config.observability.log_level) {
        eprintln!("logging disabled: {e}");
    }
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "proxy-control starting");
    if !args.config.exists() {
        tracing::warn!(path = %args.config.display(), "Config file not found, using defaults");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let core: Arc<dyn CoreAdapter> = Arc::new(RegistryCore::new(
        config.core.snapshot_path.as_ref().map(PathBuf::from),
    ));
    let engine = Arc::new(build_engine(&config, Arc::clone(&core))?);

    let boot = {
        let engine = Arc::clone(&engine);
        tokio::task::spawn_blocking(move || engine.boot()).await??
    };
    if boot.is_converged() {
        tracing::info!("Core running");
    } else {
        tracing::error!(failures = boot.failures.len(), "Core failed to start cleanly");
    }

    let mut shutdown = Shutdown::new();
    let sweep = SweepMonitor::new(Arc::clone(&engine), config.sweep.clone());
    let rx = shutdown.subscribe();
    shutdown.track("sweep", tokio::spawn(sweep.run(rx)));
    let follower = ChangeFollower::new(Arc::clone(&engine), config.follower.clone());
    let rx = shutdown.subscribe();
    shutdown.track("follower", tokio::spawn(follower.run(rx)));

    signals::wait_for_shutdown().await;
    tracing::info!("Shutting down");
    let abandoned = shutdown.drain(Duration::from_secs(10)).await;
    if abandoned > 0 {
        tracing::warn!(abandoned, "Some tasks were abandoned");
    }

    if let Err(e) = tokio::task::spawn_blocking(move || core.stop()).await? {
        tracing::warn!(error = %e, "Core stop failed");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
