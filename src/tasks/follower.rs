//! Change follower.
//!
//! The CLI writes to the same store without reaching the live core. The
//! follower polls the change log and restarts the core from the assembled
//! document when it finds records this process has not applied.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::FollowerConfig;
use crate::engine::Engine;

pub struct ChangeFollower {
    engine: Arc<Engine>,
    config: FollowerConfig,
}

impl ChangeFollower {
    pub fn new(engine: Arc<Engine>, config: FollowerConfig) -> Self {
        Self { engine, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Change follower disabled");
            return;
        }

        tracing::info!(interval = self.config.interval_secs, "Change follower starting");
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Change follower received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn poll(&self) {
        let engine = Arc::clone(&self.engine);
        match tokio::task::spawn_blocking(move || engine.follow_changes()).await {
            Ok(Ok(Some(convergence))) if !convergence.is_converged() => {
                tracing::warn!(
                    failures = convergence.failures.len(),
                    "Core resync did not fully converge"
                );
            }
            Ok(Ok(Some(_))) => tracing::info!("Core resynced from the change log"),
            Ok(Ok(None)) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Change follower poll failed"),
            Err(e) => tracing::error!(error = %e, "Change follower task panicked"),
        }
    }
}
