//! Periodic depletion sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::SweepConfig;
use crate::engine::Engine;

pub struct SweepMonitor {
    engine: Arc<Engine>,
    config: SweepConfig,
}

impl SweepMonitor {
    pub fn new(engine: Arc<Engine>, config: SweepConfig) -> Self {
        Self { engine, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Depletion sweep disabled");
            return;
        }

        tracing::info!(interval = self.config.interval_secs, "Depletion sweep starting");
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Depletion sweep received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    async fn sweep_once(&self) {
        let engine = Arc::clone(&self.engine);
        match tokio::task::spawn_blocking(move || engine.deplete_clients()).await {
            Ok(Ok(report)) if !report.disabled.is_empty() => {
                if !report.convergence.is_converged() {
                    tracing::warn!(
                        failures = report.convergence.failures.len(),
                        "Sweep committed but the core did not fully converge"
                    );
                }
            }
            Ok(Ok(_)) => tracing::trace!("Nothing to deplete"),
            Ok(Err(e)) => tracing::error!(error = %e, "Depletion sweep failed"),
            Err(e) => tracing::error!(error = %e, "Depletion sweep task panicked"),
        }
    }
}
