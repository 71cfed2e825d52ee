//! Shutdown coordination for the daemon.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Every background task subscribes once and leaves its loop on the first
/// broadcast.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            tasks: Vec::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Tracks a spawned task so [`Shutdown::drain`] can wait for it.
    pub fn track(&mut self, name: &'static str, handle: JoinHandle<()>) {
        self.tasks.push((name, handle));
    }

    pub fn trigger(&self) {
        // No receivers left means every task already exited.
        let _ = self.tx.send(());
    }

    /// Number of receivers still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Broadcasts the signal and waits up to `timeout` for every tracked
    /// task. Returns how many tasks did not finish in time.
    pub async fn drain(self, timeout: Duration) -> usize {
        self.trigger();
        let mut abandoned = 0;
        for (name, handle) in self.tasks {
            match tokio::time::timeout(timeout, handle).await {
                Ok(Ok(())) => tracing::debug!(task = name, "Task stopped"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "Task ended abnormally"),
                Err(_) => {
                    tracing::warn!(task = name, "Task did not stop in time");
                    abandoned += 1;
                }
            }
        }
        abandoned
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
