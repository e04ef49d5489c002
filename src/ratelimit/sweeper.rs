//! Background eviction of idle limiter entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use super::registry::LimiterRegistry;

/// Periodically removes idle entries from a [`LimiterRegistry`].
pub struct Sweeper {
    registry: Arc<LimiterRegistry>,
    interval: Duration,
    idle_timeout: Duration,
}

impl Sweeper {
    /// Create a sweeper that runs every `interval` and evicts entries idle
    /// for longer than `idle_timeout`.
    pub fn new(registry: Arc<LimiterRegistry>, interval: Duration, idle_timeout: Duration) -> Self {
        Self {
            registry,
            interval,
            idle_timeout,
        }
    }

    /// Spawn the sweep loop onto the runtime.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run the sweep loop until `shutdown` becomes `true` or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; there is nothing to sweep yet.
        ticker.tick().await;

        info!(
            interval = ?self.interval,
            idle_timeout = ?self.idle_timeout,
            "Limiter sweeper started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.registry.sweep(self.idle_timeout);
                    debug!(
                        removed = removed,
                        remaining = self.registry.len(),
                        "Swept idle token buckets"
                    );
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Limiter sweeper stopped");
    }
}
