//! Background eviction of stale admission queue entries.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::queue::AdmissionQueue;
use crate::error::{Result, TollgateError};

/// Default maximum age of a queue entry.
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_secs(10);
/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3);

/// Periodically removes queue entries older than the staleness window.
#[derive(Clone)]
pub struct EvictionSweeper {
    queue: Arc<AdmissionQueue>,
    interval: Duration,
    staleness_window: Duration,
}

impl EvictionSweeper {
    /// Both durations must be non-zero.
    pub fn new(
        queue: Arc<AdmissionQueue>,
        interval: Duration,
        staleness_window: Duration,
    ) -> Result<Self> {
        if interval.is_zero() || staleness_window.is_zero() {
            return Err(TollgateError::Validation(
                "sweep interval and staleness window must be non-zero".to_string(),
            ));
        }

        Ok(Self {
            queue,
            interval,
            staleness_window,
        })
    }

    /// Run a single sweep now.
    pub fn sweep(&self) -> usize {
        let evicted = self.queue.evict_stale(self.staleness_window);
        if evicted > 0 {
            debug!(
                evicted = evicted,
                remaining = self.queue.len(),
                "Evicted stale admission queue entries"
            );
        }
        evicted
    }

    /// Start sweeping on a background task.
    ///
    /// The task runs until [`SweeperHandle::shutdown`] is called or the
    /// handle is dropped.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            staleness_window_ms = self.staleness_window.as_millis() as u64,
            "Starting admission queue sweeper"
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }

            debug!("Admission queue sweeper stopped");
        });

        SweeperHandle { shutdown_tx, task }
    }
}

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it to exit.
    pub async fn shutdown(self) {
        info!("Stopping admission queue sweeper");
        // The receiver lives as long as the task; a send error means it already exited
        let _ = self.shutdown_tx.send(true);

        if let Err(e) = self.task.await {
            error!(error = %e, "Admission queue sweeper task failed");
        }
    }

    /// Check whether the sweeper task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
