//! Background retention sweep
//!
//! Periodically deletes codes and sessions that expired longer ago than
//! the policy's retention horizon. Bookkeeping only: redemption never
//! depends on a sweep having run.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{AccessService, SweepReport};

/// Shortest interval between sweeps; a zero period is not a valid tick
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Background retention task
pub struct RetentionTask {
    service: Arc<AccessService>,
    /// Time between sweeps
    interval: Duration,
    /// Shutdown signal
    shutdown_rx: broadcast::Receiver<()>,
    /// Running totals, logged on shutdown
    totals: SweepReport,
}

impl RetentionTask {
    /// Create a new retention task
    pub fn new(
        service: Arc<AccessService>,
        interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        if interval < MIN_INTERVAL {
            warn!(requested = ?interval, "Retention interval is zero, using the minimum");
        }
        Self {
            service,
            interval: interval.max(MIN_INTERVAL),
            shutdown_rx,
            totals: SweepReport::default(),
        }
    }

    /// Spawn the retention task as a background task
    pub fn spawn(
        service: Arc<AccessService>,
        interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let task = Self::new(service, interval, shutdown_rx);

        tokio::spawn(async move {
            task.run().await;
        })
    }

    /// Run the sweep loop; the first sweep happens immediately
    async fn run(mut self) {
        info!(interval_secs = self.interval.as_secs(), "Retention task started");

        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!(
                        codes_purged = self.totals.codes_purged,
                        sessions_purged = self.totals.sessions_purged,
                        "Retention task shutting down"
                    );
                    break;
                }
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
            }
        }
    }

    async fn sweep_once(&mut self) {
        let now = self.service.now();
        match self.service.sweep(now).await {
            Ok(report) => {
                self.totals.codes_purged += report.codes_purged;
                self.totals.sessions_purged += report.sessions_purged;
                debug!(
                    codes = report.codes_purged,
                    sessions = report.sessions_purged,
                    "Retention sweep finished"
                );
            }
            Err(e) => {
                error!(error = %e, "Retention sweep failed");
            }
        }
    }
}
