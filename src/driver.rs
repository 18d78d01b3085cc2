use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::cluster::Cluster;
use crate::error::Result;
use crate::janitor::{Janitor, JanitorStats, SweepReport};
use crate::store::Store;

/// Runs janitor sweeps on a fixed interval until shutdown.
///
/// A sweep always runs to completion; shutdown is only observed while
/// sleeping between sweeps. Counters are published to a shared
/// [`JanitorStats`] after every sweep for the status endpoint.
pub struct Driver<S, C> {
    janitor: Janitor<S, C>,
    interval: Duration,
    stats: Arc<RwLock<JanitorStats>>,
}

impl<S: Store, C: Cluster> Driver<S, C> {
    pub fn new(janitor: Janitor<S, C>) -> Self {
        let interval = janitor.config().interval;
        let stats = Arc::new(RwLock::new(janitor.stats().clone()));
        Self {
            janitor,
            interval,
            stats,
        }
    }

    /// Shared view of the janitor counters.
    pub fn stats(&self) -> Arc<RwLock<JanitorStats>> {
        self.stats.clone()
    }

    pub fn janitor(&self) -> &Janitor<S, C> {
        &self.janitor
    }

    /// Run a single sweep and publish its counters.
    pub async fn run_once(&mut self) -> Result<SweepReport> {
        let report = self.janitor.clean().await?;
        *self.stats.write().await = self.janitor.stats().clone();
        Ok(report)
    }

    /// Sweep every interval until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns the first error that escapes a sweep. Transient store and
    /// cluster failures are absorbed below this level, so anything returned
    /// here is fatal.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(
            queues = ?self.janitor.config().queues,
            interval = ?self.interval,
            "Janitor started"
        );

        while !shutdown.is_cancelled() {
            self.run_once().await?;

            tracing::debug!(interval = ?self.interval, "Sleeping until next sweep");
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!(
            sweeps = self.janitor.stats().sweeps,
            total_repairs = self.janitor.stats().total_repairs,
            "Janitor stopped"
        );
        Ok(())
    }
}
