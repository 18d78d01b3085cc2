//! Reconciliation of processing queues against worker liveness.
//!
//! A worker claims a record by moving its key from a work queue into its own
//! processing queue, `{prefix}-{queue}:{worker}`. If the worker dies or stalls
//! the key is stranded there. Each [`Janitor::clean`] sweep visits every
//! processing queue and triages the keys it holds:
//!
//! ```text
//! DISCOVERED ─┬─> MALFORMED         record has no fields; entry removed
//!             ├─> TOO_FRESH         not stale (or staleness disabled); untouched
//!             ├─> FINISHED_STALE    done/failed; entry removed, record untouched
//!             └─> UNFINISHED_STALE  entry removed and key pushed back on its work queue
//! ```
//!
//! Every mutation is a remove-if-present or a push, so sweeps from several
//! janitors, or a worker finishing concurrently, converge instead of
//! conflicting. A key that disappears before it can be repaired is not counted.

pub mod classifier;
pub mod queue;
pub mod record;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cluster::Cluster;
use crate::config::JanitorConfig;
use crate::error::Result;
use crate::store::{QueueAccessor, Store};
use crate::worker::WorkerLiveness;

pub use classifier::{Precheck, StalenessPolicy};
pub use queue::QueueEntry;
pub use record::JobRecord;

/// Phase a worker may sit in while still starting up; never killed.
const STARTING_PHASE: &str = "Pending";

/// Terminal state of a single triaged entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanOutcome {
    Malformed,
    TooFresh,
    FinishedStale,
    /// `repaired` is false when the entry vanished before it could be removed
    UnfinishedStale { repaired: bool },
}

impl CleanOutcome {
    /// Whether the entry counts towards the repair counters.
    pub fn cleaned(self) -> bool {
        match self {
            CleanOutcome::Malformed | CleanOutcome::FinishedStale => true,
            CleanOutcome::TooFresh => false,
            CleanOutcome::UnfinishedStale { repaired } => repaired,
        }
    }
}

/// Tally of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Processing queues visited
    pub processing_queues: u64,
    /// Keys that were not lists or did not follow the naming convention
    pub skipped: u64,
    pub malformed: u64,
    pub too_fresh: u64,
    pub finished: u64,
    pub requeued: u64,
    /// Stale entries that were already gone when the repair ran
    pub vanished: u64,
}

impl SweepReport {
    fn record(&mut self, outcome: CleanOutcome) {
        match outcome {
            CleanOutcome::Malformed => self.malformed += 1,
            CleanOutcome::TooFresh => self.too_fresh += 1,
            CleanOutcome::FinishedStale => self.finished += 1,
            CleanOutcome::UnfinishedStale { repaired: true } => self.requeued += 1,
            CleanOutcome::UnfinishedStale { repaired: false } => self.vanished += 1,
        }
    }

    /// Entries cleaned this sweep.
    pub fn cleaned(&self) -> u64 {
        self.malformed + self.finished + self.requeued
    }
}

/// Counters kept across sweeps for the lifetime of a [`Janitor`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct JanitorStats {
    pub queues: Vec<String>,
    pub sweeps: u64,
    pub last_sweep_repairs: u64,
    pub total_repairs: u64,
    pub last_sweep_at: Option<DateTime<Utc>>,
    pub last_report: Option<SweepReport>,
}

/// Reconciles processing queues in a [`Store`] against worker liveness in a
/// [`Cluster`].
pub struct Janitor<S, C> {
    config: JanitorConfig,
    accessor: QueueAccessor<S>,
    liveness: WorkerLiveness<C>,
    policy: StalenessPolicy,
    stats: JanitorStats,
}

impl<S: Store, C: Cluster> Janitor<S, C> {
    pub fn new(store: S, cluster: C, config: JanitorConfig) -> Self {
        let stats = JanitorStats {
            queues: config.queues.clone(),
            ..Default::default()
        };
        Self {
            accessor: QueueAccessor::new(store, config.backoff),
            liveness: WorkerLiveness::new(cluster, &config),
            policy: StalenessPolicy::from_config(&config),
            stats,
            config,
        }
    }

    pub fn config(&self) -> &JanitorConfig {
        &self.config
    }

    pub fn stats(&self) -> &JanitorStats {
        &self.stats
    }

    pub fn accessor(&self) -> &QueueAccessor<S> {
        &self.accessor
    }

    pub fn liveness(&self) -> &WorkerLiveness<C> {
        &self.liveness
    }

    /// Run one full sweep over every processing queue of every watched queue.
    pub async fn clean(&mut self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for queue in self.config.queues.clone() {
            for (prefix, pattern) in self.config.processing_patterns(&queue) {
                let processing_queues = self
                    .accessor
                    .scan(&pattern, self.config.scan_count)
                    .collect()
                    .await?;

                for processing_queue in processing_queues {
                    self.clean_processing_queue(&prefix, &processing_queue, &mut report)
                        .await?;
                }
            }
        }

        let cleaned = report.cleaned();
        self.stats.sweeps += 1;
        self.stats.last_sweep_repairs = cleaned;
        self.stats.total_repairs += cleaned;
        self.stats.last_sweep_at = Some(Utc::now());
        self.stats.last_report = Some(report.clone());

        tracing::info!(
            repairs = cleaned,
            processing_queues = report.processing_queues,
            malformed = report.malformed,
            finished = report.finished,
            requeued = report.requeued,
            "Keys repaired this sweep"
        );
        tracing::info!(total_repairs = self.stats.total_repairs, "Keys repaired over all sweeps");

        self.liveness.reset();
        Ok(report)
    }

    async fn clean_processing_queue(
        &mut self,
        prefix: &str,
        processing_queue: &str,
        report: &mut SweepReport,
    ) -> Result<()> {
        let kind = self.accessor.key_type(processing_queue).await?;
        if kind != "list" {
            tracing::debug!(key = processing_queue, kind = %kind, "Skipping non-list key");
            report.skipped += 1;
            return Ok(());
        }

        let record_keys = self.accessor.lrange_all(processing_queue).await?;
        let Some(entries) = record_keys
            .iter()
            .map(|key| QueueEntry::parse(prefix, processing_queue, key))
            .collect::<Option<Vec<_>>>()
        else {
            tracing::warn!(processing_queue, prefix, "Unrecognized processing queue name");
            report.skipped += 1;
            return Ok(());
        };

        if record_keys.len() > 1 {
            tracing::warn!(
                processing_queue,
                count = record_keys.len(),
                keys = ?record_keys,
                "Processing queue holds more than one record"
            );
        }

        report.processing_queues += 1;
        for entry in entries {
            let outcome = self.triage(&entry).await?;
            report.record(outcome);
        }
        Ok(())
    }

    /// Classify one entry and apply the matching repair.
    pub async fn triage(&mut self, entry: &QueueEntry) -> Result<CleanOutcome> {
        let fields = self.accessor.hgetall(&entry.record_key).await?;
        if fields.is_empty() {
            let removed = self
                .accessor
                .lrem(&entry.processing_queue, &entry.record_key)
                .await?;
            tracing::warn!(
                key = %entry.record_key,
                processing_queue = %entry.processing_queue,
                removed,
                "Record has no data, dropped its processing queue entry"
            );
            return Ok(CleanOutcome::Malformed);
        }

        let record = JobRecord::new(entry.record_key.as_str(), fields);
        let age = record.age_seconds(Utc::now());

        if !self.should_repair(entry, age).await {
            return Ok(CleanOutcome::TooFresh);
        }

        if record.is_finished() {
            self.accessor
                .lrem(&entry.processing_queue, &entry.record_key)
                .await?;
            tracing::info!(
                key = %entry.record_key,
                status = record.status().unwrap_or_default(),
                processing_queue = %entry.processing_queue,
                "Removed finished record from processing queue"
            );
            return Ok(CleanOutcome::FinishedStale);
        }

        if let Some(updated_by) = record.updated_by().filter(|by| *by != entry.worker) {
            tracing::debug!(
                key = %entry.record_key,
                worker = %entry.worker,
                updated_by,
                "Record last touched by a different worker"
            );
        }

        let repaired = self.repair(entry).await?;
        if repaired && self.config.kill_failed_pods {
            self.kill_if_failed(&entry.worker).await;
        }
        Ok(CleanOutcome::UnfinishedStale { repaired })
    }

    /// Clean a single entry. Returns whether it counts as cleaned.
    pub async fn clean_key(&mut self, entry: &QueueEntry) -> Result<bool> {
        Ok(self.triage(entry).await?.cleaned())
    }

    /// Whether the record behind `entry`, last updated `age_seconds` ago,
    /// is stranded.
    pub async fn should_repair(&mut self, entry: &QueueEntry, age_seconds: f64) -> bool {
        let whitelisted = self.liveness.is_whitelisted(&entry.worker);
        match classifier::precheck(&self.policy, age_seconds, whitelisted) {
            Precheck::CheckLiveness => {
                let valid = self.liveness.is_worker_valid(&entry.worker).await;
                if !valid {
                    tracing::debug!(
                        worker = %entry.worker,
                        key = %entry.record_key,
                        age_seconds,
                        "Worker missing or not in an accepted phase"
                    );
                }
                !valid
            }
            decided => decided.verdict().unwrap_or(false),
        }
    }

    /// Move `entry` back onto its work queue.
    ///
    /// The key is only pushed if this call removed it from the processing
    /// queue, so a key repaired twice concurrently is requeued once.
    pub async fn repair(&self, entry: &QueueEntry) -> Result<bool> {
        let removed = self
            .accessor
            .lrem(&entry.processing_queue, &entry.record_key)
            .await?;
        if !removed {
            tracing::warn!(
                key = %entry.record_key,
                processing_queue = %entry.processing_queue,
                "Key already gone from processing queue, skipping repair"
            );
            return Ok(false);
        }

        self.accessor.lpush(&entry.queue, &entry.record_key).await?;
        tracing::info!(
            key = %entry.record_key,
            worker = %entry.worker,
            queue = %entry.queue,
            "Requeued stranded record"
        );
        Ok(true)
    }

    /// Ask the cluster to delete `worker`. Failures are logged, not returned.
    pub async fn kill_worker(&self, worker: &str) -> bool {
        self.liveness.kill_worker(worker).await
    }

    async fn kill_if_failed(&self, worker: &str) {
        let Some(pod) = self.liveness.snapshot().get(worker) else {
            return;
        };
        if self.config.accepted_phases.contains(&pod.phase) || pod.phase == STARTING_PHASE {
            return;
        }
        tracing::info!(pod = worker, phase = %pod.phase, "Killing failed worker");
        self.kill_worker(worker).await;
    }
}
