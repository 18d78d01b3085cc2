use std::collections::BTreeSet;
use std::time::Duration;

use crate::error::{JanitorError, Result};

/// Prefixes joining a work queue name to its per-worker processing queues,
/// e.g. `processing-predict:pod-abc`.
pub const DEFAULT_PROCESSING_PREFIXES: &[&str] = &["processing"];

/// Worker phases that count as alive. `Pending` used to be accepted as well;
/// a pod stuck pending never picks up its record, so it is no longer trusted.
pub const DEFAULT_ACCEPTED_PHASES: &[&str] = &["Running"];

/// Settings for the reconciliation loop and its collaborators.
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// Work queues to watch
    pub queues: Vec<String>,
    /// Naming conventions for processing queues. Every watched queue is
    /// swept under each prefix.
    pub processing_prefixes: Vec<String>,
    /// Delay between two sweeps
    pub interval: Duration,
    /// Staleness switch in seconds. Zero or negative disables
    /// staleness-based repair entirely; the age gate itself is the
    /// freshness guard derived from `pod_refresh_interval`.
    pub stale_time: i64,
    /// How long a worker-liveness snapshot is trusted before re-querying the
    /// cluster. Zero refreshes on every lookup.
    pub pod_refresh_interval: Duration,
    /// Worker name prefixes whose records are always eligible for cleanup
    pub whitelisted_pods: Vec<String>,
    /// Worker phases treated as alive
    pub accepted_phases: BTreeSet<String>,
    /// Namespace to list workers in. `None` lists all namespaces.
    pub namespace: Option<String>,
    /// Fixed delay between retries of a store operation
    pub backoff: Duration,
    /// Advisory batch size for key scans
    pub scan_count: usize,
    /// Delete workers observed in a failed phase after repairing their record
    pub kill_failed_pods: bool,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            queues: vec!["predict".to_string()],
            processing_prefixes: DEFAULT_PROCESSING_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            interval: Duration::from_secs(20),
            stale_time: 600,
            pod_refresh_interval: Duration::from_secs(5),
            whitelisted_pods: vec!["zip-consumer".to_string()],
            accepted_phases: DEFAULT_ACCEPTED_PHASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            namespace: None,
            backoff: Duration::from_secs(3),
            scan_count: 1000,
            kill_failed_pods: false,
        }
    }
}

impl JanitorConfig {
    /// Build a config watching the queues in `queues`, split on `delimiter`.
    pub fn with_queues(mut self, queues: &str, delimiter: &str) -> Self {
        self.queues = split_list(queues, delimiter);
        self
    }

    pub fn with_whitelist(mut self, prefixes: &str) -> Self {
        self.whitelisted_pods = split_list(prefixes, ",");
        self
    }

    pub fn with_accepted_phases(mut self, phases: &str) -> Self {
        self.accepted_phases = split_list(phases, ",").into_iter().collect();
        self
    }

    /// Comma-separated processing queue prefixes. Repeats are dropped.
    pub fn with_processing_prefixes(mut self, prefixes: &str) -> Self {
        let mut unique = Vec::new();
        for prefix in split_list(prefixes, ",") {
            if !unique.contains(&prefix) {
                unique.push(prefix);
            }
        }
        self.processing_prefixes = unique;
        self
    }

    /// `(prefix, glob)` for every processing queue convention of `queue`.
    pub fn processing_patterns(&self, queue: &str) -> Vec<(String, String)> {
        self.processing_prefixes
            .iter()
            .map(|prefix| (prefix.clone(), format!("{}-{}:*", prefix, queue)))
            .collect()
    }

    /// Reject settings the janitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.queues.is_empty() {
            return Err(JanitorError::Config("at least one queue is required".into()));
        }
        if self.processing_prefixes.is_empty() {
            return Err(JanitorError::Config(
                "at least one processing queue prefix is required".into(),
            ));
        }
        if self.accepted_phases.is_empty() {
            return Err(JanitorError::Config(
                "at least one accepted worker phase is required".into(),
            ));
        }
        if self.scan_count == 0 {
            return Err(JanitorError::Config("scan count must be positive".into()));
        }
        Ok(())
    }
}

fn split_list(value: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        let value = value.trim();
        return if value.is_empty() {
            Vec::new()
        } else {
            vec![value.to_string()]
        };
    }
    value
        .split(delimiter)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
