use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tokio::time::Instant;

use crate::cluster::{Cluster, PodInfo};
use crate::config::JanitorConfig;

const FALLBACK_NAMESPACE: &str = "default";

/// Pods observed at the last refresh, keyed by name.
#[derive(Debug, Clone)]
pub struct LivenessSnapshot {
    pods: HashMap<String, PodInfo>,
    refreshed_at: Option<Instant>,
    refresh_interval: Duration,
}

impl LivenessSnapshot {
    pub fn new(refresh_interval: Duration) -> Self {
        Self {
            pods: HashMap::new(),
            refreshed_at: None,
            refresh_interval,
        }
    }

    /// Whether the snapshot must be refreshed before it can be trusted at `now`.
    pub fn is_stale(&self, now: Instant) -> bool {
        match self.refreshed_at {
            None => true,
            Some(_) if self.refresh_interval.is_zero() => true,
            Some(at) => now.saturating_duration_since(at) > self.refresh_interval,
        }
    }

    pub fn replace(&mut self, pods: Vec<PodInfo>, now: Instant) {
        self.pods = pods.into_iter().map(|p| (p.name.clone(), p)).collect();
        self.refreshed_at = Some(now);
    }

    /// Forget everything, so the next lookup queries the cluster.
    pub fn reset(&mut self) {
        self.pods.clear();
        self.refreshed_at = None;
    }

    pub fn get(&self, name: &str) -> Option<&PodInfo> {
        self.pods.get(name)
    }

    pub fn refreshed_at(&self) -> Option<Instant> {
        self.refreshed_at
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}

/// Tracks which workers are alive, backed by a [`Cluster`].
pub struct WorkerLiveness<C> {
    cluster: C,
    snapshot: LivenessSnapshot,
    namespace: Option<String>,
    accepted_phases: BTreeSet<String>,
    whitelisted_pods: Vec<String>,
}

impl<C: Cluster> WorkerLiveness<C> {
    pub fn new(cluster: C, config: &JanitorConfig) -> Self {
        Self {
            cluster,
            snapshot: LivenessSnapshot::new(config.pod_refresh_interval),
            namespace: config.namespace.clone(),
            accepted_phases: config.accepted_phases.clone(),
            whitelisted_pods: config.whitelisted_pods.clone(),
        }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    pub fn snapshot(&self) -> &LivenessSnapshot {
        &self.snapshot
    }

    /// Query the cluster for the current pods, replacing the snapshot.
    ///
    /// On failure the snapshot is replaced with an empty one.
    pub async fn refresh(&mut self) {
        let pods = match self.cluster.list_pods(self.namespace.as_deref()).await {
            Ok(pods) => {
                tracing::debug!(
                    namespace = ?self.namespace,
                    pods = pods.len(),
                    "Refreshed worker list"
                );
                pods
            }
            Err(e) => {
                tracing::error!(
                    namespace = ?self.namespace,
                    error = %e,
                    "Failed to list workers, treating all workers as absent"
                );
                Vec::new()
            }
        };
        self.snapshot.replace(pods, Instant::now());
    }

    /// Refresh only if the snapshot is older than the refresh interval.
    pub async fn ensure_fresh(&mut self) {
        if self.snapshot.is_stale(Instant::now()) {
            self.refresh().await;
        }
    }

    /// Current phase of `identity`, or `None` if the cluster does not know it.
    pub async fn phase_of(&mut self, identity: &str) -> Option<String> {
        self.ensure_fresh().await;
        self.snapshot.get(identity).map(|p| p.phase.clone())
    }

    /// Whether `identity` exists and is in one of the accepted phases.
    pub async fn is_worker_valid(&mut self, identity: &str) -> bool {
        match self.phase_of(identity).await {
            Some(phase) => self.accepted_phases.contains(&phase),
            None => false,
        }
    }

    /// Whether `identity` belongs to an exempt, long-running worker.
    pub fn is_whitelisted(&self, identity: &str) -> bool {
        self.whitelisted_pods
            .iter()
            .any(|prefix| identity.starts_with(prefix.as_str()))
    }

    /// Ask the cluster to delete `identity`. Returns false on API failure.
    pub async fn kill_worker(&self, identity: &str) -> bool {
        let namespace = self
            .snapshot
            .get(identity)
            .map(|p| p.namespace.as_str())
            .filter(|ns| !ns.is_empty())
            .or(self.namespace.as_deref())
            .unwrap_or(FALLBACK_NAMESPACE);

        match self.cluster.delete_pod(identity, namespace).await {
            Ok(()) => {
                tracing::info!(pod = identity, namespace, "Deleted worker");
                true
            }
            Err(e) => {
                tracing::error!(pod = identity, namespace, error = %e, "Failed to delete worker");
                false
            }
        }
    }

    /// Discard the snapshot so the next lookup starts cold.
    pub fn reset(&mut self) {
        self.snapshot.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_is_stale() {
        let snapshot = LivenessSnapshot::new(Duration::from_secs(5));
        assert!(snapshot.is_stale(Instant::now()));
        assert!(snapshot.refreshed_at().is_none());
        assert!(snapshot.is_empty());
    }

    #[test]
    fn snapshot_fresh_within_interval() {
        let mut snapshot = LivenessSnapshot::new(Duration::from_secs(5));
        let t0 = Instant::now();
        snapshot.replace(vec![PodInfo::new("pod", "default", "Running")], t0);

        assert!(!snapshot.is_stale(t0));
        assert!(!snapshot.is_stale(t0 + Duration::from_secs(5)));
        assert!(snapshot.is_stale(t0 + Duration::from_secs(6)));
        assert_eq!(snapshot.get("pod").map(|p| p.phase.as_str()), Some("Running"));
    }

    #[test]
    fn zero_interval_always_stale() {
        let mut snapshot = LivenessSnapshot::new(Duration::ZERO);
        let t0 = Instant::now();
        snapshot.replace(Vec::new(), t0);
        assert!(snapshot.is_stale(t0));
    }

    #[test]
    fn reset_clears_pods_and_timestamp() {
        let mut snapshot = LivenessSnapshot::new(Duration::from_secs(60));
        let t0 = Instant::now();
        snapshot.replace(vec![PodInfo::new("pod", "default", "Running")], t0);
        assert_eq!(snapshot.len(), 1);

        snapshot.reset();
        assert!(snapshot.is_empty());
        assert!(snapshot.refreshed_at().is_none());
        assert!(snapshot.is_stale(t0));
    }

    #[test]
    fn replace_keeps_last_pod_with_same_name() {
        let mut snapshot = LivenessSnapshot::new(Duration::from_secs(60));
        snapshot.replace(
            vec![
                PodInfo::new("pod", "a", "Pending"),
                PodInfo::new("pod", "b", "Running"),
            ],
            Instant::now(),
        );
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("pod").map(|p| p.namespace.as_str()), Some("b"));
    }
}
