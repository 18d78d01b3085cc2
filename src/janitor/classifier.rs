//! Staleness decision for in-flight records.
//!
//! The decision is split in two so the cheap checks never touch the cluster:
//! [`precheck`] settles everything that depends only on the record's age and
//! the worker's name, and only [`Precheck::CheckLiveness`] requires asking
//! the cluster whether the worker is alive.

use crate::config::JanitorConfig;

/// How many refresh intervals a record must age before a liveness verdict is
/// trusted. A worker that just claimed a record may not be in the snapshot yet.
pub const FRESHNESS_GUARD_FACTOR: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StalenessPolicy {
    /// Zero or negative disables repair; any positive value enables it
    pub stale_time: i64,
    /// Ages at or below this many seconds are never repaired
    pub freshness_guard: f64,
}

impl StalenessPolicy {
    pub fn new(stale_time: i64, pod_refresh_interval_secs: f64) -> Self {
        Self {
            stale_time,
            freshness_guard: pod_refresh_interval_secs * FRESHNESS_GUARD_FACTOR,
        }
    }

    pub fn from_config(config: &JanitorConfig) -> Self {
        Self::new(config.stale_time, config.pod_refresh_interval.as_secs_f64())
    }

    pub fn enabled(&self) -> bool {
        self.stale_time > 0
    }
}

/// Outcome of the cluster-independent part of the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precheck {
    /// Staleness-based repair is switched off
    Disabled,
    /// The record was updated too recently to judge
    TooFresh,
    /// The worker is exempt from liveness checks; repair
    Whitelisted,
    /// Repair only if the worker is not alive
    CheckLiveness,
}

impl Precheck {
    /// The final verdict, if no liveness lookup is needed.
    pub fn verdict(self) -> Option<bool> {
        match self {
            Precheck::Disabled | Precheck::TooFresh => Some(false),
            Precheck::Whitelisted => Some(true),
            Precheck::CheckLiveness => None,
        }
    }
}

pub fn precheck(policy: &StalenessPolicy, age_seconds: f64, whitelisted: bool) -> Precheck {
    if !policy.enabled() {
        return Precheck::Disabled;
    }
    if age_seconds <= policy.freshness_guard {
        return Precheck::TooFresh;
    }
    if whitelisted {
        return Precheck::Whitelisted;
    }
    Precheck::CheckLiveness
}

/// Full decision given the worker's liveness.
pub fn should_repair(
    policy: &StalenessPolicy,
    age_seconds: f64,
    whitelisted: bool,
    worker_valid: bool,
) -> bool {
    precheck(policy, age_seconds, whitelisted)
        .verdict()
        .unwrap_or(!worker_valid)
}
