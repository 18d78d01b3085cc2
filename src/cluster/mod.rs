//! Compute cluster running the worker pods.
//!
//! The janitor only needs two things from the cluster: the current pods with
//! their phases, and the ability to delete a pod. [`KubectlCluster`] provides
//! both by driving `kubectl`.

pub mod kubectl;

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

pub use kubectl::KubectlCluster;

pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

/// A worker pod as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodInfo {
    pub name: String,
    pub namespace: String,
    pub phase: String,
}

impl PodInfo {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        phase: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            phase: phase.into(),
        }
    }
}

pub trait Cluster: Send + Sync {
    /// List pods in `namespace`, or in every namespace when `None`.
    fn list_pods(
        &self,
        namespace: Option<&str>,
    ) -> impl Future<Output = ClusterResult<Vec<PodInfo>>> + Send;

    fn delete_pod(
        &self,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = ClusterResult<()>> + Send;
}
