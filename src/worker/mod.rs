//! Worker liveness as seen from the cluster.
//!
//! - [`LivenessSnapshot`]: cached pod name to phase mapping with an explicit
//!   refresh timestamp
//! - [`WorkerLiveness`]: answers "is this worker alive?" against a
//!   [`Cluster`](crate::cluster::Cluster), refreshing the snapshot lazily
//!
//! Cluster API failures never escape this module. A failed refresh leaves an
//! empty snapshot, so every worker looks absent and its records become
//! eligible for repair. Duplicate work is preferred over lost work.

pub mod liveness;

pub use liveness::{LivenessSnapshot, WorkerLiveness};
