//! Reconciles a Redis-backed work queue against the liveness of the
//! Kubernetes pods that consume it.
//!
//! Records stranded in the processing queue of a dead or failed worker are
//! pushed back onto their work queue; finished or corrupt entries are
//! dropped. See [`janitor`] for the sweep itself.

pub mod cluster;
pub mod config;
pub mod dashboard;
pub mod driver;
pub mod error;
pub mod janitor;
pub mod shutdown;
pub mod store;
pub mod worker;

pub use config::JanitorConfig;
pub use driver::Driver;
pub use error::{JanitorError, Result};
pub use janitor::Janitor;
