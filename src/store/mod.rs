//! Shared key-value store holding job records and queues.
//!
//! - [`Store`]: the raw operations the janitor needs from the store
//! - [`RedisStore`]: production implementation over a Redis connection manager
//! - [`QueueAccessor`]: retry wrapper absorbing transient connectivity failures
//!
//! Implementations must report lost connectivity as
//! [`StoreError::Connection`](crate::error::StoreError::Connection) so the
//! accessor can tell it apart from command failures.

pub mod accessor;
pub mod redis_store;

use std::collections::HashMap;
use std::future::Future;

use crate::error::StoreError;

pub use accessor::{KeyScan, QueueAccessor};
pub use redis_store::RedisStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One page of a cursor-based key scan. A `cursor` of zero ends the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

pub trait Store: Send + Sync {
    fn hget(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    fn hgetall(&self, key: &str) -> impl Future<Output = StoreResult<HashMap<String, String>>> + Send;

    fn hset(&self, key: &str, field: &str, value: &str)
        -> impl Future<Output = StoreResult<()>> + Send;

    /// Remove up to `count` occurrences of `value` from the list at `key`.
    /// Returns the number of elements removed.
    fn lrem(&self, key: &str, count: i64, value: &str)
        -> impl Future<Output = StoreResult<u64>> + Send;

    /// Push `value` onto the head of the list at `key`. Returns the new length.
    fn lpush(&self, key: &str, value: &str) -> impl Future<Output = StoreResult<u64>> + Send;

    fn lrange(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> impl Future<Output = StoreResult<Vec<String>>> + Send;

    /// Fetch the next page of keys matching the glob `pattern`, starting at
    /// `cursor` (zero for a fresh scan). `count` is only a hint.
    fn scan(
        &self,
        cursor: u64,
        pattern: &str,
        count: usize,
    ) -> impl Future<Output = StoreResult<ScanPage>> + Send;

    /// Type name of the value at `key` (`"list"`, `"hash"`, `"none"`, ...).
    fn key_type(&self, key: &str) -> impl Future<Output = StoreResult<String>> + Send;
}
