use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::Result;
use crate::store::{Store, StoreResult};

/// Retry wrapper around a [`Store`].
///
/// Every operation is retried forever while the store reports a connection
/// error, sleeping `backoff` between attempts. Any other error is returned
/// to the caller untouched.
pub struct QueueAccessor<S> {
    store: S,
    backoff: Duration,
}

impl<S: Store> QueueAccessor<S> {
    pub fn new(store: S, backoff: Duration) -> Self {
        Self { store, backoff }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn retry<T, F, Fut>(&self, command: &'static str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt: u64 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_connection() => {
                    attempt += 1;
                    tracing::warn!(
                        command,
                        attempt,
                        error = %e,
                        backoff = ?self.backoff,
                        "Store unreachable, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.retry("HGET", || self.store.hget(key, field)).await
    }

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.retry("HGETALL", || self.store.hgetall(key)).await
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.retry("HSET", || self.store.hset(key, field, value)).await
    }

    /// Remove one occurrence of `value` from `list`. Returns whether anything
    /// was removed.
    pub async fn lrem(&self, list: &str, value: &str) -> Result<bool> {
        let removed = self.retry("LREM", || self.store.lrem(list, 1, value)).await?;
        Ok(removed > 0)
    }

    pub async fn lpush(&self, list: &str, value: &str) -> Result<u64> {
        self.retry("LPUSH", || self.store.lpush(list, value)).await
    }

    /// Every element of `list`, head first.
    pub async fn lrange_all(&self, list: &str) -> Result<Vec<String>> {
        self.retry("LRANGE", || self.store.lrange(list, 0, -1)).await
    }

    pub async fn key_type(&self, key: &str) -> Result<String> {
        self.retry("TYPE", || self.store.key_type(key)).await
    }

    /// Start a lazy scan over keys matching `pattern`.
    pub fn scan(&self, pattern: &str, count: usize) -> KeyScan<'_, S> {
        KeyScan {
            accessor: self,
            pattern: pattern.to_string(),
            count,
            cursor: 0,
            buffer: VecDeque::new(),
            seen: HashSet::new(),
            finished: false,
            started: Instant::now(),
        }
    }
}

/// One-pass cursor over the keys matching a scan pattern.
///
/// Pages are fetched on demand. A key reported twice by the store is only
/// yielded once. Once exhausted the scan stays exhausted; start a new one
/// with [`QueueAccessor::scan`].
pub struct KeyScan<'a, S> {
    accessor: &'a QueueAccessor<S>,
    pattern: String,
    count: usize,
    cursor: u64,
    buffer: VecDeque<String>,
    seen: HashSet<String>,
    finished: bool,
    started: Instant,
}

impl<S: Store> KeyScan<'_, S> {
    pub async fn next(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(key) = self.buffer.pop_front() {
                return Ok(Some(key));
            }
            if self.finished {
                return Ok(None);
            }

            let accessor = self.accessor;
            let (cursor, pattern, count) = (self.cursor, self.pattern.as_str(), self.count);
            let page = accessor
                .retry("SCAN", || accessor.store.scan(cursor, pattern, count))
                .await?;

            self.cursor = page.cursor;
            self.finished = page.cursor == 0;
            for key in page.keys {
                if self.seen.insert(key.clone()) {
                    self.buffer.push_back(key);
                }
            }

            if self.finished {
                tracing::debug!(
                    pattern = %self.pattern,
                    keys = self.seen.len(),
                    elapsed = ?self.started.elapsed(),
                    "Finished SCAN"
                );
            }
        }
    }

    /// Drain the remaining keys into a vector.
    pub async fn collect(mut self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        while let Some(key) = self.next().await? {
            keys.push(key);
        }
        Ok(keys)
    }
}
