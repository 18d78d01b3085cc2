use std::collections::HashMap;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::store::{ScanPage, Store, StoreResult};

/// [`Store`] backed by a Redis server.
///
/// The connection manager reconnects on its own; commands issued while the
/// server is unreachable fail with [`StoreError::Connection`](crate::error::StoreError::Connection).
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `redis://{host}:{port}`.
    pub async fn connect(host: &str, port: u16) -> StoreResult<Self> {
        let url = format!("redis://{}:{}", host, port);
        let client = redis::Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(host, port, "Connected to Redis");
        Ok(Self { conn })
    }
}

impl Store for RedisStore {
    async fn hget(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(fields)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn lrem(&self, key: &str, count: i64, value: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let removed: u64 = conn.lrem(key, count as isize, value).await?;
        Ok(removed)
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.lpush(key, value).await?;
        Ok(len)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let items: Vec<String> = conn.lrange(key, start as isize, stop as isize).await?;
        Ok(items)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> StoreResult<ScanPage> {
        let mut conn = self.conn.clone();
        let (cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(ScanPage { cursor, keys })
    }

    async fn key_type(&self, key: &str) -> StoreResult<String> {
        let mut conn = self.conn.clone();
        let kind: String = conn.key_type(key).await?;
        Ok(kind)
    }
}

