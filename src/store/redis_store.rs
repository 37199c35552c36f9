use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::AggregateStore;
use crate::error::StoreResult;

/// [`AggregateStore`] backed by a Redis hash/sorted-set layout.
///
/// `ConnectionManager` is cheaply cloneable and reconnects on its own, so
/// every call clones it instead of holding a lock across the round-trip.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl AggregateStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = redis::cmd("HINCRBY")
            .arg(key)
            .arg(field)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn hash_incr_float(&self, key: &str, field: &str, delta: f64) -> StoreResult<f64> {
        let mut conn = self.conn.clone();
        let value: f64 = redis::cmd("HINCRBYFLOAT")
            .arg(key)
            .arg(field)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn hash_get_many(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<f64>>> {
        // HMGET with no fields is a Redis syntax error
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<f64>> = redis::cmd("HMGET")
            .arg(key)
            .arg(fields)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn ranked_set_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ranked_set_rev_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: Option<f64>,
        limit: usize,
    ) -> StoreResult<Vec<(String, f64)>> {
        let mut conn = self.conn.clone();
        let max = max.map_or_else(|| "+inf".to_owned(), |m| m.to_string());
        let entries: Vec<(String, f64)> = redis::cmd("ZREVRANGEBYSCORE")
            .arg(key)
            .arg(max)
            .arg(min)
            .arg("WITHSCORES")
            .arg("LIMIT")
            .arg(0)
            .arg(limit)
            .query_async(&mut conn)
            .await?;
        Ok(entries)
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        // A single DEL removes every key or none of them
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }
}
