//! The aggregate store: durable owner of every per-route count and total.
//!
//! The aggregator only ever talks to the [`AggregateStore`] trait, so the
//! same engine runs against Redis in production and [`MemoryStore`] in tests.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use async_trait::async_trait;

use crate::error::StoreResult;

/// Ranked key-value capability backing the latency aggregate.
///
/// Every operation is individually atomic. Nothing here offers
/// multi-key transactions, and the aggregator never needs them.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Read a scalar string value.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Overwrite a scalar string value.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Atomically add `delta` to an integer hash field, returning the new value.
    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64>;

    /// Atomically add `delta` to a float hash field, returning the new value.
    async fn hash_incr_float(&self, key: &str, field: &str, delta: f64) -> StoreResult<f64>;

    /// Read several hash fields at once; absent fields come back as `None`.
    async fn hash_get_many(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<f64>>>;

    /// Insert or overwrite a member's score in a ranked set.
    async fn ranked_set_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    /// Members with `min <= score <= max` (no upper bound when `max` is
    /// `None`), highest score first, at most `limit` of them.
    async fn ranked_set_rev_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: Option<f64>,
        limit: usize,
    ) -> StoreResult<Vec<(String, f64)>>;

    /// Delete keys. Keys that do not exist are ignored.
    async fn delete(&self, keys: &[String]) -> StoreResult<()>;
}

/// Fully-qualified key names under one namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys {
    pub settings: String,
    pub scores: String,
    pub counts: String,
    pub totals: String,
}

impl Keys {
    pub fn new(prefix: &str) -> Self {
        Self {
            settings: format!("{prefix}:settings"),
            scores: format!("{prefix}:routes:scores"),
            counts: format!("{prefix}:routes:counts"),
            totals: format!("{prefix}:routes:totals"),
        }
    }

    /// Every key holding route data. Settings are not included.
    pub fn route_keys(&self) -> Vec<String> {
        vec![self.scores.clone(), self.counts.clone(), self.totals.clone()]
    }
}

impl Default for Keys {
    fn default() -> Self {
        Self::new("latency")
    }
}
