use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::AggregateStore;
use crate::error::{StoreError, StoreResult};

/// In-process [`AggregateStore`] with Redis-like semantics.
///
/// Hash fields are kept as strings the way Redis keeps them, so an integer
/// increment against a float field fails here just as it would there.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    ranked: HashMap<String, HashMap<String, f64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of top-level keys currently held, across all value types.
    pub fn key_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.strings.len() + inner.hashes.len() + inner.ranked.len()
    }
}

fn not_a_number(key: &str, field: &str, value: &str) -> StoreError {
    StoreError::Corrupt {
        key: format!("{key}/{field}"),
        reason: format!("{value:?} is not a number"),
    }
}

#[async_trait]
impl AggregateStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.inner.lock().strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner
            .lock()
            .strings
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn hash_incr(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        let mut inner = self.inner.lock();
        let slot = inner
            .hashes
            .entry(key.to_owned())
            .or_default()
            .entry(field.to_owned())
            .or_insert_with(|| "0".to_owned());
        let current: i64 = slot.parse().map_err(|_| not_a_number(key, field, slot))?;
        let next = current + delta;
        *slot = next.to_string();
        Ok(next)
    }

    async fn hash_incr_float(&self, key: &str, field: &str, delta: f64) -> StoreResult<f64> {
        let mut inner = self.inner.lock();
        let slot = inner
            .hashes
            .entry(key.to_owned())
            .or_default()
            .entry(field.to_owned())
            .or_insert_with(|| "0".to_owned());
        let current: f64 = slot.parse().map_err(|_| not_a_number(key, field, slot))?;
        let next = current + delta;
        *slot = next.to_string();
        Ok(next)
    }

    async fn hash_get_many(&self, key: &str, fields: &[String]) -> StoreResult<Vec<Option<f64>>> {
        let inner = self.inner.lock();
        let hash = inner.hashes.get(key);
        fields
            .iter()
            .map(|field| match hash.and_then(|h| h.get(field)) {
                None => Ok(None),
                Some(raw) => raw
                    .parse()
                    .map(Some)
                    .map_err(|_| not_a_number(key, field, raw)),
            })
            .collect()
    }

    async fn ranked_set_add(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        self.inner
            .lock()
            .ranked
            .entry(key.to_owned())
            .or_default()
            .insert(member.to_owned(), score);
        Ok(())
    }

    async fn ranked_set_rev_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: Option<f64>,
        limit: usize,
    ) -> StoreResult<Vec<(String, f64)>> {
        let inner = self.inner.lock();
        let Some(set) = inner.ranked.get(key) else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<(String, f64)> = set
            .iter()
            .filter(|&(_, &score)| score >= min && max.map_or(true, |m| score <= m))
            .map(|(member, &score)| (member.clone(), score))
            .collect();
        // Redis orders equal scores by reverse member order in a REV range
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        entries.truncate(limit);
        Ok(entries)
    }

    async fn delete(&self, keys: &[String]) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        for key in keys {
            inner.strings.remove(key);
            inner.hashes.remove(key);
            inner.ranked.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increments_accumulate() {
        let store = MemoryStore::new();
        assert_eq!(store.hash_incr("h", "a", 2).await.unwrap(), 2);
        assert_eq!(store.hash_incr("h", "a", 3).await.unwrap(), 5);
        assert_eq!(store.hash_incr_float("f", "a", 0.5).await.unwrap(), 0.5);
        assert_eq!(store.hash_incr_float("f", "a", 1.25).await.unwrap(), 1.75);

        let got = store
            .hash_get_many("h", &["a".into(), "missing".into()])
            .await
            .unwrap();
        assert_eq!(got, vec![Some(5.0), None]);
    }

    #[tokio::test]
    async fn integer_increment_on_float_field_fails() {
        let store = MemoryStore::new();
        store.hash_incr_float("h", "a", 1.5).await.unwrap();
        assert!(store.hash_incr("h", "a", 1).await.is_err());
    }

    #[tokio::test]
    async fn rev_range_orders_filters_and_limits() {
        let store = MemoryStore::new();
        store.ranked_set_add("z", "low", 1.0).await.unwrap();
        store.ranked_set_add("z", "high", 30.0).await.unwrap();
        store.ranked_set_add("z", "mid", 10.0).await.unwrap();
        store.ranked_set_add("z", "neg", -4.0).await.unwrap();

        let all = store
            .ranked_set_rev_range_by_score("z", 0.0, None, 10)
            .await
            .unwrap();
        let names: Vec<_> = all.iter().map(|(m, _)| m.as_str()).collect();
        assert_eq!(names, ["high", "mid", "low"]);

        let top = store
            .ranked_set_rev_range_by_score("z", 0.0, Some(20.0), 1)
            .await
            .unwrap();
        assert_eq!(top, vec![("mid".to_owned(), 10.0)]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryStore::new();
        store.set("s", "v").await.unwrap();
        store.ranked_set_add("z", "m", 1.0).await.unwrap();

        let keys = vec!["s".to_owned(), "z".to_owned(), "absent".to_owned()];
        store.delete(&keys).await.unwrap();
        store.delete(&keys).await.unwrap();
        assert_eq!(store.key_count(), 0);
    }
}
