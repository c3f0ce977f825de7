//! Test doubles shared by the rate limiting tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{Algorithm, Budget, RateLimiter};
use crate::clock::ManualClock;
use crate::error::{LimitError, Result};
use crate::store::{KeyValueStore, MemoryStore};

/// A limiter on a fresh in-memory store, with the store and limiter sharing one manual clock.
pub(crate) fn limiter(
    algorithm: Algorithm,
    max_requests: u64,
    window_ms: u64,
    start: u64,
) -> (RateLimiter, MemoryStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start));
    let store = MemoryStore::with_clock(clock.clone());
    let limiter = RateLimiter::with_clock(
        algorithm,
        Budget::new(max_requests, window_ms).unwrap(),
        Arc::new(store.clone()),
        clock.clone(),
    );
    (limiter, store, clock)
}

/// A store whose every operation fails, as if the server were down.
#[derive(Debug, Default)]
pub(crate) struct UnavailableStore;

fn down<T>() -> Result<T> {
    Err(LimitError::StoreUnavailable("connection refused".to_string()))
}

#[async_trait]
impl KeyValueStore for UnavailableStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        down()
    }

    async fn set_with_expiry(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        down()
    }

    async fn incr(&self, _key: &str) -> Result<i64> {
        down()
    }

    async fn hash_get_multiple(&self, _key: &str, _fields: &[&str]) -> Result<Vec<Option<String>>> {
        down()
    }

    async fn hash_set_multiple(&self, _key: &str, _fields: &[(&str, String)]) -> Result<()> {
        down()
    }

    async fn sorted_set_add(&self, _key: &str, _score: f64, _member: &str) -> Result<()> {
        down()
    }

    async fn sorted_set_remove_range_by_score(
        &self,
        _key: &str,
        _min: f64,
        _max: f64,
    ) -> Result<()> {
        down()
    }

    async fn sorted_set_cardinality(&self, _key: &str) -> Result<u64> {
        down()
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<()> {
        down()
    }

    async fn ping(&self) -> Result<()> {
        down()
    }
}

/// A store that reads fine but fails every write.
///
/// Exercises the path where the decision is made and persisting it fails.
#[derive(Debug, Default)]
pub(crate) struct ReadOnlyStore {
    inner: MemoryStore,
}

#[async_trait]
impl KeyValueStore for ReadOnlyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn set_with_expiry(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        down()
    }

    async fn incr(&self, _key: &str) -> Result<i64> {
        down()
    }

    async fn hash_get_multiple(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        self.inner.hash_get_multiple(key, fields).await
    }

    async fn hash_set_multiple(&self, _key: &str, _fields: &[(&str, String)]) -> Result<()> {
        down()
    }

    async fn sorted_set_add(&self, _key: &str, _score: f64, _member: &str) -> Result<()> {
        down()
    }

    async fn sorted_set_remove_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<()> {
        self.inner
            .sorted_set_remove_range_by_score(key, min, max)
            .await
    }

    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64> {
        self.inner.sorted_set_cardinality(key).await
    }

    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<()> {
        down()
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// A store whose reads take `delay` of the shared clock to come back.
///
/// Values are read at the start of the round trip, then the clock moves on
/// before the caller sees them, so keys can expire between a read and the
/// write that follows it.
#[derive(Debug)]
pub(crate) struct SlowReadStore {
    inner: MemoryStore,
    clock: Arc<ManualClock>,
    delay: Duration,
}

impl SlowReadStore {
    pub(crate) fn new(inner: MemoryStore, clock: Arc<ManualClock>, delay: Duration) -> Self {
        Self { inner, clock, delay }
    }
}

#[async_trait]
impl KeyValueStore for SlowReadStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self.inner.get(key).await;
        self.clock.advance(self.delay);
        value
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.inner.set_with_expiry(key, value, ttl).await
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.inner.incr(key).await
    }

    async fn hash_get_multiple(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        let values = self.inner.hash_get_multiple(key, fields).await;
        self.clock.advance(self.delay);
        values
    }

    async fn hash_set_multiple(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        self.inner.hash_set_multiple(key, fields).await
    }

    async fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<()> {
        self.inner.sorted_set_add(key, score, member).await
    }

    async fn sorted_set_remove_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<()> {
        self.inner
            .sorted_set_remove_range_by_score(key, min, max)
            .await
    }

    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64> {
        let count = self.inner.sorted_set_cardinality(key).await;
        self.clock.advance(self.delay);
        count
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.inner.expire(key, ttl).await
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}
