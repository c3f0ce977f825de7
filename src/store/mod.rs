//! Key-value store abstraction used by the rate limiting strategies.
//!
//! Strategies only need single-key primitives that the store executes
//! atomically: scalar get/set/increment, small hashes, sorted sets scored by
//! millisecond timestamps, and key expiry. Connection management belongs to
//! the implementation.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Store operations the rate limiting strategies are built on.
///
/// Every method is a single round trip. Errors of any kind surface as
/// [`LimitError::StoreUnavailable`](crate::error::LimitError::StoreUnavailable).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a string value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string value that expires after `ttl`.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Atomically increment an integer value, creating it at 0 first if absent.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Read several hash fields at once. Missing fields come back as `None`.
    async fn hash_get_multiple(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>>;

    /// Write several hash fields at once.
    async fn hash_set_multiple(&self, key: &str, fields: &[(&str, String)]) -> Result<()>;

    /// Add `member` to a sorted set with `score`.
    async fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<()>;

    /// Remove sorted set members with `min <= score <= max`.
    async fn sorted_set_remove_range_by_score(&self, key: &str, min: f64, max: f64)
        -> Result<()>;

    /// Number of members in a sorted set (0 if absent).
    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64>;

    /// Set a key's time to live. A missing key is not an error.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<()>;
}
