//! Leaky bucket.
//!
//! Each admitted request adds one unit to the bucket; the bucket drains one
//! unit every `window_ms / max_requests` milliseconds. A full bucket denies.
//! Bursts fill the bucket instantly, but it drains at the same fixed rate
//! whatever the burst looked like.

use tracing::{debug, trace};

use super::budget::Budget;
use super::keys::KeySpace;
use super::state::decode_or_absent;
use crate::error::Result;
use crate::store::KeyValueStore;

const LAST_REQUEST: &str = "lastRequest";
const BUCKET_LEVEL: &str = "bucketLevel";

/// Leaky bucket strategy.
#[derive(Debug, Clone)]
pub struct LeakyBucket {
    budget: Budget,
    keys: KeySpace,
}

impl LeakyBucket {
    pub fn new(budget: Budget, keys: KeySpace) -> Self {
        Self { budget, keys }
    }

    /// Bucket level at `now`, given the stored level and time of the last admitted request.
    pub fn drained_level(&self, level: f64, last_request: u64, now: u64) -> f64 {
        let elapsed = now.saturating_sub(last_request) as f64;
        let leaked = (elapsed / self.budget.leak_interval_ms()).floor();
        (level - leaked).max(0.0)
    }

    /// Decide one request for `identifier` at `now`.
    pub async fn check(
        &self,
        store: &dyn KeyValueStore,
        identifier: &str,
        now: u64,
    ) -> Result<bool> {
        let key = self.keys.leaky_bucket(identifier);

        let mut fields = store
            .hash_get_multiple(&key, &[LAST_REQUEST, BUCKET_LEVEL])
            .await?
            .into_iter();
        let last_request: u64 = decode_or_absent(&key, fields.next().flatten()).unwrap_or(0);
        let level: f64 = decode_or_absent(&key, fields.next().flatten())
            .filter(|level: &f64| level.is_finite())
            .unwrap_or(0.0);

        let level = self.drained_level(level, last_request, now);
        if level >= self.budget.max_requests() as f64 {
            debug!(
                key = %key,
                level = level,
                capacity = self.budget.max_requests(),
                "Leaky bucket full"
            );
            return Ok(false);
        }

        let level = level + 1.0;
        store
            .hash_set_multiple(
                &key,
                &[(LAST_REQUEST, now.to_string()), (BUCKET_LEVEL, level.to_string())],
            )
            .await?;
        store.expire(&key, self.budget.state_ttl()).await?;

        trace!(key = %key, level = level, "Added request to leaky bucket");
        Ok(true)
    }
}
