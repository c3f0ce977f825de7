//! Sliding window log.
//!
//! Every admitted request is recorded in a sorted set scored by its
//! timestamp. Before each decision entries older than one window are pruned,
//! so the set's cardinality is exactly the number of requests admitted in
//! the trailing window. Exact at any instant, at the cost of one entry per
//! request held for a full window.

use tracing::{debug, trace};

use super::budget::Budget;
use super::keys::KeySpace;
use crate::error::Result;
use crate::store::KeyValueStore;

/// Sliding log strategy.
#[derive(Debug, Clone)]
pub struct SlidingLog {
    budget: Budget,
    keys: KeySpace,
}

impl SlidingLog {
    pub fn new(budget: Budget, keys: KeySpace) -> Self {
        Self { budget, keys }
    }

    /// Decide one request for `identifier` at `now`.
    ///
    /// Pruning happens whether or not the request is admitted.
    pub async fn check(
        &self,
        store: &dyn KeyValueStore,
        identifier: &str,
        now: u64,
    ) -> Result<bool> {
        let key = self.keys.sliding_log(identifier);

        // Scores are whole milliseconds: `score < now - window` is `score <= now - window - 1`.
        let cutoff = now as f64 - self.budget.window_ms() as f64 - 1.0;
        store
            .sorted_set_remove_range_by_score(&key, f64::NEG_INFINITY, cutoff)
            .await?;

        let count = store.sorted_set_cardinality(&key).await?;
        if count >= self.budget.max_requests() {
            debug!(
                key = %key,
                count = count,
                limit = self.budget.max_requests(),
                "Sliding log limit exceeded"
            );
            return Ok(false);
        }

        store
            .sorted_set_add(&key, now as f64, &log_member(now))
            .await?;
        store.expire(&key, self.budget.state_ttl()).await?;

        trace!(key = %key, count = count + 1, "Logged request");
        Ok(true)
    }
}

/// Sorted set member for a request at `now`.
///
/// Members must be unique per request: two requests in the same millisecond
/// would otherwise collapse into one entry and only be counted once.
fn log_member(now: u64) -> String {
    format!("{}-{:08x}", now, rand::random::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(max_requests: u64, window_ms: u64) -> (SlidingLog, MemoryStore) {
        let store = MemoryStore::with_clock(Arc::new(ManualClock::new(0)));
        let strategy = SlidingLog::new(
            Budget::new(max_requests, window_ms).unwrap(),
            KeySpace::default(),
        );
        (strategy, store)
    }

    #[tokio::test]
    async fn test_same_millisecond_requests_are_counted_separately() {
        let (strategy, store) = setup(3, 1_000);

        for _ in 0..3 {
            assert!(strategy.check(&store, "a", 500).await.unwrap());
        }
        assert!(!strategy.check(&store, "a", 500).await.unwrap());
        assert_eq!(store.sorted_set_cardinality("sliding:a").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_entries_leave_window_after_exactly_window_ms() {
        let (strategy, store) = setup(1, 1_000);

        assert!(strategy.check(&store, "a", 2_000).await.unwrap());
        // The entry at 2000 is still inside [now - window, now] at 3000.
        assert!(!strategy.check(&store, "a", 3_000).await.unwrap());
        assert!(strategy.check(&store, "a", 3_001).await.unwrap());
    }

    #[tokio::test]
    async fn test_denied_request_still_prunes() {
        let (strategy, store) = setup(2, 1_000);

        strategy.check(&store, "a", 0).await.unwrap();
        strategy.check(&store, "a", 900).await.unwrap();
        assert!(!strategy.check(&store, "a", 950).await.unwrap());

        // Entry at 0 is pruned; the one at 900 remains and the new one is added.
        assert!(strategy.check(&store, "a", 1_500).await.unwrap());
        assert_eq!(store.sorted_set_cardinality("sliding:a").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_log_expiry_refreshed_on_write() {
        let (strategy, store) = setup(5, 10_000);

        strategy.check(&store, "a", 0).await.unwrap();
        assert_eq!(store.ttl("sliding:a"), Some(Duration::from_secs(70)));
    }

    #[test]
    fn test_log_members_are_unique() {
        assert_ne!(log_member(1), log_member(1));
        assert!(log_member(1234).starts_with("1234-"));
    }
}
