//! Weighted sliding window counter.
//!
//! Keeps the fixed window counters for the current and the previous window
//! and estimates the trailing-window count by letting the previous window's
//! count decay linearly as the current window progresses:
//!
//! ```text
//! weighted = previous * (1 - elapsed_fraction) + current
//! ```
//!
//! This approximates the sliding log with two integers per identifier.

use tracing::{debug, trace};

use super::budget::Budget;
use super::keys::KeySpace;
use super::state::decode_or_absent;
use crate::error::Result;
use crate::store::KeyValueStore;

/// Sliding window counter strategy.
#[derive(Debug, Clone)]
pub struct SlidingWindowCounter {
    budget: Budget,
    keys: KeySpace,
}

impl SlidingWindowCounter {
    pub fn new(budget: Budget, keys: KeySpace) -> Self {
        Self { budget, keys }
    }

    async fn read_count(&self, store: &dyn KeyValueStore, key: &str) -> Result<u64> {
        Ok(decode_or_absent(key, store.get(key).await?).unwrap_or(0))
    }

    /// Decide one request for `identifier` at `now`.
    pub async fn check(
        &self,
        store: &dyn KeyValueStore,
        identifier: &str,
        now: u64,
    ) -> Result<bool> {
        let limit = self.budget.max_requests();
        let index = self.budget.window_index(now);
        let current_key = self.keys.window_counter(identifier, index);

        let current = self.read_count(store, &current_key).await?;
        let previous = match index.checked_sub(1) {
            Some(previous_index) => {
                let previous_key = self.keys.window_counter(identifier, previous_index);
                self.read_count(store, &previous_key).await?
            }
            None => 0,
        };

        if current >= limit {
            debug!(
                key = %current_key,
                current = current,
                limit = limit,
                "Sliding window limit exceeded in current window"
            );
            return Ok(false);
        }

        let elapsed_fraction = self.budget.elapsed_fraction(now);
        let weighted = previous as f64 * (1.0 - elapsed_fraction) + current as f64;
        if weighted >= limit as f64 {
            debug!(
                key = %current_key,
                previous = previous,
                current = current,
                weighted = weighted,
                limit = limit,
                "Sliding window weighted limit exceeded"
            );
            return Ok(false);
        }

        // Kept for two windows so the counter is still there when it becomes
        // the previous window.
        store
            .set_with_expiry(
                &current_key,
                &(current + 1).to_string(),
                self.budget.window() * 2,
            )
            .await?;

        trace!(
            key = %current_key,
            count = current + 1,
            weighted = weighted,
            "Counted request in sliding window"
        );
        Ok(true)
    }
}
