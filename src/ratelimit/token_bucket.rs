//! Token bucket with whole-window refill.
//!
//! The bucket holds up to `max_requests` tokens and each admitted request
//! spends one. Refill is all-or-nothing: once a full window has passed since
//! the last refill, the bucket is topped back up to `max_requests` (and the
//! current request spends one of those). There is no proportional trickle
//! between refills, unlike a continuous-rate token bucket.

use tracing::{debug, trace};

use super::budget::Budget;
use super::keys::KeySpace;
use super::state::decode_or_absent;
use crate::error::Result;
use crate::store::KeyValueStore;

const TOKEN_COUNT: &str = "tokenCount";
const LAST_REFILL: &str = "lastRefill";

/// Token bucket strategy.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    budget: Budget,
    keys: KeySpace,
}

impl TokenBucket {
    pub fn new(budget: Budget, keys: KeySpace) -> Self {
        Self { budget, keys }
    }

    /// Decide one request for `identifier` at `now`.
    pub async fn check(
        &self,
        store: &dyn KeyValueStore,
        identifier: &str,
        now: u64,
    ) -> Result<bool> {
        let key = self.keys.token_bucket(identifier);
        let capacity = self.budget.max_requests();

        let mut fields = store
            .hash_get_multiple(&key, &[TOKEN_COUNT, LAST_REFILL])
            .await?
            .into_iter();
        let tokens: u64 = decode_or_absent::<u64>(&key, fields.next().flatten())
            .unwrap_or(capacity)
            .min(capacity);
        let last_refill: u64 = decode_or_absent(&key, fields.next().flatten()).unwrap_or(0);

        if now.saturating_sub(last_refill) >= self.budget.window_ms() {
            let tokens = capacity - 1;
            store
                .hash_set_multiple(
                    &key,
                    &[(TOKEN_COUNT, tokens.to_string()), (LAST_REFILL, now.to_string())],
                )
                .await?;
            store.expire(&key, self.budget.state_ttl()).await?;

            trace!(key = %key, tokens = tokens, "Refilled token bucket");
            return Ok(true);
        }

        if tokens == 0 {
            debug!(
                key = %key,
                last_refill = last_refill,
                "Token bucket empty"
            );
            return Ok(false);
        }

        let tokens = tokens - 1;
        store
            .hash_set_multiple(&key, &[(TOKEN_COUNT, tokens.to_string())])
            .await?;
        store.expire(&key, self.budget.state_ttl()).await?;

        trace!(key = %key, tokens = tokens, "Spent token");
        Ok(true)
    }
}
