//! Fixed window counter.
//!
//! Time is cut into aligned windows of `window_ms`; each identifier gets one
//! counter per window at `identifier:windowStart`, which expires with the
//! window. Cheap and exact within a window, but a burst straddling a
//! boundary can admit up to `2 * max_requests` requests in a short span:
//! the tail of one window and the head of the next are counted separately.

use tracing::{debug, trace};

use super::budget::Budget;
use super::keys::KeySpace;
use super::state::decode_or_absent;
use crate::error::Result;
use crate::store::KeyValueStore;

/// Fixed window strategy.
#[derive(Debug, Clone)]
pub struct FixedWindow {
    budget: Budget,
    keys: KeySpace,
}

impl FixedWindow {
    pub fn new(budget: Budget, keys: KeySpace) -> Self {
        Self { budget, keys }
    }

    /// Decide one request for `identifier` at `now`.
    ///
    /// The first request of a window creates the counter at 1; later
    /// requests use the store's atomic increment. If the counter expired
    /// between the read and the increment, the increment recreates it
    /// without a TTL, so the expiry is set again.
    pub async fn check(
        &self,
        store: &dyn KeyValueStore,
        identifier: &str,
        now: u64,
    ) -> Result<bool> {
        let window_start = self.budget.window_start(now);
        let key = self.keys.fixed_window(identifier, window_start);

        let count: Option<u64> = decode_or_absent(&key, store.get(&key).await?);

        match count {
            None => {
                store
                    .set_with_expiry(&key, "1", self.budget.window())
                    .await?;
                trace!(key = %key, count = 1, "Opened fixed window");
                Ok(true)
            }
            Some(count) if count >= self.budget.max_requests() => {
                debug!(
                    key = %key,
                    count = count,
                    limit = self.budget.max_requests(),
                    "Fixed window limit exceeded"
                );
                Ok(false)
            }
            Some(_) => {
                let count = store.incr(&key).await?;
                if count == 1 {
                    store.expire(&key, self.budget.window()).await?;
                }
                trace!(key = %key, count = count, "Counted request in fixed window");
                Ok(true)
            }
        }
    }
}
