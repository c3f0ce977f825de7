//! The rate limiter: one algorithm, one budget, one store.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{trace, warn};

use super::backend::Admission;
use super::budget::{Algorithm, Budget};
use super::fixed_window::FixedWindow;
use super::keys::KeySpace;
use super::leaky_bucket::LeakyBucket;
use super::sliding_log::SlidingLog;
use super::sliding_window::SlidingWindowCounter;
use super::token_bucket::TokenBucket;
use crate::clock::{Clock, SystemClock};
use crate::config::LimiterConfig;
use crate::error::Result;
use crate::store::KeyValueStore;

/// The strategy selected at construction.
#[derive(Debug, Clone)]
enum Strategy {
    FixedWindow(FixedWindow),
    SlidingLog(SlidingLog),
    SlidingWindow(SlidingWindowCounter),
    LeakyBucket(LeakyBucket),
    TokenBucket(TokenBucket),
}

impl Strategy {
    fn new(algorithm: Algorithm, budget: Budget, keys: KeySpace) -> Self {
        match algorithm {
            Algorithm::FixedWindow => Strategy::FixedWindow(FixedWindow::new(budget, keys)),
            Algorithm::SlidingLog => Strategy::SlidingLog(SlidingLog::new(budget, keys)),
            Algorithm::SlidingWindow => {
                Strategy::SlidingWindow(SlidingWindowCounter::new(budget, keys))
            }
            Algorithm::LeakyBucket => Strategy::LeakyBucket(LeakyBucket::new(budget, keys)),
            Algorithm::TokenBucket => Strategy::TokenBucket(TokenBucket::new(budget, keys)),
        }
    }

    async fn check(&self, store: &dyn KeyValueStore, identifier: &str, now: u64) -> Result<bool> {
        match self {
            Strategy::FixedWindow(s) => s.check(store, identifier, now).await,
            Strategy::SlidingLog(s) => s.check(store, identifier, now).await,
            Strategy::SlidingWindow(s) => s.check(store, identifier, now).await,
            Strategy::LeakyBucket(s) => s.check(store, identifier, now).await,
            Strategy::TokenBucket(s) => s.check(store, identifier, now).await,
        }
    }
}

/// Per-identifier rate limiter backed by a shared key-value store.
///
/// Holds no per-identifier state of its own: every decision reads the store,
/// so any number of limiters (in one process or many) with the same
/// algorithm and budget can share a store and agree on decisions, up to the
/// read-decide-write races described on [`RateLimiter::check`].
pub struct RateLimiter {
    algorithm: Algorithm,
    budget: Budget,
    strategy: Strategy,
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter on the system clock.
    pub fn new(algorithm: Algorithm, budget: Budget, store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(algorithm, budget, store, Arc::new(SystemClock))
    }

    /// Create a limiter that reads time from `clock`.
    pub fn with_clock(
        algorithm: Algorithm,
        budget: Budget,
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            algorithm,
            budget,
            strategy: Strategy::new(algorithm, budget, KeySpace::default()),
            store,
            clock,
        }
    }

    /// Create a limiter from configuration.
    pub fn from_config(config: &LimiterConfig, store: Arc<dyn KeyValueStore>) -> Result<Self> {
        let budget = config.budget()?;
        Ok(Self::new(config.algorithm, budget, store).with_namespace(&config.key_prefix))
    }

    /// Prefix every store key with `namespace`.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.strategy = Strategy::new(self.algorithm, self.budget, KeySpace::new(namespace));
        self
    }

    /// The algorithm this limiter runs.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The budget this limiter enforces.
    pub fn budget(&self) -> Budget {
        self.budget
    }

    /// Decide whether a request from `identifier` may proceed, reporting store errors.
    ///
    /// Each strategy reads state, decides, then writes. Concurrent calls for
    /// the same identifier can both read "under the limit" and both be
    /// admitted, so a hot identifier may be slightly over-admitted. Only the
    /// fixed window's increment is atomic in the store.
    pub async fn check(&self, identifier: &str) -> Result<bool> {
        let now = self.clock.now_millis();
        let allowed = self
            .strategy
            .check(self.store.as_ref(), identifier, now)
            .await?;

        trace!(
            identifier = %identifier,
            algorithm = %self.algorithm,
            allowed = allowed,
            "Rate limit decision made"
        );
        Ok(allowed)
    }

    /// Decide whether a request from `identifier` may proceed.
    ///
    /// Fails closed: any store error denies the request.
    pub async fn allow(&self, identifier: &str) -> bool {
        match self.check(identifier).await {
            Ok(allowed) => allowed,
            Err(e) => {
                warn!(
                    identifier = %identifier,
                    algorithm = %self.algorithm,
                    error = %e,
                    "Rate limit check failed, denying request"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("algorithm", &self.algorithm)
            .field("budget", &self.budget)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Admission for RateLimiter {
    async fn allow(&self, identifier: &str) -> bool {
        RateLimiter::allow(self, identifier).await
    }
}
