//! Request budget and algorithm selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{LimitError, Result};

/// Extra lifetime given to bucket and log state beyond one window, in seconds.
const STATE_GRACE_SECS: u64 = 60;

/// The rate limiting algorithm a limiter runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Counter per aligned window
    #[default]
    FixedWindow,
    /// Sorted set of request timestamps
    SlidingLog,
    /// Weighted blend of the current and previous window counters
    SlidingWindow,
    /// Constant-rate drain of a bounded bucket
    LeakyBucket,
    /// Whole-window token refill
    TokenBucket,
}

impl Algorithm {
    /// All algorithms, in declaration order.
    pub const ALL: [Algorithm; 5] = [
        Algorithm::FixedWindow,
        Algorithm::SlidingLog,
        Algorithm::SlidingWindow,
        Algorithm::LeakyBucket,
        Algorithm::TokenBucket,
    ];

    /// The configuration name of this algorithm.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::FixedWindow => "fixed-window",
            Algorithm::SlidingLog => "sliding-log",
            Algorithm::SlidingWindow => "sliding-window",
            Algorithm::LeakyBucket => "leaky-bucket",
            Algorithm::TokenBucket => "token-bucket",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = LimitError;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| LimitError::Config(format!("unknown algorithm: {}", s)))
    }
}

/// The request budget shared by every identifier: at most `max_requests`
/// per `window_ms` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    max_requests: u64,
    window_ms: u64,
}

impl Budget {
    /// Create a budget. Both values must be positive.
    pub fn new(max_requests: u64, window_ms: u64) -> Result<Self> {
        if max_requests == 0 {
            return Err(LimitError::Config(
                "max_requests must be greater than zero".to_string(),
            ));
        }
        if window_ms == 0 {
            return Err(LimitError::Config(
                "window_ms must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_requests,
            window_ms,
        })
    }

    /// Maximum requests allowed per window.
    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    /// Window length in milliseconds.
    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Window length as a `Duration`.
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Index of the window containing `now`.
    pub fn window_index(&self, now: u64) -> u64 {
        now / self.window_ms
    }

    /// Start timestamp of the window containing `now`.
    pub fn window_start(&self, now: u64) -> u64 {
        self.window_index(now) * self.window_ms
    }

    /// Fraction of the current window already elapsed at `now`, in `[0, 1)`.
    pub fn elapsed_fraction(&self, now: u64) -> f64 {
        (now % self.window_ms) as f64 / self.window_ms as f64
    }

    /// Milliseconds per leaked unit in the leaky bucket.
    pub fn leak_interval_ms(&self) -> f64 {
        self.window_ms as f64 / self.max_requests as f64
    }

    /// Expiry for bucket and log state: one window rounded up to seconds, plus a minute.
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.window_ms.div_ceil(1000) + STATE_GRACE_SECS)
    }
}
