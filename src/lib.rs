//! Warden - store-backed per-client rate limiting
//!
//! This crate decides, per client identifier (typically an IP address),
//! whether a request may proceed under a fixed budget of `max_requests` per
//! `window_ms`. Five algorithms are available (fixed window, sliding log,
//! sliding window counter, leaky bucket, token bucket), all keeping their
//! state in an external key-value store so decisions survive restarts and
//! are shared between instances.
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden::ratelimit::{Algorithm, Budget, RateLimiter};
//! use warden::store::RedisStore;
//!
//! # async fn run() -> warden::error::Result<()> {
//! let store = RedisStore::connect("redis://127.0.0.1:6379").await?;
//! let limiter = RateLimiter::new(
//!     Algorithm::SlidingWindow,
//!     Budget::new(100, 60_000)?,
//!     Arc::new(store),
//! );
//!
//! if !limiter.allow("203.0.113.7").await {
//!     // reject with 429
//! }
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod store;
