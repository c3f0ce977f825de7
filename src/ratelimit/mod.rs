//! Rate limiting algorithms and the limiter that dispatches to them.

mod backend;
mod budget;
mod fixed_window;
mod keys;
mod leaky_bucket;
mod limiter;
mod sliding_log;
mod sliding_window;
mod state;
mod token_bucket;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::Admission;
pub use budget::{Algorithm, Budget};
pub use fixed_window::FixedWindow;
pub use keys::KeySpace;
pub use leaky_bucket::LeakyBucket;
pub use limiter::RateLimiter;
pub use sliding_log::SlidingLog;
pub use sliding_window::SlidingWindowCounter;
pub use token_bucket::TokenBucket;
