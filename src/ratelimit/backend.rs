//! Admission trait for the calling layer.

use async_trait::async_trait;

/// The capability a request-handling layer needs from a rate limiter.
///
/// Middleware extracts the client identifier and asks whether the request may
/// proceed. Implementations never fail: internal errors are reported as a
/// denial.
#[async_trait]
pub trait Admission: Send + Sync {
    /// Returns `true` if a request from `identifier` may proceed.
    async fn allow(&self, identifier: &str) -> bool;
}
