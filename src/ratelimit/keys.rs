//! Store key derivation for per-identifier state.

/// Builds the store keys each strategy reads and writes.
///
/// Keys are `identifier:window` for the window counters and
/// `sliding:` / `leaky:` / `token:` prefixed for the others. An optional
/// namespace is prepended (followed by `:`) so several deployments can share
/// one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    /// Create a key space under `namespace`. An empty namespace adds nothing.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn key(&self, body: String) -> String {
        if self.namespace.is_empty() {
            body
        } else {
            format!("{}:{}", self.namespace, body)
        }
    }

    /// Fixed window counter, keyed by the window start timestamp.
    pub fn fixed_window(&self, identifier: &str, window_start: u64) -> String {
        self.key(format!("{}:{}", identifier, window_start))
    }

    /// Sliding window counter, keyed by the window index.
    pub fn window_counter(&self, identifier: &str, window_index: u64) -> String {
        self.key(format!("{}:{}", identifier, window_index))
    }

    /// Sliding log sorted set.
    pub fn sliding_log(&self, identifier: &str) -> String {
        self.key(format!("sliding:{}", identifier))
    }

    /// Leaky bucket hash.
    pub fn leaky_bucket(&self, identifier: &str) -> String {
        self.key(format!("leaky:{}", identifier))
    }

    /// Token bucket hash.
    pub fn token_bucket(&self, identifier: &str) -> String {
        self.key(format!("token:{}", identifier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_without_namespace() {
        let keys = KeySpace::default();

        assert_eq!(keys.fixed_window("10.0.0.1", 60_000), "10.0.0.1:60000");
        assert_eq!(keys.window_counter("10.0.0.1", 1), "10.0.0.1:1");
        assert_eq!(keys.sliding_log("10.0.0.1"), "sliding:10.0.0.1");
        assert_eq!(keys.leaky_bucket("10.0.0.1"), "leaky:10.0.0.1");
        assert_eq!(keys.token_bucket("10.0.0.1"), "token:10.0.0.1");
    }

    #[test]
    fn test_keys_with_namespace() {
        let keys = KeySpace::new("api");

        assert_eq!(keys.fixed_window("a", 0), "api:a:0");
        assert_eq!(keys.token_bucket("a"), "api:token:a");
    }
}
