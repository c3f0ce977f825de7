//! Configuration management for Warden.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{LimitError, Result};
use crate::ratelimit::{Algorithm, Budget};

/// Prefix for environment variable overrides, e.g. `WARDEN__LIMITER__MAX_REQUESTS`.
const ENV_PREFIX: &str = "WARDEN";

/// Main configuration for Warden.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Store configuration
    #[serde(default)]
    pub store: StoreConfig,
}

/// Limiter configuration: which algorithm, and the budget it enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Rate limiting algorithm
    #[serde(default)]
    pub algorithm: Algorithm,

    /// Maximum requests per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u64,

    /// Window length in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Namespace prepended to every store key
    #[serde(default)]
    pub key_prefix: String,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            key_prefix: String::new(),
        }
    }
}

impl LimiterConfig {
    /// The validated budget described by this configuration.
    pub fn budget(&self) -> Result<Budget> {
        Budget::new(self.max_requests, self.window_ms)
    }
}

fn default_max_requests() -> u64 {
    100
}

fn default_window_ms() -> u64 {
    60_000
}

/// Which store implementation to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Shared Redis server
    #[default]
    Redis,
    /// Process-local memory
    Memory,
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store implementation
    #[serde(default)]
    pub backend: StoreBackend,

    /// Redis connection URL
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Bound on a single store round trip in milliseconds
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_redis_url(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// The command timeout as a `Duration`.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_command_timeout_ms() -> u64 {
    1000
}

impl WardenConfig {
    /// Load configuration from a file, with `WARDEN__*` environment variables
    /// taking precedence over the file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let config: WardenConfig = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: WardenConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LimitError::Config(format!("Failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration describes a usable limiter.
    pub fn validate(&self) -> Result<()> {
        self.limiter.budget()?;
        if self.store.command_timeout_ms == 0 {
            return Err(LimitError::Config(
                "store.command_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WardenConfig::default();

        assert_eq!(config.limiter.algorithm, Algorithm::FixedWindow);
        assert_eq!(config.limiter.max_requests, 100);
        assert_eq!(config.limiter.window_ms, 60_000);
        assert_eq!(config.store.backend, StoreBackend::Redis);
        assert_eq!(config.store.command_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
limiter:
  algorithm: token-bucket
  max_requests: 20
  window_ms: 1000
  key_prefix: api
store:
  backend: memory
  url: redis://cache:6379
  command_timeout_ms: 250
"#;
        let config = WardenConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.limiter.algorithm, Algorithm::TokenBucket);
        assert_eq!(config.limiter.budget().unwrap(), Budget::new(20, 1000).unwrap());
        assert_eq!(config.limiter.key_prefix, "api");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.url, "redis://cache:6379");
        assert_eq!(config.store.command_timeout_ms, 250);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
limiter:
  algorithm: sliding-log
"#;
        let config = WardenConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.limiter.algorithm, Algorithm::SlidingLog);
        assert_eq!(config.limiter.max_requests, 100);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn test_rejects_zero_budget() {
        let yaml = r#"
limiter:
  max_requests: 0
"#;
        assert!(matches!(
            WardenConfig::from_yaml(yaml),
            Err(LimitError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_algorithm() {
        let yaml = r#"
limiter:
  algorithm: random-drop
"#;
        assert!(WardenConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("warden-config-{}.yaml", std::process::id()));
        std::fs::write(
            &path,
            "limiter:\n  algorithm: leaky-bucket\n  max_requests: 3\n  window_ms: 900\n",
        )
        .unwrap();

        let config = WardenConfig::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.limiter.algorithm, Algorithm::LeakyBucket);
        assert_eq!(config.limiter.max_requests, 3);
        assert_eq!(config.limiter.window_ms, 900);
    }

    #[test]
    fn test_from_missing_file() {
        assert!(matches!(
            WardenConfig::from_file("/nonexistent/warden.yaml"),
            Err(LimitError::Config(_))
        ));
    }
}
