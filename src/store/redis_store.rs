//! Redis-backed store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Cmd;
use std::time::Duration;
use tracing::{debug, error, info};

use super::KeyValueStore;
use crate::error::{LimitError, Result};

/// Default bound on a single command round trip.
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// A [`KeyValueStore`] backed by Redis.
///
/// Uses a multiplexed [`ConnectionManager`], which is cheap to clone and
/// reconnects on its own, so one `RedisStore` can be shared by every limiter
/// in the process.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    command_timeout: Duration,
}

impl RedisStore {
    /// Connect to the Redis server at `url`.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_timeout(url, DEFAULT_COMMAND_TIMEOUT).await
    }

    /// Connect to the Redis server at `url`, bounding each command by `command_timeout`.
    pub async fn connect_with_timeout(url: &str, command_timeout: Duration) -> Result<Self> {
        info!(url = %url, "Connecting to Redis");

        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(command_timeout, client.get_connection_manager())
            .await
            .map_err(|_| {
                LimitError::StoreUnavailable(format!(
                    "timed out connecting to {} after {:?}",
                    url, command_timeout
                ))
            })??;

        let store = Self {
            conn,
            command_timeout,
        };
        store.ping().await?;

        info!(url = %url, "Redis connection established");
        Ok(store)
    }

    /// Run one command with the configured timeout.
    async fn query<T: redis::FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        let mut conn = self.conn.clone();
        match tokio::time::timeout(self.command_timeout, cmd.query_async(&mut conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(error = %e, "Redis command failed");
                Err(e.into())
            }
            Err(_) => {
                error!(timeout = ?self.command_timeout, "Redis command timed out");
                Err(LimitError::StoreUnavailable(format!(
                    "command timed out after {:?}",
                    self.command_timeout
                )))
            }
        }
    }
}

/// Render a score bound the way `ZREMRANGEBYSCORE` expects it.
fn score_bound(score: f64) -> String {
    if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else if score == f64::INFINITY {
        "+inf".to_string()
    } else {
        score.to_string()
    }
}

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.query(redis::cmd("SET").arg(key).arg(value).arg("PX").arg(millis(ttl)))
            .await
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.query(redis::cmd("INCR").arg(key)).await
    }

    async fn hash_get_multiple(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        self.query(redis::cmd("HMGET").arg(key).arg(fields)).await
    }

    async fn hash_set_multiple(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(*field).arg(value);
        }
        let _added: i64 = self.query(&cmd).await?;
        Ok(())
    }

    async fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<()> {
        let _added: i64 = self
            .query(redis::cmd("ZADD").arg(key).arg(score).arg(member))
            .await?;
        Ok(())
    }

    async fn sorted_set_remove_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<()> {
        let removed: i64 = self
            .query(
                redis::cmd("ZREMRANGEBYSCORE")
                    .arg(key)
                    .arg(score_bound(min))
                    .arg(score_bound(max)),
            )
            .await?;
        debug!(key = %key, removed = removed, "Pruned sorted set");
        Ok(())
    }

    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64> {
        self.query(redis::cmd("ZCARD").arg(key)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let _set: i64 = self
            .query(redis::cmd("PEXPIRE").arg(key).arg(millis(ttl)))
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let response: String = self.query(&redis::cmd("PING")).await?;
        if response != "PONG" {
            return Err(LimitError::StoreUnavailable(format!(
                "unexpected PING response: {}",
                response
            )));
        }
        Ok(())
    }
}
