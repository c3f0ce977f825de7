//! In-process store with Redis-like semantics.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::KeyValueStore;
use crate::clock::{Clock, SystemClock};
use crate::error::{LimitError, Result};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    SortedSet(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// Absolute expiry in clock milliseconds
    expires_at: Option<u64>,
}

impl Entry {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn wrong_type(key: &str) -> LimitError {
    LimitError::StoreUnavailable(format!(
        "WRONGTYPE operation against key {} holding the wrong kind of value",
        key
    ))
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)
}

/// A [`KeyValueStore`] kept in process memory.
///
/// Mirrors the Redis semantics the strategies rely on: expiry, `INCR` on
/// integer strings, typed values and `WRONGTYPE` errors. Expiry is evaluated
/// lazily against the store's [`Clock`], so tests driving a
/// [`ManualClock`](crate::clock::ManualClock) see keys vanish as time advances.
///
/// State does not survive the process and is not shared between processes;
/// useful for single-instance deployments and tests.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that evaluates expiry against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = self.clock.now_millis();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    /// Whether the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining time to live of `key`, if it exists and has an expiry.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = self.clock.now_millis();
        self.entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.expires_at)
            .map(|at| Duration::from_millis(at - now))
    }

    /// Drop all keys.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Run `f` on the live entry for `key`, dropping it first if expired.
    fn with_entry<T>(&self, key: &str, f: impl FnOnce(MapEntry<'_, String, Entry>) -> T) -> T {
        let now = self.clock.now_millis();
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired(now) {
                drop(entry);
                self.entries.remove_if(key, |_, e| e.is_expired(now));
            }
        }
        f(self.entries.entry(key.to_string()))
    }

    fn read<T>(&self, key: &str, f: impl FnOnce(&Value) -> Result<T>) -> Result<Option<T>> {
        let now = self.clock.now_millis();
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => f(&entry.value).map(Some),
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.read(key, |value| match value {
            Value::Str(s) => Ok(s.clone()),
            _ => Err(wrong_type(key)),
        })
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let expires_at = self.clock.now_millis().saturating_add(ttl_millis(ttl));
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.with_entry(key, |entry| -> Result<i64> {
            match entry {
                MapEntry::Occupied(mut occupied) => match &mut occupied.get_mut().value {
                    Value::Str(s) => {
                        let current: i64 = s.parse().map_err(|_| {
                            LimitError::StoreUnavailable(format!(
                                "value at {} is not an integer or out of range",
                                key
                            ))
                        })?;
                        let next = current.checked_add(1).ok_or_else(|| {
                            LimitError::StoreUnavailable(format!(
                                "increment at {} would overflow",
                                key
                            ))
                        })?;
                        *s = next.to_string();
                        Ok(next)
                    }
                    _ => Err(wrong_type(key)),
                },
                MapEntry::Vacant(vacant) => {
                    vacant.insert(Entry {
                        value: Value::Str("1".to_string()),
                        expires_at: None,
                    });
                    Ok(1)
                }
            }
        })
    }

    async fn hash_get_multiple(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        let values = self.read(key, |value| match value {
            Value::Hash(hash) => Ok(fields
                .iter()
                .map(|f| hash.get(*f).cloned())
                .collect::<Vec<_>>()),
            _ => Err(wrong_type(key)),
        })?;
        Ok(values.unwrap_or_else(|| vec![None; fields.len()]))
    }

    async fn hash_set_multiple(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        self.with_entry(key, |entry| -> Result<()> {
            let mut entry = entry.or_insert_with(|| Entry {
                value: Value::Hash(HashMap::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::Hash(hash) => {
                    for (field, value) in fields {
                        hash.insert(field.to_string(), value.clone());
                    }
                    Ok(())
                }
                _ => Err(wrong_type(key)),
            }
        })
    }

    async fn sorted_set_add(&self, key: &str, score: f64, member: &str) -> Result<()> {
        self.with_entry(key, |entry| -> Result<()> {
            let mut entry = entry.or_insert_with(|| Entry {
                value: Value::SortedSet(HashMap::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::SortedSet(set) => {
                    set.insert(member.to_string(), score);
                    Ok(())
                }
                _ => Err(wrong_type(key)),
            }
        })
    }

    async fn sorted_set_remove_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<()> {
        self.with_entry(key, |entry| -> Result<()> {
            let MapEntry::Occupied(mut occupied) = entry else {
                return Ok(());
            };
            let emptied = match &mut occupied.get_mut().value {
                Value::SortedSet(set) => {
                    set.retain(|_, score| *score < min || *score > max);
                    set.is_empty()
                }
                _ => return Err(wrong_type(key)),
            };
            // Redis deletes a sorted set once its last member is gone.
            if emptied {
                occupied.remove();
            }
            Ok(())
        })
    }

    async fn sorted_set_cardinality(&self, key: &str) -> Result<u64> {
        let count = self.read(key, |value| match value {
            Value::SortedSet(set) => Ok(set.len() as u64),
            _ => Err(wrong_type(key)),
        })?;
        Ok(count.unwrap_or(0))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let expires_at = self.clock.now_millis().saturating_add(ttl_millis(ttl));
        self.with_entry(key, |entry| {
            if let MapEntry::Occupied(mut occupied) = entry {
                occupied.get_mut().expires_at = Some(expires_at);
            }
        });
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
