//! In-process backend with Redis-like TTL and batch semantics.
//!
//! Expiry is lazy: an expired key is dropped the next time it is touched, and
//! every batch sweeps all expired keys before staging.
//! Time is read from `tokio::time::Instant`, so paused test clocks apply.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{CacheBackend, Command, ExpireCondition};
use crate::error::{CacheError, Result};

#[derive(Debug, Clone)]
enum Value {
    Bytes(Vec<u8>),
    Set(BTreeSet<String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

type Keyspace = HashMap<String, Slot>;

fn wrong_type(key: &str) -> CacheError {
    CacheError::Backend(format!(
        "WRONGTYPE Operation against key '{key}' holding the wrong kind of value"
    ))
}

fn purge_expired(keyspace: &mut Keyspace, key: &str, now: Instant) {
    if keyspace.get(key).is_some_and(|slot| slot.is_expired(now)) {
        keyspace.remove(key);
    }
}

/// Absolute expiry for a TTL, rejecting values the clock cannot represent
fn expiry_at(now: Instant, ttl_secs: u64, command: &str) -> Result<Instant> {
    now.checked_add(Duration::from_secs(ttl_secs)).ok_or_else(|| {
        CacheError::Backend(format!("ERR invalid expire time in '{command}' command"))
    })
}

fn apply(keyspace: &mut Keyspace, command: &Command, now: Instant) -> Result<()> {
    match command {
        Command::Set {
            key,
            value,
            ttl_secs,
        } => {
            if *ttl_secs == 0 {
                return Err(CacheError::Backend(
                    "ERR invalid expire time in 'set' command".to_string(),
                ));
            }
            let expires_at = expiry_at(now, *ttl_secs, "set")?;
            keyspace.insert(
                key.clone(),
                Slot {
                    value: Value::Bytes(value.clone()),
                    expires_at: Some(expires_at),
                },
            );
        }
        Command::SAdd { set, member } => {
            purge_expired(keyspace, set, now);
            let slot = keyspace.entry(set.clone()).or_insert_with(|| Slot {
                value: Value::Set(BTreeSet::new()),
                expires_at: None,
            });
            match &mut slot.value {
                Value::Set(members) => {
                    members.insert(member.clone());
                }
                Value::Bytes(_) => return Err(wrong_type(set)),
            }
        }
        Command::Expire {
            key,
            ttl_secs,
            condition,
        } => {
            purge_expired(keyspace, key, now);
            let new_expiry = expiry_at(now, *ttl_secs, "expire")?;
            if let Some(slot) = keyspace.get_mut(key) {
                let applies = match (condition, slot.expires_at) {
                    (ExpireCondition::Always, _) | (ExpireCondition::IfNoExpiry, None) => true,
                    (ExpireCondition::IfNoExpiry, Some(_)) | (ExpireCondition::IfGreater, None) => {
                        false
                    }
                    (ExpireCondition::IfGreater, Some(current)) => new_expiry > current,
                };
                if applies {
                    slot.expires_at = Some(new_expiry);
                }
            }
        }
        Command::Del { keys } => {
            for key in keys {
                keyspace.remove(key);
            }
        }
    }

    Ok(())
}

/// Thread-safe in-memory backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    keyspace: Mutex<Keyspace>,
}

impl MemoryBackend {
    /// Creates an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a live key exists
    pub async fn exists(&self, key: &str) -> bool {
        let mut keyspace = self.keyspace.lock().await;
        purge_expired(&mut keyspace, key, Instant::now());
        keyspace.contains_key(key)
    }

    /// Remaining TTL of a live key, `None` if absent or persistent
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock().await;
        purge_expired(&mut keyspace, key, now);
        keyspace
            .get(key)
            .and_then(|slot| slot.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Number of live keys
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock().await;
        keyspace.retain(|_, slot| !slot.is_expired(now));
        keyspace.len()
    }

    /// Whether no live keys remain
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut keyspace = self.keyspace.lock().await;
        purge_expired(&mut keyspace, key, Instant::now());

        match keyspace.get(key).map(|slot| &slot.value) {
            Some(Value::Bytes(bytes)) => Ok(Some(bytes.clone())),
            Some(Value::Set(_)) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        let mut keyspace = self.keyspace.lock().await;
        apply(
            &mut keyspace,
            &Command::Set {
                key: key.to_string(),
                value,
                ttl_secs,
            },
            Instant::now(),
        )
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        let mut keyspace = self.keyspace.lock().await;
        purge_expired(&mut keyspace, key, Instant::now());

        match keyspace.get(key).map(|slot| &slot.value) {
            Some(Value::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(Value::Bytes(_)) => Err(wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn exec_atomic(&self, commands: &[Command]) -> Result<()> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.lock().await;

        // Stage on a copy so a failing command leaves nothing behind
        keyspace.retain(|_, slot| !slot.is_expired(now));
        let mut staged = keyspace.clone();
        for command in commands {
            apply(&mut staged, command, now)?;
        }
        *keyspace = staged;

        Ok(())
    }
}
