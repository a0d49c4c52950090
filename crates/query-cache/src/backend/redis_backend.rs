//! # Redis Backend
//!
//! `CacheBackend` over a multiplexed Redis connection. Atomic batches are sent
//! as `MULTI`/`EXEC` pipelines.

use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Pipeline};

use super::{CacheBackend, Command, ExpireCondition};
use crate::error::{CacheError, Result};

/// Redis connection configuration
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
        }
    }
}

/// Redis-backed store with connection management
#[derive(Clone)]
pub struct RedisBackend {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBackend")
            .field("conn", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisBackend {
    /// Connect to Redis
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] for a malformed URL and
    /// [`CacheError::Backend`] when the server cannot be reached.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            CacheError::InvalidConfig(format!("invalid Redis URL '{}': {e}", config.url))
        })?;
        let conn = ConnectionManager::new(client).await?;

        tracing::debug!(url = %config.url, "Redis backend connected");
        Ok(Self { conn })
    }
}

/// Translate a batch into an atomic pipeline whose replies are discarded
pub(crate) fn build_pipeline(commands: &[Command]) -> Pipeline {
    let mut pipe = redis::pipe();
    pipe.atomic();

    for command in commands {
        match command {
            Command::Set {
                key,
                value,
                ttl_secs,
            } => {
                pipe.cmd("SET")
                    .arg(key)
                    .arg(value.as_slice())
                    .arg("EX")
                    .arg(*ttl_secs)
                    .ignore();
            }
            Command::SAdd { set, member } => {
                pipe.cmd("SADD").arg(set).arg(member).ignore();
            }
            Command::Expire {
                key,
                ttl_secs,
                condition,
            } => {
                let expire = pipe.cmd("EXPIRE").arg(key).arg(*ttl_secs);
                match condition {
                    ExpireCondition::Always => {}
                    ExpireCondition::IfNoExpiry => {
                        expire.arg("NX");
                    }
                    ExpireCondition::IfGreater => {
                        expire.arg("GT");
                    }
                }
                expire.ignore();
            }
            Command::Del { keys } => {
                pipe.cmd("DEL").arg(keys).ignore();
            }
        }
    }

    pipe
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn exec_atomic(&self, commands: &[Command]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let _: () = build_pipeline(commands).query_async(&mut conn).await?;
        Ok(())
    }
}
