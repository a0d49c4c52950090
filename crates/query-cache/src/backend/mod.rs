//! # Backend Module
//!
//! The key-value store capability the cache is built on.
//!
//! A backend must offer TTL-bounded writes, plain reads, set membership reads
//! and an all-or-nothing batch of write commands. Two implementations ship:
//!
//! - [`RedisBackend`] - `MULTI`/`EXEC` pipelines over a `ConnectionManager`
//! - [`MemoryBackend`] - in-process store with the same semantics, for tests
//!   and local runs

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_backend;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

pub use memory::MemoryBackend;
#[cfg(feature = "redis")]
pub use redis_backend::{RedisBackend, RedisConfig};

/// Condition attached to an `EXPIRE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpireCondition {
    /// Always set the TTL
    #[default]
    Always,
    /// Only set the TTL when the key has none (`NX`)
    IfNoExpiry,
    /// Only set the TTL when it is greater than the current one (`GT`)
    IfGreater,
}

/// A write command that can be part of an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `SET key value EX ttl`
    Set {
        key: String,
        value: Vec<u8>,
        ttl_secs: u64,
    },
    /// `SADD set member`
    SAdd { set: String, member: String },
    /// `EXPIRE key ttl [NX|GT]`
    Expire {
        key: String,
        ttl_secs: u64,
        condition: ExpireCondition,
    },
    /// `DEL key...`
    Del { keys: Vec<String> },
}

/// Key-value store operations required by the cache
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read the raw bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `value` under `key` with a TTL in seconds
    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()>;

    /// Read all members of the set stored under `key`
    async fn members(&self, key: &str) -> Result<Vec<String>>;

    /// Apply every command in order as a single all-or-nothing unit
    async fn exec_atomic(&self, commands: &[Command]) -> Result<()>;
}

/// Shared backend handle
pub type SharedBackend = Arc<dyn CacheBackend>;
