//! # Query Cache Library
//!
//! Caching layer for serialized query results in front of Redis.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Layer                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ set / get / invalidate
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        QueryCache                            │
//! │          (TTL defaults, size limits, hit/miss hooks)         │
//! └─────────────────────────────────────────────────────────────┘
//!           │                  │                     │
//!           ▼                  ▼                     ▼
//! ┌──────────────────┐ ┌──────────────────┐ ┌──────────────────┐
//! │   ValueCodec     │ │ Transactional    │ │ Dependency Index │
//! │ (plain / zstd)   │ │ Writer (MULTI)   │ │ (dependency:*)   │
//! └──────────────────┘ └──────────────────┘ └──────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CacheBackend (Redis / in-memory)                │
//! │          (source of truth for TTLs and atomicity)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - `redis`: Enable the Redis backend (default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use query_cache::{CacheConfig, QueryCache, RedisBackend, RedisConfig, SetOptions};
//!
//! let backend = RedisBackend::connect(&RedisConfig::default()).await?;
//! let cache = QueryCache::builder()
//!     .backend(backend)
//!     .config(CacheConfig::from_env())
//!     .build()?;
//!
//! cache
//!     .set("users:active", &rows_json, SetOptions::new().depends_on("users"))
//!     .await?;
//!
//! // After the users table changes
//! cache.invalidate("users").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod codec;
pub mod config;
pub mod dependency;
pub mod error;
pub mod observer;
pub mod store;
pub mod writer;

// Re-export commonly used types
pub use backend::{CacheBackend, Command, ExpireCondition, MemoryBackend, SharedBackend};
#[cfg(feature = "redis")]
pub use backend::{RedisBackend, RedisConfig};
pub use codec::{CodecMode, ValueCodec};
pub use config::CacheConfig;
pub use dependency::{dependency_key, DependencyTtlPolicy};
pub use error::{CacheError, Result};
pub use observer::{CacheObserver, HitMissCounter, SharedObserver};
pub use store::{QueryCache, QueryCacheBuilder, SetOptions};
pub use writer::{PrimaryWrite, TransactionalWriter};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Connect to Redis and build a cache from environment configuration
///
/// # Errors
///
/// Returns an error if the URL is malformed, Redis is unreachable or the
/// configuration is invalid.
#[cfg(feature = "redis")]
pub async fn connect_from_env(redis_url: &str) -> Result<QueryCache> {
    let backend = RedisBackend::connect(&RedisConfig {
        url: redis_url.to_string(),
    })
    .await?;

    QueryCache::builder()
        .backend(backend)
        .config(CacheConfig::from_env())
        .build()
}
