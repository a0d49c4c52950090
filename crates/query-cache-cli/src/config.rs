//! # CLI Configuration
//!
//! Environment-based configuration for the `qcache` binary.

use std::env;

use query_cache::CacheConfig;

/// Process configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL
    pub redis_url: String,

    /// Logging level used when `RUST_LOG` is unset
    pub log_level: String,

    /// Cache settings
    pub cache: CacheConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            cache: CacheConfig::from_env(),
        }
    }
}
