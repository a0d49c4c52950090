//! # Cache Configuration
//!
//! Immutable settings consumed once when a [`QueryCache`](crate::QueryCache)
//! is built. Defaults can be overridden in code with the `with_*` setters or
//! from the process environment with [`CacheConfig::from_env`].

use std::env;
use std::time::Duration;

use crate::dependency::DependencyTtlPolicy;
use crate::error::{CacheError, Result};

/// Default TTL applied when `set` is called without one
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Longest TTL accepted for `default_ttl` (`i32::MAX` seconds)
pub const MAX_TTL: Duration = Duration::from_secs(2_147_483_647);

/// Default upper bound on the uncompressed payload size
pub const DEFAULT_MAX_ENTRY_SIZE: usize = 5_000_000;

/// Default zstd compression level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Query cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL for entries written without an explicit TTL
    pub default_ttl: Duration,

    /// Maximum uncompressed payload size in bytes
    pub max_entry_size: usize,

    /// Compress payloads before writing them to the backend
    pub compression: bool,

    /// zstd level used when `compression` is enabled
    pub compression_level: i32,

    /// How dependency record TTLs follow the entries registered under them
    pub dependency_ttl: DependencyTtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
            compression: false,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            dependency_ttl: DependencyTtlPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            default_ttl: lookup("QUERY_CACHE_DEFAULT_TTL_SECS")
                .and_then(|v| v.parse().ok())
                .map_or(defaults.default_ttl, Duration::from_secs),

            max_entry_size: lookup("QUERY_CACHE_MAX_ENTRY_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_entry_size),

            compression: lookup("QUERY_CACHE_COMPRESSION")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.compression),

            compression_level: lookup("QUERY_CACHE_COMPRESSION_LEVEL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.compression_level),

            dependency_ttl: lookup("QUERY_CACHE_DEPENDENCY_TTL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.dependency_ttl),
        }
    }

    /// Sets the default TTL
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the maximum uncompressed entry size
    #[must_use]
    pub const fn with_max_entry_size(mut self, bytes: usize) -> Self {
        self.max_entry_size = bytes;
        self
    }

    /// Enables or disables compression
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.compression = enabled;
        self
    }

    /// Sets the zstd compression level
    #[must_use]
    pub const fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the dependency TTL policy
    #[must_use]
    pub const fn with_dependency_ttl(mut self, policy: DependencyTtlPolicy) -> Self {
        self.dependency_ttl = policy;
        self
    }

    /// Check the configuration for values no cache can operate with
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] naming the offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl.is_zero() {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be greater than zero".to_string(),
            ));
        }

        if self.default_ttl > MAX_TTL {
            return Err(CacheError::InvalidConfig(format!(
                "default_ttl of {}s exceeds the maximum of {}s",
                self.default_ttl.as_secs(),
                MAX_TTL.as_secs()
            )));
        }

        if self.max_entry_size == 0 {
            return Err(CacheError::InvalidConfig(
                "max_entry_size must be greater than zero".to_string(),
            ));
        }

        if self.compression {
            let levels = zstd::compression_level_range();
            if !levels.contains(&self.compression_level) {
                return Err(CacheError::InvalidConfig(format!(
                    "compression_level {} outside supported range {}..={}",
                    self.compression_level,
                    levels.start(),
                    levels.end()
                )));
            }
        }

        Ok(())
    }
}
