//! Query cache error types

use thiserror::Error;

/// Query cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Entry too large: {size} bytes exceeds limit of {limit} bytes")]
    EntryTooLarge { size: usize, limit: usize },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Corrupt cache data: {0}")]
    CorruptData(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Whether the error came from the backend store rather than local validation
    #[must_use]
    pub const fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
