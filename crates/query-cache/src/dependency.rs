//! # Dependency Index
//!
//! Each dependency name owns a backend set at `dependency:<name>` holding the
//! cache keys written against it. Members are added only by the transactional
//! writer and read only by invalidation.
//!
//! ## TTL policies
//!
//! - `Extend` - the record keeps the longest TTL of anything registered under
//!   it (default)
//! - `Refresh` - every registration overwrites the record TTL with the TTL of
//!   the entry being written

use std::fmt;
use std::str::FromStr;

use crate::backend::{Command, ExpireCondition};

/// Key prefix for dependency records
pub const DEPENDENCY_PREFIX: &str = "dependency:";

/// Backend key holding the members of a dependency
#[must_use]
pub fn dependency_key(name: &str) -> String {
    format!("{DEPENDENCY_PREFIX}{name}")
}

/// How a dependency record's TTL follows its registered entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyTtlPolicy {
    /// Only ever lengthen the record TTL (`EXPIRE NX` then `EXPIRE GT`)
    #[default]
    Extend,
    /// Reset the record TTL to the latest write's TTL
    Refresh,
}

impl DependencyTtlPolicy {
    /// Commands that apply this policy to a record after a registration
    #[must_use]
    pub fn expire_commands(&self, record_key: &str, ttl_secs: u64) -> Vec<Command> {
        let expire = |condition| Command::Expire {
            key: record_key.to_string(),
            ttl_secs,
            condition,
        };

        match self {
            Self::Extend => vec![
                expire(ExpireCondition::IfNoExpiry),
                expire(ExpireCondition::IfGreater),
            ],
            Self::Refresh => vec![expire(ExpireCondition::Always)],
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Extend => "extend",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for DependencyTtlPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised dependency TTL policy name
#[derive(Debug, thiserror::Error)]
#[error("unknown dependency TTL policy '{0}', expected 'extend' or 'refresh'")]
pub struct ParsePolicyError(pub String);

impl FromStr for DependencyTtlPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extend" => Ok(Self::Extend),
            "refresh" => Ok(Self::Refresh),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}
