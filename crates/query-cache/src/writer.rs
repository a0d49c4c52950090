//! # Transactional Writer
//!
//! Builds the single atomic batch for a cache write and its dependency
//! registrations:
//!
//! ```text
//! MULTI
//!   SET <key> <value> EX <ttl>
//!   SADD dependency:<name> <key>        ┐
//!   EXPIRE dependency:<name> <ttl> NX   │ per distinct dependency
//!   EXPIRE dependency:<name> <ttl> GT   ┘ (Extend policy)
//! EXEC
//! ```
//!
//! No retries happen here; a failed batch is reported to the caller as-is.

use crate::backend::{CacheBackend, Command};
use crate::dependency::{dependency_key, DependencyTtlPolicy};
use crate::error::Result;

/// A primary cache write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryWrite {
    pub key: String,
    pub value: Vec<u8>,
    pub ttl_secs: u64,
}

/// Writes an entry together with its dependency registrations
#[derive(Clone, Copy)]
pub struct TransactionalWriter<'a> {
    backend: &'a dyn CacheBackend,
    policy: DependencyTtlPolicy,
}

impl<'a> TransactionalWriter<'a> {
    pub fn new(backend: &'a dyn CacheBackend, policy: DependencyTtlPolicy) -> Self {
        Self { backend, policy }
    }

    /// Build the command batch without executing it
    ///
    /// Repeated dependency names are registered once, in first-seen order.
    #[must_use]
    pub fn plan<S: AsRef<str>>(&self, write: PrimaryWrite, dependencies: &[S]) -> Vec<Command> {
        let mut seen: Vec<&str> = Vec::with_capacity(dependencies.len());
        for name in dependencies {
            let name = name.as_ref();
            if !seen.contains(&name) {
                seen.push(name);
            }
        }

        let PrimaryWrite {
            key,
            value,
            ttl_secs,
        } = write;

        let mut commands = Vec::with_capacity(1 + seen.len() * 3);
        let registrations: Vec<Command> = seen
            .iter()
            .flat_map(|name| {
                let record = dependency_key(name);
                let mut cmds = vec![Command::SAdd {
                    set: record.clone(),
                    member: key.clone(),
                }];
                cmds.extend(self.policy.expire_commands(&record, ttl_secs));
                cmds
            })
            .collect();

        commands.push(Command::Set {
            key,
            value,
            ttl_secs,
        });
        commands.extend(registrations);
        commands
    }

    /// Execute the write as one all-or-nothing batch
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged if the batch is rejected.
    pub async fn commit<S: AsRef<str> + Sync>(
        &self,
        write: PrimaryWrite,
        dependencies: &[S],
    ) -> Result<()> {
        let key = write.key.clone();
        let commands = self.plan(write, dependencies);

        tracing::debug!(
            key = %key,
            dependencies = dependencies.len(),
            commands = commands.len(),
            policy = %self.policy,
            "Committing cache write batch"
        );

        self.backend.exec_atomic(&commands).await
    }
}
