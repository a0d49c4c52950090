//! # Cache Store
//!
//! The public `set` / `get` / `invalidate` contract. A [`QueryCache`] holds no
//! entry state of its own: values, TTLs and dependency records all live in
//! the backend.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::backend::{CacheBackend, Command, SharedBackend};
use crate::codec::ValueCodec;
use crate::config::CacheConfig;
use crate::dependency::dependency_key;
use crate::error::{CacheError, Result};
use crate::observer::SharedObserver;
use crate::writer::{PrimaryWrite, TransactionalWriter};

/// Per-write options for [`QueryCache::set`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    dependencies: Vec<String>,
    ttl: Option<Duration>,
}

impl SetOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the entry under a dependency name
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Register the entry under several dependency names
    #[must_use]
    pub fn dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    /// Override the configured default TTL
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Round a TTL up to whole seconds, never below one
///
/// Saturates instead of wrapping; out-of-range values are left for the
/// backend to reject.
fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl
        .as_secs()
        .saturating_add(u64::from(ttl.subsec_nanos() > 0));
    secs.max(1)
}

/// Dependency-aware query result cache
#[derive(Clone)]
pub struct QueryCache {
    backend: SharedBackend,
    config: CacheConfig,
    codec: ValueCodec,
    observer: Option<SharedObserver>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("config", &self.config)
            .field("codec", &self.codec)
            .field("observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl QueryCache {
    /// Build a cache over `backend` with `config`
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] if the configuration is invalid.
    pub fn new(backend: SharedBackend, config: CacheConfig) -> Result<Self> {
        Self::builder().shared_backend(backend).config(config).build()
    }

    #[must_use]
    pub fn builder() -> QueryCacheBuilder {
        QueryCacheBuilder::default()
    }

    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[must_use]
    pub const fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// Store `payload` under `key`
    ///
    /// With dependencies the entry and its registrations are written in one
    /// atomic batch; otherwise a single TTL-bounded write is issued.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::EntryTooLarge`] before anything is written when
    /// the payload is over the limit, or the backend error if the write fails.
    pub async fn set(&self, key: &str, payload: &str, options: SetOptions) -> Result<()> {
        let value = self.codec.encode(payload.as_bytes()).inspect_err(|e| {
            if let CacheError::EntryTooLarge { size, limit } = e {
                tracing::warn!(key, size, limit, "Refusing oversized cache entry");
            }
        })?;
        let ttl_secs = ttl_secs(options.ttl.unwrap_or(self.config.default_ttl));
        let stored_len = value.len();

        if options.dependencies.is_empty() {
            self.backend.set_ex(key, value, ttl_secs).await?;
        } else {
            let write = PrimaryWrite {
                key: key.to_string(),
                value,
                ttl_secs,
            };
            TransactionalWriter::new(self.backend.as_ref(), self.config.dependency_ttl)
                .commit(write, &options.dependencies)
                .await?;
        }

        tracing::debug!(
            key,
            ttl_secs,
            payload_len = payload.len(),
            stored_len,
            dependencies = ?options.dependencies,
            "Cache set"
        );
        Ok(())
    }

    /// Read the payload stored under `key`
    ///
    /// A miss is `Ok(None)`, never an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CorruptData`] if the stored bytes cannot be
    /// decoded, or the backend error if the read fails.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(stored) = self.backend.get(key).await? else {
            tracing::debug!(key, "Cache miss");
            if let Some(observer) = &self.observer {
                observer.on_miss(key);
            }
            return Ok(None);
        };

        let payload = self.codec.decode_str(stored)?;

        tracing::debug!(key, "Cache hit");
        if let Some(observer) = &self.observer {
            observer.on_hit(key);
        }
        Ok(Some(payload))
    }

    /// Evict every entry registered under `dependency`, plus the record itself
    ///
    /// Invalidating an unknown or already invalidated dependency is a no-op.
    /// Returns the number of keys that were registered.
    ///
    /// # Errors
    ///
    /// Returns the backend error if the read or delete batch fails.
    pub async fn invalidate(&self, dependency: &str) -> Result<usize> {
        let record = dependency_key(dependency);
        let mut keys = self.backend.members(&record).await?;
        let registered = keys.len();

        keys.push(record);
        self.backend.exec_atomic(&[Command::Del { keys }]).await?;

        tracing::debug!(dependency, registered, "Cache invalidated");
        Ok(registered)
    }

    /// Serialize `value` as JSON and store it
    ///
    /// # Errors
    ///
    /// As [`QueryCache::set`], plus [`CacheError::Serialization`].
    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        options: SetOptions,
    ) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.set(key, &json, options).await
    }

    /// Read and deserialize a JSON value
    ///
    /// # Errors
    ///
    /// As [`QueryCache::get`], plus [`CacheError::Serialization`].
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

/// Builder for [`QueryCache`]
#[derive(Default)]
pub struct QueryCacheBuilder {
    backend: Option<SharedBackend>,
    config: CacheConfig,
    observer: Option<SharedObserver>,
}

impl QueryCacheBuilder {
    /// Use `backend` as the store
    #[must_use]
    pub fn backend<B: CacheBackend + 'static>(self, backend: B) -> Self {
        self.shared_backend(Arc::new(backend))
    }

    /// Use an already shared backend handle
    #[must_use]
    pub fn shared_backend(mut self, backend: SharedBackend) -> Self {
        self.backend = Some(backend);
        self
    }

    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive hit/miss callbacks
    #[must_use]
    pub fn observer(mut self, observer: SharedObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validate and build the cache
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] when no backend was supplied or
    /// the configuration fails validation.
    pub fn build(self) -> Result<QueryCache> {
        let backend = self.backend.ok_or_else(|| {
            CacheError::InvalidConfig("a backend store handle is required".to_string())
        })?;
        self.config.validate()?;

        Ok(QueryCache {
            backend,
            codec: ValueCodec::from_config(&self.config),
            config: self.config,
            observer: self.observer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MemoryBackend, MockCacheBackend};
    use crate::dependency::DependencyTtlPolicy;
    use crate::observer::HitMissCounter;
    use serde::Deserialize;

    fn cache_with(config: CacheConfig) -> (QueryCache, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let cache = QueryCache::new(backend.clone(), config).unwrap();
        (cache, backend)
    }

    fn cache() -> (QueryCache, Arc<MemoryBackend>) {
        cache_with(CacheConfig::default())
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (cache, _) = cache();
        cache.set("k", "hello", SetOptions::new()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_get_never_written_is_miss() {
        let (cache, _) = cache();
        assert_eq!(cache.get("nothing").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let (cache, _) = cache();
        cache
            .set("k1", "hello", SetOptions::new().ttl(Duration::from_secs(1)))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies() {
        let config = CacheConfig::default().with_default_ttl(Duration::from_secs(30));
        let (cache, backend) = cache_with(config);
        cache.set("k", "v", SetOptions::new()).await.unwrap();

        assert_eq!(backend.ttl("k").await, Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_second_ttl_rounds_up() {
        let (cache, backend) = cache();
        cache
            .set("k", "v", SetOptions::new().ttl(Duration::from_millis(1500)))
            .await
            .unwrap();

        assert_eq!(backend.ttl("k").await, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_ttl_secs_saturates() {
        assert_eq!(ttl_secs(Duration::MAX), u64::MAX);
        assert_eq!(ttl_secs(Duration::from_secs(u64::MAX)), u64::MAX);
        assert_eq!(ttl_secs(Duration::ZERO), 1);
    }

    #[tokio::test]
    async fn test_out_of_range_ttl_is_backend_error() {
        let (cache, backend) = cache();

        let err = cache
            .set("k", "v", SetOptions::new().ttl(Duration::MAX))
            .await
            .unwrap_err();
        assert!(err.is_backend());

        let err = cache
            .set(
                "k",
                "v",
                SetOptions::new()
                    .depends_on("users")
                    .ttl(Duration::from_secs(u64::MAX)),
            )
            .await
            .unwrap_err();
        assert!(err.is_backend());

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let (cache, _) = cache();
        cache.set("k", "first", SetOptions::new()).await.unwrap();
        cache.set("k", "second", SetOptions::new()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_invalidate_evicts_dependents_and_record() {
        let (cache, backend) = cache();
        cache
            .set(
                "k2",
                "payload",
                SetOptions::new()
                    .depends_on("users")
                    .ttl(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        assert!(backend.exists("dependency:users").await);

        assert_eq!(cache.invalidate("users").await.unwrap(), 1);

        assert_eq!(cache.get("k2").await.unwrap(), None);
        assert!(!backend.exists("dependency:users").await);
        assert_eq!(cache.invalidate("users").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_unknown_dependency_is_noop() {
        let (cache, backend) = cache();
        cache.set("k", "v", SetOptions::new()).await.unwrap();

        assert_eq!(cache.invalidate("never-used").await.unwrap(), 0);
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_any_dependency_invalidates() {
        let (cache, _) = cache();
        cache
            .set("k", "v", SetOptions::new().dependencies(["users", "orders"]))
            .await
            .unwrap();

        cache.invalidate("orders").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_overlapping_dependencies_are_isolated() {
        let (cache, backend) = cache();
        cache
            .set("only-a", "1", SetOptions::new().depends_on("a"))
            .await
            .unwrap();
        cache
            .set("both", "2", SetOptions::new().dependencies(["a", "b"]))
            .await
            .unwrap();
        cache
            .set("only-b", "3", SetOptions::new().depends_on("b"))
            .await
            .unwrap();

        assert_eq!(cache.invalidate("a").await.unwrap(), 2);

        assert_eq!(cache.get("only-a").await.unwrap(), None);
        assert_eq!(cache.get("both").await.unwrap(), None);
        assert_eq!(cache.get("only-b").await.unwrap().as_deref(), Some("3"));

        let mut remaining = backend.members("dependency:b").await.unwrap();
        remaining.sort();
        assert_eq!(remaining, vec!["both".to_string(), "only-b".to_string()]);
    }

    #[tokio::test]
    async fn test_oversized_entry_writes_nothing() {
        let config = CacheConfig::default()
            .with_compression(true)
            .with_max_entry_size(10);
        let (cache, backend) = cache_with(config);

        let err = cache
            .set(
                "k3",
                "this exceeds ten bytes",
                SetOptions::new().depends_on("users"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::EntryTooLarge { size: 22, limit: 10 }));
        assert_eq!(cache.get("k3").await.unwrap(), None);
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn test_compressed_round_trip() {
        let config = CacheConfig::default().with_compression(true);
        let (cache, backend) = cache_with(config);
        let payload = r#"[{"id":1,"name":"ada"},{"id":2,"name":"grace"}]"#.repeat(50);

        cache
            .set("rows", &payload, SetOptions::new().depends_on("users"))
            .await
            .unwrap();

        let stored = backend.get("rows").await.unwrap().unwrap();
        assert!(stored.len() < payload.len());
        assert_eq!(cache.get("rows").await.unwrap(), Some(payload));
    }

    #[tokio::test]
    async fn test_compressed_store_reports_corrupt_plain_bytes() {
        let (plain, backend) = cache();
        plain.set("k", "not compressed", SetOptions::new()).await.unwrap();

        let compressed =
            QueryCache::new(backend, CacheConfig::default().with_compression(true)).unwrap();
        let err = compressed.get("k").await.unwrap_err();

        assert!(matches!(err, CacheError::CorruptData(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_keeps_longest_dependency_ttl() {
        let (cache, backend) = cache();
        let long = SetOptions::new()
            .depends_on("users")
            .ttl(Duration::from_secs(600));
        let short = SetOptions::new()
            .depends_on("users")
            .ttl(Duration::from_secs(60));

        cache.set("long", "v", long).await.unwrap();
        cache.set("short", "v", short).await.unwrap();
        assert_eq!(
            backend.ttl("dependency:users").await,
            Some(Duration::from_secs(600))
        );

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(cache.invalidate("users").await.unwrap(), 2);
        assert_eq!(cache.get("long").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_overwrites_dependency_ttl() {
        let config = CacheConfig::default().with_dependency_ttl(DependencyTtlPolicy::Refresh);
        let (cache, backend) = cache_with(config);

        cache
            .set(
                "long",
                "v",
                SetOptions::new()
                    .depends_on("users")
                    .ttl(Duration::from_secs(600)),
            )
            .await
            .unwrap();
        cache
            .set(
                "short",
                "v",
                SetOptions::new()
                    .depends_on("users")
                    .ttl(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        assert_eq!(
            backend.ttl("dependency:users").await,
            Some(Duration::from_secs(60))
        );
    }

    #[tokio::test]
    async fn test_failed_batch_is_all_or_nothing() {
        let (cache, backend) = cache();
        cache.set("dependency:users", "squatter", SetOptions::new()).await.unwrap();

        let err = cache
            .set("k", "v", SetOptions::new().depends_on("users"))
            .await
            .unwrap_err();

        assert!(err.is_backend());
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn test_observer_sees_hits_and_misses() {
        let counter = Arc::new(HitMissCounter::new());
        let cache = QueryCache::builder()
            .backend(MemoryBackend::new())
            .observer(counter.clone())
            .build()
            .unwrap();

        cache.set("k", "v", SetOptions::new()).await.unwrap();
        cache.get("k").await.unwrap();
        cache.get("k").await.unwrap();
        cache.get("missing").await.unwrap();

        assert_eq!(counter.hits(), 2);
        assert_eq!(counter.misses(), 1);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Row {
            id: u32,
            name: String,
        }

        let (cache, _) = cache();
        let rows = vec![Row {
            id: 7,
            name: "ada".to_string(),
        }];

        cache
            .set_json("users:all", &rows, SetOptions::new().depends_on("users"))
            .await
            .unwrap();
        let cached: Option<Vec<Row>> = cache.get_json("users:all").await.unwrap();
        assert_eq!(cached, Some(rows));

        cache.set("bad", "{not json", SetOptions::new()).await.unwrap();
        let err = cache.get_json::<Vec<Row>>("bad").await.unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }

    #[test]
    fn test_build_without_backend_is_invalid() {
        let err = QueryCache::builder().build().unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
    }

    #[test]
    fn test_build_with_invalid_config_is_rejected() {
        let err = QueryCache::builder()
            .backend(MemoryBackend::new())
            .config(CacheConfig::default().with_max_entry_size(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_backend_read_error_is_not_a_miss() {
        let mut backend = MockCacheBackend::new();
        backend
            .expect_get()
            .returning(|_| Err(CacheError::Backend("connection refused".to_string())));

        let counter = Arc::new(HitMissCounter::new());
        let cache = QueryCache::builder()
            .backend(backend)
            .observer(counter.clone())
            .build()
            .unwrap();

        assert!(cache.get("k").await.unwrap_err().is_backend());
        assert_eq!(counter.misses(), 0);
    }

    #[tokio::test]
    async fn test_plain_set_skips_batch() {
        let mut backend = MockCacheBackend::new();
        backend
            .expect_set_ex()
            .withf(|key, value, ttl| key == "k" && value == b"v" && *ttl == 3600)
            .times(1)
            .returning(|_, _, _| Ok(()));
        backend.expect_exec_atomic().never();

        let cache = QueryCache::builder().backend(backend).build().unwrap();
        cache.set("k", "v", SetOptions::new()).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalidate_deletes_in_one_batch() {
        let mut backend = MockCacheBackend::new();
        backend
            .expect_members()
            .withf(|key| key == "dependency:users")
            .returning(|_| Ok(vec!["k1".to_string(), "k2".to_string()]));
        backend
            .expect_exec_atomic()
            .withf(|commands| {
                commands
                    == [Command::Del {
                        keys: vec![
                            "k1".to_string(),
                            "k2".to_string(),
                            "dependency:users".to_string(),
                        ],
                    }]
            })
            .times(1)
            .returning(|_| Ok(()));

        let cache = QueryCache::builder().backend(backend).build().unwrap();
        assert_eq!(cache.invalidate("users").await.unwrap(), 2);
    }
}
