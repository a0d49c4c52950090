//! Hit/miss observer hooks fired by [`QueryCache::get`](crate::QueryCache::get).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives a callback for every cache lookup outcome
///
/// Callbacks run inline on the calling task and should not block.
pub trait CacheObserver: Send + Sync {
    /// A live entry was found and decoded
    fn on_hit(&self, _key: &str) {}

    /// No live entry exists for the key
    fn on_miss(&self, _key: &str) {}
}

/// Shared observer handle
pub type SharedObserver = Arc<dyn CacheObserver>;

/// Observer counting hits and misses
#[derive(Debug, Default)]
pub struct HitMissCounter {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HitMissCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups that were hits, `None` before the first lookup
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> Option<f64> {
        let hits = self.hits();
        let total = hits + self.misses();
        (total > 0).then(|| hits as f64 / total as f64)
    }
}

impl CacheObserver for HitMissCounter {
    fn on_hit(&self, _key: &str) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn on_miss(&self, _key: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}
