//! Bounded, time-expiring metadata cache shared across all tabs.
//!
//! The cache maps canonical paper URLs to resolved [`PaperMetadata`] so a
//! paper opened in several tabs (or revisited through a different link
//! variant) is resolved once. Entries expire after a configurable TTL, with
//! expiry enforced both lazily on read and by a periodic background sweep.
//! When the cache reaches capacity, the least-recently-accessed 10% of
//! entries is evicted in one batch, amortizing eviction cost across many
//! insertions instead of evicting on every insert.
//!
//! The cache is a best-effort layer: no operation fails, and callers must
//! treat every result as a hint, never a guarantee of freshness.
//!
//! # Example
//!
//! ```no_run
//! use papertab_core::cache::{CacheConfig, MetadataCache};
//!
//! # async fn example(metadata: papertab_core::PaperMetadata) {
//! let cache = MetadataCache::new(CacheConfig::default());
//! let _sweeper = cache.spawn_sweeper();
//!
//! cache.set("https://arxiv.org/abs/2301.00001", metadata).await;
//! let hit = cache.get("https://arxiv.org/abs/2301.00001").await;
//! assert!(hit.is_some());
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::metadata::PaperMetadata;

/// Default maximum number of cached entries.
pub const DEFAULT_MAX_ENTRIES: usize = 1000;

/// Default entry time-to-live (24 hours).
pub const DEFAULT_TIME_TO_LIVE: Duration = Duration::from_millis(86_400_000);

/// Default background sweep period (1 hour).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(3_600_000);

/// Fraction of capacity evicted in one batch when the cache is full.
const EVICTION_FRACTION_DENOMINATOR: usize = 10;

/// Cache sizing and expiry configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries held at once.
    pub max_entries: usize,
    /// How long an entry stays valid after creation.
    pub time_to_live: Duration,
    /// Period of the background expiry sweep.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            time_to_live: DEFAULT_TIME_TO_LIVE,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// A single cached value with its access-recency bookkeeping.
///
/// Invariant: `last_accessed_at >= created_at`.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: PaperMetadata,
    created_at: Instant,
    last_accessed_at: Instant,
    access_count: u64,
}

/// Shared metadata cache. Cheap to clone; clones share the same store.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    inner: Arc<CacheInner>,
}

#[derive(Debug)]
struct CacheInner {
    config: CacheConfig,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MetadataCache {
    /// Creates a cache with the given configuration.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                config,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Looks up metadata by canonical URL.
    ///
    /// Fails closed: an entry older than the TTL is removed and `None` is
    /// returned, even between sweeps. A hit bumps the entry's access count
    /// and last-access time.
    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Option<PaperMetadata> {
        let ttl = self.inner.config.time_to_live;
        let mut entries = self.inner.entries.lock().await;

        let expired = entries
            .get(key)
            .is_some_and(|entry| entry.created_at.elapsed() > ttl);
        if expired {
            debug!(key, "removing expired entry on read");
            entries.remove(key);
            return None;
        }

        entries.get_mut(key).map(|entry| {
            entry.access_count += 1;
            entry.last_accessed_at = Instant::now();
            entry.value.clone()
        })
    }

    /// Stores metadata under a canonical URL, evicting the least-recently-used
    /// batch first when the cache is at capacity.
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: PaperMetadata) {
        let mut entries = self.inner.entries.lock().await;

        if entries.len() >= self.inner.config.max_entries {
            Self::evict_lru_batch(&mut entries, self.inner.config.max_entries);
        }

        let now = Instant::now();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: now,
                last_accessed_at: now,
                access_count: 1,
            },
        );
    }

    /// Drops all entries unconditionally.
    pub async fn clear(&self) {
        self.inner.entries.lock().await.clear();
        debug!("cache cleared");
    }

    /// Number of live entries (expired-but-unswept entries included).
    pub async fn len(&self) -> usize {
        self.inner.entries.lock().await.len()
    }

    /// Returns true when the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Spawns the periodic expiry sweep for this cache.
    ///
    /// The returned handle cancels the sweep task when dropped or shut down
    /// explicitly, so no periodic timer outlives the owning cache.
    #[must_use]
    pub fn spawn_sweeper(&self) -> SweeperHandle {
        let cache = self.clone();
        let period = self.inner.config.sweep_interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick fires immediately; skip it so the first sweep runs
            // one full period after spawn.
            interval.tick().await;
            loop {
                interval.tick().await;
                cache.sweep().await;
            }
        });
        SweeperHandle { handle }
    }

    /// Removes every entry whose age exceeds the TTL, independent of access
    /// patterns. Bounds memory held by entries that are never read again.
    #[instrument(skip(self))]
    pub async fn sweep(&self) {
        let ttl = self.inner.config.time_to_live;
        let mut entries = self.inner.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "sweep removed expired entries");
        }
    }

    /// Removes the `ceil(max_entries * 0.1)` least-recently-accessed entries.
    fn evict_lru_batch(entries: &mut HashMap<String, CacheEntry>, max_entries: usize) {
        let batch = max_entries.div_ceil(EVICTION_FRACTION_DENOMINATOR);

        let mut by_recency: Vec<(String, Instant)> = entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.last_accessed_at))
            .collect();
        by_recency.sort_by_key(|(_, last_accessed)| *last_accessed);

        for (key, _) in by_recency.into_iter().take(batch) {
            entries.remove(&key);
        }
        debug!(evicted = batch, "evicted least-recently-used batch");
    }
}

/// Handle owning the background sweep task.
///
/// Dropping the handle aborts the task; no sweep work happens after disposal.
#[derive(Debug)]
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweep task immediately.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
