//! Two-tier cache with TTL expiry, tag invalidation and LRU eviction.
//!
//! [`Cache`] coordinates a fast in-process tier and an optional durable tier.
//! Lookups try the fast tier first; a durable hit is promoted into the fast
//! tier with its original expiry and tags. Writes go to both tiers.
//!
//! Every removal bumps an invalidation epoch. A promotion whose durable read
//! overlapped a removal is dropped, so an invalidated entry is never revived
//! by a lookup that was already in flight.
//!
//! The cache is a performance optimization, never a source of truth. Durable
//! tier failures are logged and counted in [`CacheStatsSummary`], and the fast
//! tier keeps serving.
//!
//! ```rust
//! use std::time::Duration;
//! use pagegen_core::cache::{Cache, CacheConfig, SetOptions};
//!
//! # tokio_test_block(async {
//! let cache: Cache<String> = Cache::new(CacheConfig::default());
//! cache
//!     .set("greeting", "hello".to_string(), SetOptions::default().tags(["demo"]))
//!     .await;
//! assert_eq!(cache.get_value("greeting").await.as_deref().map(String::as_str), Some("hello"));
//! assert_eq!(cache.delete_by_tags(&["demo"]).await, 1);
//! # });
//! # fn tokio_test_block(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f)
//! # }
//! ```

mod durable;
mod entry;
mod fast;

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub use durable::{DurableRecord, DurableStore, FileStore, MemoryStore, key_digest};
pub use entry::{CacheEntry, SetOptions};

use crate::config::CacheSettings;
use entry::estimate_size;
use fast::{FastLookup, FastTier};

/// Configuration for cache behavior
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Fast tier byte budget
    pub memory_budget_bytes: usize,
    /// TTL used when a write does not specify one
    pub default_ttl: Duration,
    /// Fraction of the budget eviction shrinks usage down to
    pub eviction_target_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: 50 * 1024 * 1024, // 50MB
            default_ttl: Duration::from_secs(24 * 60 * 60),
            eviction_target_ratio: 0.8,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            memory_budget_bytes: settings.memory_budget_bytes,
            default_ttl: Duration::from_secs(settings.default_ttl_secs),
            eviction_target_ratio: settings.eviction_target_ratio,
        }
    }
}

#[derive(Debug, Default)]
struct CacheStats {
    requests: AtomicU64,
    fast_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    evictions: AtomicU64,
    durable_failures: AtomicU64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatsSummary {
    /// Total lookups
    pub requests: u64,
    /// Lookups answered by either tier
    pub hits: u64,
    pub fast_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    /// `hits / requests`, 0 when there were no requests
    pub hit_rate: f64,
    /// `misses / requests`, 0 when there were no requests
    pub miss_rate: f64,
    pub sets: u64,
    pub evictions: u64,
    pub durable_failures: u64,
    /// Entries currently in the fast tier
    pub entry_count: usize,
    /// Records in the durable tier, `None` without one or when it is unreachable
    pub durable_entries: Option<usize>,
    /// Bytes accounted to the fast tier
    pub memory_bytes: usize,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Two-tier keyed cache of serializable values.
pub struct Cache<V> {
    fast: FastTier<V>,
    durable: Option<Arc<dyn DurableStore>>,
    config: CacheConfig,
    stats: CacheStats,
    /// Invalidation epoch. Held while the fast tier is written or promoted into.
    invalidations: Mutex<u64>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

enum Promotion<V> {
    Promoted(CacheEntry<V>),
    /// A newer write reached the fast tier first
    Superseded(CacheEntry<V>),
    /// Removed while the durable read was in flight
    Invalidated,
}

impl<V> Cache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Fast tier only.
    pub fn new(config: CacheConfig) -> Self {
        Self::build(config, None)
    }

    pub fn with_durable(config: CacheConfig, durable: Arc<dyn DurableStore>) -> Self {
        Self::build(config, Some(durable))
    }

    fn build(config: CacheConfig, durable: Option<Arc<dyn DurableStore>>) -> Self {
        Self {
            fast: FastTier::new(config.memory_budget_bytes, config.eviction_target_ratio),
            durable,
            config,
            stats: CacheStats::default(),
            invalidations: Mutex::new(0),
            sweeper: Mutex::new(None),
        }
    }

    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up `key`, fast tier first.
    ///
    /// Expired entries are deleted from both tiers and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<CacheEntry<V>> {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        let found = self.lookup(key, true).await;
        if found.is_none() {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key, "cache miss");
        }
        found
    }

    /// Value under `key`, if present and live.
    pub async fn get_value(&self, key: &str) -> Option<Arc<V>> {
        self.get(key).await.map(|entry| entry.value)
    }

    /// Like [`get_value`](Self::get_value), but not recorded in [`stats`](Self::stats).
    pub async fn peek(&self, key: &str) -> Option<Arc<V>> {
        self.lookup(key, false).await.map(|entry| entry.value)
    }

    async fn lookup(&self, key: &str, record_hit: bool) -> Option<CacheEntry<V>> {
        let now = Utc::now();

        match self.fast.get(key, now) {
            FastLookup::Hit(entry) => {
                if record_hit {
                    self.stats.fast_hits.fetch_add(1, Ordering::Relaxed);
                }
                debug!(key, "cache hit (fast)");
                return Some(entry);
            },
            FastLookup::Expired => {
                debug!(key, "cache entry expired");
                self.durable_remove(key).await;
                return None;
            },
            FastLookup::Miss => {},
        }

        let entry = self.load_durable(key, now).await?;
        if record_hit {
            self.stats.durable_hits.fetch_add(1, Ordering::Relaxed);
        }
        Some(entry)
    }

    async fn load_durable(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry<V>> {
        let durable = self.durable.as_ref()?;
        let epoch = *self.lock_invalidations();
        let record = match durable.load(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => {
                self.note_durable_failure("load", key, &e);
                return None;
            },
        };

        if record.is_expired(now) {
            self.durable_remove(key).await;
            return None;
        }

        let size = estimate_size(record.value.to_string().len());
        let value: V = match serde_json::from_value(record.value.clone()) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "durable record does not match cached type, dropping");
                self.durable_remove(key).await;
                return None;
            },
        };

        let entry = CacheEntry::promoted(&record, Arc::new(value), size);
        match self.promote(entry, epoch, now) {
            Promotion::Promoted(entry) => {
                debug!(key, "cache hit (durable), promoted");
                if let Err(e) = durable.touch(key, record.created_at).await {
                    self.note_durable_failure("touch", key, &e);
                }
                Some(entry)
            },
            Promotion::Superseded(current) => Some(current),
            Promotion::Invalidated => {
                debug!(key, "invalidated during durable read, not promoted");
                None
            },
        }
    }

    fn promote(&self, entry: CacheEntry<V>, epoch: u64, now: DateTime<Utc>) -> Promotion<V> {
        let invalidations = self.lock_invalidations();
        if *invalidations != epoch {
            return Promotion::Invalidated;
        }
        if let FastLookup::Hit(current) = self.fast.get(&entry.key, now) {
            return Promotion::Superseded(current);
        }
        let evicted = self.fast.insert(entry.clone());
        drop(invalidations);
        self.stats
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        Promotion::Promoted(entry)
    }

    /// Write `value` to both tiers.
    pub async fn set(&self, key: &str, value: impl Into<Arc<V>>, options: SetOptions) {
        let value = value.into();
        let raw = match serde_json::to_value(value.as_ref()) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "value is not serializable, not cached");
                return;
            },
        };

        let size = estimate_size(raw.to_string().len());
        let ttl = options.ttl.unwrap_or(self.config.default_ttl);
        let tags: BTreeSet<String> = options.tags.into_iter().collect();
        let entry = CacheEntry::new(key.to_string(), value, ttl, tags, size);
        let record = entry.to_record(raw);

        let evicted = {
            let _invalidations = self.lock_invalidations();
            self.fast.insert(entry)
        };
        self.stats
            .evictions
            .fetch_add(evicted as u64, Ordering::Relaxed);
        self.stats.sets.fetch_add(1, Ordering::Relaxed);

        if let Some(durable) = &self.durable {
            if let Err(e) = durable.store(&record).await {
                self.note_durable_failure("store", key, &e);
            }
        }
    }

    /// Remove `key` from both tiers. Returns whether anything was removed.
    pub async fn delete(&self, key: &str) -> bool {
        let fast = self.invalidate(|fast| fast.remove(key));
        let durable = self.durable_remove(key).await;
        // A promotion may have read the record before the durable removal landed
        let promoted = self.invalidate(|fast| fast.remove(key));
        fast || durable || promoted
    }

    /// Remove every entry carrying any of `tags`. Returns the number of distinct keys removed.
    pub async fn delete_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        let tags: BTreeSet<String> = tags.iter().map(|t| t.as_ref().to_string()).collect();
        if tags.is_empty() {
            return 0;
        }

        let mut removed: BTreeSet<String> = self
            .invalidate(|fast| fast.remove_tagged(&tags))
            .into_iter()
            .collect();
        if let Some(durable) = &self.durable {
            match durable.remove_tagged(&tags).await {
                Ok(keys) => removed.extend(keys),
                Err(e) => self.note_durable_failure("remove_tagged", "*", &e),
            }
            removed.extend(self.invalidate(|fast| fast.remove_tagged(&tags)));
        }

        debug!(count = removed.len(), ?tags, "invalidated tagged entries");
        removed.len()
    }

    /// Remove expired entries from both tiers. Returns the number of distinct keys removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let mut removed: BTreeSet<String> = self
            .fast
            .remove_where(|entry| entry.is_expired(now))
            .into_iter()
            .collect();

        if let Some(durable) = &self.durable {
            match durable.remove_expired(now).await {
                Ok(keys) => removed.extend(keys),
                Err(e) => self.note_durable_failure("remove_expired", "*", &e),
            }
        }

        if !removed.is_empty() {
            debug!("Swept {} expired cache entries", removed.len());
        }
        removed.len()
    }

    /// Empty both tiers.
    pub async fn clear(&self) {
        self.invalidate(FastTier::clear);
        if let Some(durable) = &self.durable {
            if let Err(e) = durable.clear().await {
                self.note_durable_failure("clear", "*", &e);
            }
            self.invalidate(FastTier::clear);
        }
    }

    /// Whether a live entry exists. Does not count as a lookup or refresh access times.
    pub async fn contains(&self, key: &str) -> bool {
        let now = Utc::now();
        if self.fast.contains_live(key, now) {
            return true;
        }
        match &self.durable {
            Some(durable) => matches!(durable.load(key).await, Ok(Some(record)) if !record.is_expired(now)),
            None => false,
        }
    }

    pub async fn stats(&self) -> CacheStatsSummary {
        let requests = self.stats.requests.load(Ordering::Relaxed);
        let fast_hits = self.stats.fast_hits.load(Ordering::Relaxed);
        let durable_hits = self.stats.durable_hits.load(Ordering::Relaxed);
        let misses = self.stats.misses.load(Ordering::Relaxed);
        let hits = fast_hits + durable_hits;

        let durable_entries = match &self.durable {
            Some(durable) => durable.len().await.ok(),
            None => None,
        };
        let (oldest_entry, newest_entry) = self.fast.age_bounds();

        #[allow(clippy::cast_precision_loss)]
        let rate = |n: u64| if requests > 0 { n as f64 / requests as f64 } else { 0.0 };

        CacheStatsSummary {
            requests,
            hits,
            fast_hits,
            durable_hits,
            misses,
            hit_rate: rate(hits),
            miss_rate: rate(misses),
            sets: self.stats.sets.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            durable_failures: self.stats.durable_failures.load(Ordering::Relaxed),
            entry_count: self.fast.len(),
            durable_entries,
            memory_bytes: self.fast.used_bytes(),
            oldest_entry,
            newest_entry,
        }
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `every`. Replaces a running sweeper.
    ///
    /// The task holds only a weak reference and ends once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(every);
            timer.tick().await;
            loop {
                timer.tick().await;
                let Some(cache) = weak.upgrade() else { break };
                cache.sweep_expired().await;
            }
        });

        let mut guard = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = guard.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the background sweeper, if any.
    pub fn shutdown(&self) {
        let mut guard = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }

    fn lock_invalidations(&self) -> MutexGuard<'_, u64> {
        self.invalidations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump the epoch and run a fast tier removal under the same lock.
    ///
    /// Removals that also touch the durable tier call this before and after
    /// it, so any promotion overlapping the durable removal is either
    /// rejected or removed again.
    fn invalidate<R>(&self, remove: impl FnOnce(&FastTier<V>) -> R) -> R {
        let mut invalidations = self.lock_invalidations();
        *invalidations = invalidations.wrapping_add(1);
        remove(&self.fast)
    }

    async fn durable_remove(&self, key: &str) -> bool {
        let Some(durable) = &self.durable else {
            return false;
        };
        match durable.remove(key).await {
            Ok(removed) => removed,
            Err(e) => {
                self.note_durable_failure("remove", key, &e);
                false
            },
        }
    }

    fn note_durable_failure(&self, op: &str, key: &str, err: &crate::Error) {
        self.stats.durable_failures.fetch_add(1, Ordering::Relaxed);
        warn!(op, key, error = %err, "durable cache tier unavailable");
    }
}

impl<V> Drop for Cache<V> {
    fn drop(&mut self) {
        if let Some(handle) = self
            .sweeper
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Page {
        title: String,
        body: String,
    }

    fn page(title: &str) -> Page {
        Page {
            title: title.to_string(),
            body: "x".repeat(100),
        }
    }

    /// Durable store that is always unreachable.
    struct OfflineStore;

    #[async_trait]
    impl DurableStore for OfflineStore {
        async fn load(&self, _key: &str) -> Result<Option<DurableRecord>> {
            Err(Error::CacheUnavailable("offline".into()))
        }
        async fn store(&self, _record: &DurableRecord) -> Result<()> {
            Err(Error::CacheUnavailable("offline".into()))
        }
        async fn remove(&self, _key: &str) -> Result<bool> {
            Err(Error::CacheUnavailable("offline".into()))
        }
        async fn remove_tagged(&self, _tags: &BTreeSet<String>) -> Result<Vec<String>> {
            Err(Error::CacheUnavailable("offline".into()))
        }
        async fn remove_expired(&self, _now: DateTime<Utc>) -> Result<Vec<String>> {
            Err(Error::CacheUnavailable("offline".into()))
        }
        async fn clear(&self) -> Result<()> {
            Err(Error::CacheUnavailable("offline".into()))
        }
        async fn len(&self) -> Result<usize> {
            Err(Error::CacheUnavailable("offline".into()))
        }
        async fn touch(&self, _key: &str, _created_at: DateTime<Utc>) -> Result<bool> {
            Err(Error::CacheUnavailable("offline".into()))
        }
    }

    /// Memory store whose reads take `delay`.
    struct SlowReads {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl DurableStore for SlowReads {
        async fn load(&self, key: &str) -> Result<Option<DurableRecord>> {
            let record = self.inner.load(key).await;
            tokio::time::sleep(self.delay).await;
            record
        }
        async fn store(&self, record: &DurableRecord) -> Result<()> {
            self.inner.store(record).await
        }
        async fn remove(&self, key: &str) -> Result<bool> {
            self.inner.remove(key).await
        }
        async fn remove_tagged(&self, tags: &BTreeSet<String>) -> Result<Vec<String>> {
            self.inner.remove_tagged(tags).await
        }
        async fn remove_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
            self.inner.remove_expired(now).await
        }
        async fn clear(&self) -> Result<()> {
            self.inner.clear().await
        }
        async fn len(&self) -> Result<usize> {
            self.inner.len().await
        }
        async fn touch(&self, key: &str, created_at: DateTime<Utc>) -> Result<bool> {
            self.inner.touch(key, created_at).await
        }
    }

    fn slow_reads(delay: Duration) -> Arc<SlowReads> {
        Arc::new(SlowReads {
            inner: MemoryStore::new(),
            delay,
        })
    }

    fn layered() -> (Cache<Page>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = Cache::with_durable(CacheConfig::default(), store.clone());
        (cache, store)
    }

    #[tokio::test]
    async fn test_round_trip_then_expiry() {
        let (cache, _) = layered();
        cache
            .set("k", page("v"), SetOptions::default().ttl(Duration::from_millis(1000)))
            .await;
        assert_eq!(cache.get_value("k").await.as_deref(), Some(&page("v")));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(cache.get("k").await.is_none());
        // Expired read removes the entry from both tiers
        assert!(!cache.contains("k").await);
        assert_eq!(cache.stats().await.durable_entries, Some(0));
    }

    #[tokio::test]
    async fn test_tag_invalidation() {
        let (cache, _) = layered();
        cache
            .set("a", page("v1"), SetOptions::default().tags(["category:forex"]))
            .await;
        cache
            .set("b", page("v2"), SetOptions::default().tags(["country:US"]))
            .await;

        assert_eq!(cache.delete_by_tags(&["category:forex"]).await, 1);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
    }

    #[tokio::test]
    async fn test_multi_tag_entry_removed_by_any_tag() {
        let (cache, _) = layered();
        cache
            .set(
                "ab",
                page("v"),
                SetOptions::default().tags(["category:forex", "country:US"]),
            )
            .await;
        assert_eq!(cache.delete_by_tags(&["country:US", "unrelated"]).await, 1);
        assert!(!cache.contains("ab").await);
    }

    #[tokio::test]
    async fn test_durable_hit_is_promoted_with_original_expiry_and_tags() {
        let store = Arc::new(MemoryStore::new());
        let writer: Cache<Page> = Cache::with_durable(CacheConfig::default(), store.clone());
        writer
            .set(
                "k",
                page("v"),
                SetOptions::default()
                    .ttl(Duration::from_secs(30))
                    .tags(["category:forex"]),
            )
            .await;
        let written = store.load("k").await.unwrap().unwrap();

        // Fresh cache sharing the durable tier, as after a restart
        let reader: Cache<Page> = Cache::with_durable(CacheConfig::default(), store.clone());
        let promoted = reader.get("k").await.unwrap();
        assert_eq!(promoted.expires_at, written.expires_at);
        assert_eq!(promoted.tags, written.tags);

        let again = reader.get("k").await.unwrap();
        assert_eq!(again.expires_at, written.expires_at);

        let stats = reader.stats().await;
        assert_eq!(stats.durable_hits, 1);
        assert_eq!(stats.fast_hits, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_tag_invalidation_during_durable_read_is_not_undone() {
        let store = slow_reads(Duration::from_millis(100));
        let writer: Cache<Page> = Cache::with_durable(CacheConfig::default(), store.clone());
        writer
            .set("a", page("v1"), SetOptions::default().tags(["category:forex"]))
            .await;

        // Empty fast tier, so the first read goes to the slow durable tier
        let cache = Arc::new(Cache::<Page>::with_durable(CacheConfig::default(), store.clone()));
        let reader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("a").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.delete_by_tags(&["category:forex"]).await, 1);
        assert!(reader.await.unwrap().is_none(), "in-flight read must not promote");
        assert!(cache.get("a").await.is_none());
        assert_eq!(cache.stats().await.entry_count, 0);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_during_durable_read_is_not_undone() {
        let store = slow_reads(Duration::from_millis(100));
        let writer: Cache<Page> = Cache::with_durable(CacheConfig::default(), store.clone());
        writer.set("a", page("v1"), SetOptions::default()).await;

        let cache = Arc::new(Cache::<Page>::with_durable(CacheConfig::default(), store.clone()));
        let reader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("a").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.delete("a").await);
        assert!(reader.await.unwrap().is_none());
        assert!(!cache.contains("a").await);
    }

    #[tokio::test]
    async fn test_promotion_does_not_replace_newer_write() {
        let store = slow_reads(Duration::from_millis(100));
        let writer: Cache<Page> = Cache::with_durable(CacheConfig::default(), store.clone());
        writer.set("a", page("old"), SetOptions::default()).await;

        let cache = Arc::new(Cache::<Page>::with_durable(CacheConfig::default(), store.clone()));
        let reader = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_value("a").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.set("a", page("new"), SetOptions::default()).await;

        assert_eq!(reader.await.unwrap().as_deref(), Some(&page("new")));
        assert_eq!(cache.peek("a").await.as_deref(), Some(&page("new")));
        let durable = store.load("a").await.unwrap().unwrap();
        assert_eq!(durable.value["title"], "new");
        assert_eq!(durable.usage_count, 0);
    }

    #[tokio::test]
    async fn test_peek_is_not_counted() {
        let (cache, _) = layered();
        cache.set("k", page("v"), SetOptions::default()).await;

        assert!(cache.peek("missing").await.is_none());
        assert_eq!(cache.peek("k").await.as_deref(), Some(&page("v")));
        cache.get("k").await;

        let stats = cache.stats().await;
        assert_eq!(stats.requests, 1);
        assert_eq!(stats.misses, 0);
        assert!((stats.hit_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_offline_durable_tier_degrades_to_fast_tier() {
        let cache: Cache<Page> = Cache::with_durable(CacheConfig::default(), Arc::new(OfflineStore));
        cache.set("k", page("v"), SetOptions::default()).await;

        assert_eq!(cache.get_value("k").await.as_deref(), Some(&page("v")));
        assert!(cache.get("missing").await.is_none());

        let stats = cache.stats().await;
        assert!(stats.durable_failures >= 2);
        assert_eq!(stats.durable_entries, None);
        assert_eq!(stats.entry_count, 1);
    }

    #[tokio::test]
    async fn test_eviction_keeps_recently_accessed_entry() {
        let config = CacheConfig {
            // Each page serializes to 123 bytes, accounted as 246
            memory_budget_bytes: 1_200,
            ..CacheConfig::default()
        };
        let cache: Cache<Page> = Cache::new(config);

        for key in ["a", "b", "c", "d"] {
            cache.set(key, page(key), SetOptions::default()).await;
        }
        assert!(cache.get("a").await.is_some());

        // Pushes usage over budget, eviction shrinks to 960 bytes
        cache.set("e", page("e"), SetOptions::default()).await;

        assert!(cache.get("a").await.is_some(), "recently read entry survives");
        assert!(cache.get("e").await.is_some());
        assert!(cache.get("b").await.is_none(), "stalest entry is evicted first");
        assert!(cache.get("c").await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 2);
        assert!(stats.memory_bytes <= 1_200);
    }

    #[tokio::test]
    async fn test_sweep_counts_distinct_keys() {
        let (cache, _) = layered();
        cache
            .set("old", page("v"), SetOptions::default().ttl(Duration::from_millis(10)))
            .await;
        cache.set("fresh", page("v"), SetOptions::default()).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.sweep_expired().await, 1);
        assert!(cache.contains("fresh").await);
    }

    #[tokio::test]
    async fn test_stats_rates() {
        let cache: Cache<Page> = Cache::new(CacheConfig::default());
        cache.set("k", page("v"), SetOptions::default()).await;
        cache.get("k").await;
        cache.get("k").await;
        cache.get("nope").await;
        cache.get("nope").await;

        let stats = cache.stats().await;
        assert_eq!(stats.requests, 4);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
        assert!((stats.miss_rate - 0.5).abs() < f64::EPSILON);
        assert!(stats.oldest_entry.is_some());
        assert!(stats.memory_bytes > 0);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (cache, store) = layered();
        cache.set("a", page("a"), SetOptions::default()).await;
        cache.set("b", page("b"), SetOptions::default()).await;

        assert!(cache.delete("a").await);
        assert!(!cache.delete("a").await);

        cache.clear().await;
        assert!(!cache.contains("b").await);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_store_survives_restart() {
        let temp = TempDir::new().unwrap();
        {
            let cache: Cache<Page> =
                Cache::with_durable(CacheConfig::default(), Arc::new(FileStore::new(temp.path())));
            cache.set("persisted", page("kept"), SetOptions::default()).await;
        }

        let cache: Cache<Page> =
            Cache::with_durable(CacheConfig::default(), Arc::new(FileStore::new(temp.path())));
        assert_eq!(
            cache.get_value("persisted").await.as_deref(),
            Some(&page("kept"))
        );
    }

    #[tokio::test]
    async fn test_sweeper_runs_and_stops() {
        let (cache, _) = layered();
        let cache = Arc::new(cache);
        cache
            .set("short", page("v"), SetOptions::default().ttl(Duration::from_millis(5)))
            .await;

        cache.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(cache.stats().await.entry_count, 0);

        cache.shutdown();
        assert!(cache.sweeper.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_writers_never_tear_entries() {
        let cache = Arc::new(Cache::<Page>::new(CacheConfig::default()));
        let mut tasks = Vec::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                let p = Page {
                    title: format!("t{i}"),
                    body: format!("b{i}"),
                };
                cache.set("shared", p, SetOptions::default()).await;
                cache.get_value("shared").await
            }));
        }
        for task in tasks {
            let seen = task.await.unwrap().unwrap();
            assert_eq!(seen.title[1..], seen.body[1..]);
        }
    }
}
