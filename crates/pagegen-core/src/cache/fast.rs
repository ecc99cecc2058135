//! In-process cache tier with a byte budget.
//!
//! Entries live in a sharded [`DashMap`], so operations on different keys do
//! not contend and a write to one key replaces the whole entry atomically.
//! Eviction runs when an insert pushes usage over the budget and removes the
//! least recently accessed entries until usage is back under the target.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use super::entry::CacheEntry;

pub(crate) enum FastLookup<V> {
    Hit(CacheEntry<V>),
    /// Present but past `expires_at`; already removed
    Expired,
    Miss,
}

pub(crate) struct FastTier<V> {
    entries: DashMap<String, CacheEntry<V>>,
    used_bytes: AtomicUsize,
    budget: usize,
    target: usize,
    tick: AtomicU64,
    eviction: Mutex<()>,
}

impl<V> FastTier<V> {
    pub(crate) fn new(budget: usize, target_ratio: f64) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let target = ((budget as f64) * target_ratio.clamp(0.0, 1.0)) as usize;
        Self {
            entries: DashMap::new(),
            used_bytes: AtomicUsize::new(0),
            budget,
            target,
            tick: AtomicU64::new(0),
            eviction: Mutex::new(()),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn get(&self, key: &str, now: DateTime<Utc>) -> FastLookup<V> {
        {
            let Some(mut entry) = self.entries.get_mut(key) else {
                return FastLookup::Miss;
            };
            if !entry.is_expired(now) {
                let tick = self.next_tick();
                entry.touch(now, tick);
                return FastLookup::Hit(entry.clone());
            }
        }

        if let Some((_, expired)) = self.entries.remove_if(key, |_, e| e.is_expired(now)) {
            self.used_bytes
                .fetch_sub(expired.size_bytes, Ordering::Relaxed);
        }
        FastLookup::Expired
    }

    /// Non-mutating presence check that ignores expired entries.
    pub(crate) fn contains_live(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Store an entry, returning how many others were evicted to make room.
    ///
    /// An entry larger than the whole budget is not kept in this tier; any
    /// older value under the same key is dropped so it cannot be served.
    pub(crate) fn insert(&self, mut entry: CacheEntry<V>) -> usize {
        if entry.size_bytes > self.budget {
            debug!(key = %entry.key, size = entry.size_bytes, "entry exceeds fast tier budget");
            self.remove(&entry.key);
            return 0;
        }

        entry.access_tick = self.next_tick();
        let key = entry.key.clone();
        let size = entry.size_bytes;

        self.used_bytes.fetch_add(size, Ordering::Relaxed);
        if let Some(previous) = self.entries.insert(key.clone(), entry) {
            self.used_bytes
                .fetch_sub(previous.size_bytes, Ordering::Relaxed);
        }

        if self.used_bytes() > self.budget {
            self.evict_lru(&key)
        } else {
            0
        }
    }

    fn evict_lru(&self, protected: &str) -> usize {
        let _guard = self.eviction.lock().unwrap_or_else(PoisonError::into_inner);
        if self.used_bytes() <= self.budget {
            return 0;
        }

        let mut candidates: Vec<(u64, String)> = self
            .entries
            .iter()
            .filter(|entry| entry.key().as_str() != protected)
            .map(|entry| (entry.access_tick, entry.key().clone()))
            .collect();
        candidates.sort_unstable();

        let mut evicted = 0;
        for (_, key) in candidates {
            if self.used_bytes() <= self.target {
                break;
            }
            if self.remove(&key) {
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(
                "Evicted {} fast tier entries, {} bytes in use",
                evicted,
                self.used_bytes()
            );
        }
        evicted
    }

    pub(crate) fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some_and(|(_, entry)| {
            self.used_bytes
                .fetch_sub(entry.size_bytes, Ordering::Relaxed);
            true
        })
    }

    /// Remove every entry matching `predicate`, returning the removed keys.
    pub(crate) fn remove_where(&self, predicate: impl Fn(&CacheEntry<V>) -> bool) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|key, entry| {
            if predicate(entry) {
                self.used_bytes
                    .fetch_sub(entry.size_bytes, Ordering::Relaxed);
                removed.push(key.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    pub(crate) fn remove_tagged(&self, tags: &BTreeSet<String>) -> Vec<String> {
        self.remove_where(|entry| entry.has_any_tag(tags))
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
        self.used_bytes.store(0, Ordering::Relaxed);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn used_bytes(&self) -> usize {
        self.used_bytes.load(Ordering::Relaxed)
    }

    /// Creation times of the oldest and newest entries.
    pub(crate) fn age_bounds(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let mut oldest: Option<DateTime<Utc>> = None;
        let mut newest: Option<DateTime<Utc>> = None;
        for entry in &self.entries {
            let created = entry.created_at;
            oldest = Some(oldest.map_or(created, |o| o.min(created)));
            newest = Some(newest.map_or(created, |n| n.max(created)));
        }
        (oldest, newest)
    }
}
