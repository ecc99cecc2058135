use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::durable::DurableRecord;

/// A cached value with its lifecycle metadata.
///
/// `expires_at` is fixed when the entry is written; reads refresh only
/// `access_count` and `last_accessed_at`.
#[derive(Debug)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: Arc<V>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed_at: DateTime<Utc>,
    /// Approximate in-memory size used for eviction accounting
    pub size_bytes: usize,
    pub tags: BTreeSet<String>,
    /// Monotonic recency stamp, ordered the same way as `last_accessed_at`
    pub(crate) access_tick: u64,
}

impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: Arc::clone(&self.value),
            created_at: self.created_at,
            expires_at: self.expires_at,
            access_count: self.access_count,
            last_accessed_at: self.last_accessed_at,
            size_bytes: self.size_bytes,
            tags: self.tags.clone(),
            access_tick: self.access_tick,
        }
    }
}

impl<V> CacheEntry<V> {
    pub(crate) fn new(
        key: String,
        value: Arc<V>,
        ttl: Duration,
        tags: BTreeSet<String>,
        size_bytes: usize,
    ) -> Self {
        let now = Utc::now();
        // expires_at must stay strictly after created_at
        let ttl = chrono::Duration::from_std(ttl.max(Duration::from_millis(1)))
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::from(u32::MAX)));
        Self {
            key,
            value,
            created_at: now,
            expires_at: now + ttl,
            access_count: 0,
            last_accessed_at: now,
            size_bytes,
            tags,
            access_tick: 0,
        }
    }

    /// Rebuild a fast-tier entry from a durable record, keeping its expiry and tags.
    pub(crate) fn promoted(record: &DurableRecord, value: Arc<V>, size_bytes: usize) -> Self {
        Self {
            key: record.key.clone(),
            value,
            created_at: record.created_at,
            expires_at: record.expires_at,
            access_count: record.usage_count.saturating_add(1),
            last_accessed_at: Utc::now(),
            size_bytes,
            tags: record.tags.clone(),
            access_tick: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn has_any_tag(&self, tags: &BTreeSet<String>) -> bool {
        !self.tags.is_disjoint(tags)
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>, tick: u64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now;
        self.access_tick = tick;
    }

    pub(crate) fn to_record(&self, value: serde_json::Value) -> DurableRecord {
        DurableRecord {
            key: self.key.clone(),
            value,
            tags: self.tags.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            usage_count: self.access_count,
        }
    }
}

/// Options for [`Cache::set`](super::Cache::set).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Falls back to the cache's default TTL when `None`
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
}

impl SetOptions {
    #[must_use]
    pub const fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Estimated footprint of a serialized value.
///
/// Two bytes per serialized byte, roughly what a UTF-16 in-memory copy costs.
pub(crate) const fn estimate_size(serialized_len: usize) -> usize {
    serialized_len.saturating_mul(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ttl_still_expires_after_creation() {
        let entry = CacheEntry::new("k".into(), Arc::new(1u8), Duration::ZERO, BTreeSet::new(), 2);
        assert!(entry.expires_at > entry.created_at);
    }

    #[test]
    fn test_tag_intersection() {
        let tags: BTreeSet<String> = ["category:forex".to_string(), "country:US".to_string()]
            .into_iter()
            .collect();
        let entry = CacheEntry::new("k".into(), Arc::new(()), Duration::from_secs(1), tags, 0);

        let wanted: BTreeSet<String> = ["country:US".to_string()].into_iter().collect();
        assert!(entry.has_any_tag(&wanted));

        let other: BTreeSet<String> = ["country:GB".to_string()].into_iter().collect();
        assert!(!entry.has_any_tag(&other));
    }

    #[test]
    fn test_set_options_builder() {
        let options = SetOptions::default()
            .ttl(Duration::from_secs(5))
            .tags(["a", "b"]);
        assert_eq!(options.ttl, Some(Duration::from_secs(5)));
        assert_eq!(options.tags, vec!["a".to_string(), "b".to_string()]);
    }
}
