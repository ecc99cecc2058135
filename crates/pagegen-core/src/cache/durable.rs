//! Durable cache tier.
//!
//! The durable tier is not space-bounded and survives restarts. It is a
//! performance optimization only: the [`Cache`](super::Cache) logs and drops
//! any error it returns.
//!
//! ## Storage Layout
//!
//! ```text
//! <durable_dir>/
//!   3f1c9a...e07b.json   # one record per key, named by sha256(key)
//!   9ad2c4...1f30.json
//! ```

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{Error, Result};

/// A persisted cache row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurableRecord {
    pub key: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_count: u64,
}

impl DurableRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Backing store of the durable tier.
///
/// Errors should be reported as [`Error::CacheUnavailable`].
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<DurableRecord>>;

    /// Insert or replace the record under `record.key`.
    async fn store(&self, record: &DurableRecord) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<bool>;

    /// Remove records sharing any tag with `tags`, returning their keys.
    async fn remove_tagged(&self, tags: &BTreeSet<String>) -> Result<Vec<String>>;

    /// Remove records expired at `now`, returning their keys.
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>>;

    async fn clear(&self) -> Result<()>;

    async fn len(&self) -> Result<usize>;

    /// Count a read against the record written at `created_at`.
    ///
    /// A record that was replaced or removed since is left alone. Returns
    /// whether a record was updated. Must be atomic with respect to `store`
    /// and `remove` on the same key.
    async fn touch(&self, key: &str, created_at: DateTime<Utc>) -> Result<bool>;
}

/// Durable tier kept in process memory, for tests and single-run tools.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, DurableRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<DurableRecord>> {
        Ok(self.records.get(key).map(|r| r.clone()))
    }

    async fn store(&self, record: &DurableRecord) -> Result<()> {
        self.records.insert(record.key.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.records.remove(key).is_some())
    }

    async fn remove_tagged(&self, tags: &BTreeSet<String>) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        self.records.retain(|key, record| {
            let hit = !record.tags.is_disjoint(tags);
            if hit {
                removed.push(key.clone());
            }
            !hit
        });
        Ok(removed)
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        self.records.retain(|key, record| {
            let expired = record.is_expired(now);
            if expired {
                removed.push(key.clone());
            }
            !expired
        });
        Ok(removed)
    }

    async fn clear(&self) -> Result<()> {
        self.records.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    async fn touch(&self, key: &str, created_at: DateTime<Utc>) -> Result<bool> {
        match self.records.get_mut(key) {
            Some(mut record) if record.created_at == created_at => {
                record.usage_count = record.usage_count.saturating_add(1);
                Ok(true)
            },
            _ => Ok(false),
        }
    }
}

/// One JSON file per key under a root directory.
///
/// Writes go to a unique temp file first and are renamed into place, so a
/// reader never observes a partially written record. Mutations within one
/// process are serialized so a `touch` cannot overwrite a newer `store`.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_seq: AtomicU64,
    writes: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            write_seq: AtomicU64::new(0),
            writes: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key_digest(key)))
    }

    /// Every readable record with its path. Unreadable files are skipped.
    async fn scan(&self) -> Result<Vec<(PathBuf, DurableRecord)>> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(unavailable("read cache directory", &e)),
        };

        let mut records = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| unavailable("list cache directory", &e))?
        {
            let path = item.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path).await {
                Ok(Some(record)) => records.push((path, record)),
                Ok(None) => {},
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable cache record"),
            }
        }
        Ok(records)
    }

    async fn remove_matching(
        &self,
        predicate: impl Fn(&DurableRecord) -> bool + Send,
    ) -> Result<Vec<String>> {
        let _writes = self.writes.lock().await;
        let mut removed = Vec::new();
        for (path, record) in self.scan().await? {
            if predicate(&record) {
                remove_file(&path).await?;
                removed.push(record.key);
            }
        }
        Ok(removed)
    }

    /// Caller holds `writes`.
    async fn write_record(&self, record: &DurableRecord) -> Result<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| unavailable("create cache directory", &e))?;

        let path = self.record_path(&record.key);
        let json = serde_json::to_vec(record)?;

        let seq = self.write_seq.fetch_add(1, Ordering::Relaxed);
        let tmp_path = path.with_extension(format!("{}.{seq}.tmp", std::process::id()));
        fs::write(&tmp_path, json)
            .await
            .map_err(|e| unavailable("write temp cache record", &e))?;

        // Handle Windows: remove target before rename
        #[cfg(target_os = "windows")]
        if fs::try_exists(&path).await.unwrap_or(false) {
            remove_file(&path).await?;
        }

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(unavailable("commit cache record", &e));
        }

        debug!(key = %record.key, "stored durable cache record");
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<DurableRecord>> {
        let path = self.record_path(key);
        match read_record(&path).await {
            Ok(Some(record)) if record.key == key => Ok(Some(record)),
            Ok(_) => Ok(None),
            Err(Error::Serialization(msg)) => {
                warn!(key, "discarding corrupt cache record: {msg}");
                remove_file(&path).await?;
                Ok(None)
            },
            Err(e) => Err(e),
        }
    }

    async fn store(&self, record: &DurableRecord) -> Result<()> {
        let _writes = self.writes.lock().await;
        self.write_record(record).await
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let _writes = self.writes.lock().await;
        remove_file(&self.record_path(key)).await
    }

    async fn remove_tagged(&self, tags: &BTreeSet<String>) -> Result<Vec<String>> {
        self.remove_matching(|record| !record.tags.is_disjoint(tags))
            .await
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        self.remove_matching(|record| record.is_expired(now)).await
    }

    async fn clear(&self) -> Result<()> {
        let _writes = self.writes.lock().await;
        for (path, _) in self.scan().await? {
            remove_file(&path).await?;
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.scan().await?.len())
    }

    async fn touch(&self, key: &str, created_at: DateTime<Utc>) -> Result<bool> {
        let _writes = self.writes.lock().await;
        match self.load(key).await? {
            Some(mut record) if record.created_at == created_at => {
                record.usage_count = record.usage_count.saturating_add(1);
                self.write_record(&record).await?;
                Ok(true)
            },
            _ => Ok(false),
        }
    }
}

/// Hex SHA-256 of a cache key, used as the record file name.
pub fn key_digest(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

async fn read_record(path: &Path) -> Result<Option<DurableRecord>> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(unavailable("read cache record", &e)),
    };
    Ok(Some(serde_json::from_slice(&content)?))
}

async fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(unavailable("remove cache record", &e)),
    }
}

fn unavailable(action: &str, err: &std::io::Error) -> Error {
    Error::CacheUnavailable(format!("Failed to {action}: {err}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(key: &str, tags: &[&str], ttl_secs: i64) -> DurableRecord {
        let now = Utc::now();
        DurableRecord {
            key: key.to_string(),
            value: serde_json::json!({ "key": key }),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            created_at: now,
            expires_at: now + chrono::Duration::seconds(ttl_secs),
            usage_count: 0,
        }
    }

    fn tag_set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| (*t).to_string()).collect()
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path().join("cache"));

        assert!(store.load("missing").await.unwrap().is_none());

        let original = record("page-data:category:{\"category\":\"forex\"}", &["category:forex"], 60);
        store.store(&original).await.unwrap();
        assert_eq!(store.load(&original.key).await.unwrap(), Some(original.clone()));
        assert_eq!(store.len().await.unwrap(), 1);

        let file = store.root().join(format!("{}.json", key_digest(&original.key)));
        assert!(file.exists());

        assert!(store.remove(&original.key).await.unwrap());
        assert!(!store.remove(&original.key).await.unwrap());
    }

    #[tokio::test]
    async fn test_file_store_overwrite_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());

        let mut rec = record("k", &[], 60);
        store.store(&rec).await.unwrap();
        rec.usage_count = 7;
        store.store(&rec).await.unwrap();

        assert_eq!(store.load("k").await.unwrap().unwrap().usage_count, 7);
        let names: Vec<_> = std::fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".json"));
    }

    #[tokio::test]
    async fn test_file_store_tag_and_expiry_removal() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());

        store.store(&record("a", &["category:forex"], 60)).await.unwrap();
        store.store(&record("b", &["country:US"], 60)).await.unwrap();
        store.store(&record("old", &["country:US"], -1)).await.unwrap();

        let expired = store.remove_expired(Utc::now()).await.unwrap();
        assert_eq!(expired, vec!["old".to_string()]);

        let tagged = store
            .remove_tagged(&tag_set(&["category:forex"]))
            .await
            .unwrap();
        assert_eq!(tagged, vec!["a".to_string()]);
        assert!(store.load("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_discards_corrupt_record() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(temp.path());
        let path = temp.path().join(format!("{}.json", key_digest("broken")));
        std::fs::write(&path, "{ not json").unwrap();

        assert!(store.load("broken").await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_touch_increments_usage() {
        let temp = TempDir::new().unwrap();
        let file_store = FileStore::new(temp.path());
        let memory_store = MemoryStore::new();

        for store in [&file_store as &dyn DurableStore, &memory_store] {
            let rec = record("k", &[], 60);
            store.store(&rec).await.unwrap();
            assert!(store.touch("k", rec.created_at).await.unwrap());
            assert!(store.touch("k", rec.created_at).await.unwrap());
            assert_eq!(store.load("k").await.unwrap().unwrap().usage_count, 2);
        }
    }

    #[tokio::test]
    async fn test_touch_leaves_replaced_and_removed_records_alone() {
        let temp = TempDir::new().unwrap();
        let file_store = FileStore::new(temp.path());
        let memory_store = MemoryStore::new();

        for store in [&file_store as &dyn DurableStore, &memory_store] {
            let stale = record("k", &[], 60);
            let mut fresh = record("k", &[], 120);
            fresh.created_at = stale.created_at + chrono::Duration::seconds(1);
            fresh.value = serde_json::json!({ "key": "fresh" });

            store.store(&stale).await.unwrap();
            store.store(&fresh).await.unwrap();
            assert!(!store.touch("k", stale.created_at).await.unwrap());
            assert_eq!(store.load("k").await.unwrap(), Some(fresh.clone()));

            store.remove("k").await.unwrap();
            assert!(!store.touch("k", fresh.created_at).await.unwrap());
            assert!(store.load("k").await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_memory_store_clear() {
        let store = MemoryStore::new();
        store.store(&record("a", &[], 60)).await.unwrap();
        store.store(&record("b", &[], 60)).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.len().await.unwrap(), 0);
    }
}
