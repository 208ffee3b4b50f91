//! One-file-per-key JSON cache on disk.
//!
//! Write-through and unbounded: the keyspace is subject ids, which is small,
//! and values are static for long periods. There is no locking; concurrent
//! writers for the same key overwrite each other with equivalent content,
//! and each write goes through a temp file + rename so readers never see a
//! partial entry. A file that exists but fails to parse counts as a miss.

use crate::stats::{CacheCounters, CacheStats};
use metatools_core::{MetaError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

pub struct DiskCache {
    root: PathBuf,
    ttl: Option<Duration>,
    counters: CacheCounters,
}

impl DiskCache {
    /// Open a cache rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>, ttl: Option<Duration>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            ttl,
            counters: CacheCounters::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `key`. Key characters outside
    /// `[A-Za-z0-9._-]` are replaced so a key can never escape the root.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{}.json", sanitized))
    }

    /// Look up `key`. Returns `None` for a missing file, a stale entry
    /// (when a TTL is configured), or an unreadable/corrupt entry.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);

        if let Some(ttl) = self.ttl {
            match entry_age(&path).await {
                Some(age) if age > ttl => {
                    debug!(key, age_secs = age.as_secs(), "cache entry stale");
                    self.counters.record_miss();
                    return None;
                }
                None => {
                    self.counters.record_miss();
                    return None;
                }
                _ => {}
            }
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(_) => {
                self.counters.record_miss();
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                debug!(key, "cache hit");
                self.counters.record_hit();
                Some(value)
            }
            Err(e) => {
                // treated as a miss: the caller re-fetches and overwrites
                warn!(key, error = %e, "corrupt cache entry, treating as miss");
                self.counters.record_miss();
                None
            }
        }
    }

    /// Store `value` for `key`, overwriting any existing entry.
    pub async fn put(&self, key: &str, value: &Value) -> Result<()> {
        let path = self.entry_path(key);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(value)?;

        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| MetaError::Cache(format!("failed to commit cache entry: {}", e)))?;

        debug!(key, bytes = bytes.len(), "cache entry written");
        self.counters.record_write();
        Ok(())
    }

    pub async fn contains(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.entry_path(key))
            .await
            .unwrap_or(false)
    }

    /// Manual invalidation: delete the entry file. Missing entries are fine.
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }
}

async fn entry_age(path: &Path) -> Option<Duration> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let modified = metadata.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn cache_in(dir: &TempDir, ttl: Option<Duration>) -> DiskCache {
        DiskCache::open(dir.path().join("procedures"), ttl)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn write_through_and_read_back() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, None).await;
        let value = json!({"procedures": {"subject_procedures": []}});

        assert!(cache.get("767891").await.is_none());
        cache.put("767891", &value).await.unwrap();
        assert!(cache.contains("767891").await);
        assert_eq!(cache.get("767891").await, Some(value));

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses, stats.writes), (1, 1, 1));
    }

    #[tokio::test]
    async fn one_file_per_key_under_root() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, None).await;
        cache.put("767891", &json!({})).await.unwrap();

        let mut entries = std::fs::read_dir(cache.root()).unwrap();
        let entry = entries.next().unwrap().unwrap();
        assert_eq!(entry.file_name(), "767891.json");
        assert!(entries.next().is_none());
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, None).await;
        let path = cache.entry_path("../../etc/passwd");
        assert!(path.starts_with(cache.root()));
        assert_eq!(path.file_name().unwrap(), ".._.._etc_passwd.json");
    }

    #[tokio::test]
    async fn corrupt_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, None).await;
        cache.put("767891", &json!({"ok": true})).await.unwrap();
        std::fs::write(cache.entry_path("767891"), b"{not json").unwrap();

        assert!(cache.get("767891").await.is_none());

        // re-fetch path: overwrite repairs the entry
        cache.put("767891", &json!({"ok": true})).await.unwrap();
        assert_eq!(cache.get("767891").await, Some(json!({"ok": true})));
    }

    #[tokio::test]
    async fn stale_entry_is_a_miss_under_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, Some(Duration::from_secs(3600))).await;
        cache.put("767891", &json!({"v": 1})).await.unwrap();

        // age the file past the TTL
        let path = cache.entry_path("767891");
        let old = SystemTime::now() - Duration::from_secs(7200);
        let file = std::fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(old).unwrap();

        assert!(cache.get("767891").await.is_none());
    }

    #[tokio::test]
    async fn fresh_entry_is_served_under_ttl() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, Some(Duration::from_secs(3600))).await;
        cache.put("767891", &json!({"v": 1})).await.unwrap();
        assert_eq!(cache.get("767891").await, Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn invalidate_deletes_the_entry() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, None).await;
        cache.put("767891", &json!({})).await.unwrap();

        cache.invalidate("767891").await.unwrap();
        assert!(!cache.contains("767891").await);
        // invalidating again is not an error
        cache.invalidate("767891").await.unwrap();
    }

    #[tokio::test]
    async fn overwrite_replaces_the_value() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, None).await;
        cache.put("k", &json!({"v": 1})).await.unwrap();
        cache.put("k", &json!({"v": 2})).await.unwrap();
        assert_eq!(cache.get("k").await, Some(json!({"v": 2})));
    }
}
