//! TTL read-through cache for JSON-backed store files.
//!
//! Keeps repeated reads of the flat-file stores (catalog, users) off the disk
//! while bounding staleness: an entry older than the TTL is indistinguishable
//! from an absent one and forces a reload. Writers must call `invalidate`
//! after rewriting the backing file.

use crate::config::CacheConfig;
use crate::store::atomic::atomic_read_json;
use crate::Result;
use mini_moka::sync::Cache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Read-through cache over JSON files, keyed by file path.
///
/// Generic over the payload type; each store instantiates it with its own
/// root mapping type. A missing backing file reads as `T::default()` (a store
/// that has never been written is an empty store). I/O and parse errors are
/// never swallowed; the caller decides what a data-loss condition means.
pub struct JsonFileCache<T> {
    entries: Cache<PathBuf, T>,
    /// Serializes the miss path so two concurrent readers don't both load
    /// the same file from disk.
    load_lock: Mutex<()>,
    disk_loads: AtomicU64,
}

impl<T> JsonFileCache<T>
where
    T: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create a cache with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(CacheConfig::DEFAULT_TTL)
    }

    /// Create a cache with an explicit TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(CacheConfig::MAX_ENTRIES)
                .build(),
            load_lock: Mutex::new(()),
            disk_loads: AtomicU64::new(0),
        }
    }

    /// Return the payload for `path`, reading from disk only on a cache miss.
    ///
    /// A live entry is served without touching the file; otherwise the file
    /// is loaded, stored with a fresh timestamp, and returned.
    pub fn read(&self, path: &Path) -> Result<T> {
        let key = path.to_path_buf();

        if let Some(value) = self.entries.get(&key) {
            return Ok(value);
        }

        let _guard = self.load_lock.lock().expect("cache load lock poisoned");

        // A concurrent reader may have populated the entry while we waited.
        if let Some(value) = self.entries.get(&key) {
            return Ok(value);
        }

        let value: T = atomic_read_json(path)?.unwrap_or_default();
        self.disk_loads.fetch_add(1, Ordering::Relaxed);
        debug!("Loaded {} from disk", path.display());

        self.entries.insert(key, value.clone());
        Ok(value)
    }

    /// Drop any entry for `path`; the next `read` reloads from disk.
    ///
    /// Must be called by any writer that rewrites the backing file.
    pub fn invalidate(&self, path: &Path) {
        self.entries.invalidate(&path.to_path_buf());
    }

    /// Number of disk loads performed since construction.
    pub fn disk_load_count(&self) -> u64 {
        self.disk_loads.load(Ordering::Relaxed)
    }
}

impl<T> Default for JsonFileCache<T>
where
    T: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::atomic::atomic_write_json;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    type Payload = BTreeMap<String, u32>;

    fn write_payload(path: &Path, entries: &[(&str, u32)]) {
        let map: Payload = entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        atomic_write_json(path, &map, false).unwrap();
    }

    #[test]
    fn test_read_within_ttl_hits_cache() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        write_payload(&path, &[("a", 1)]);

        let cache: JsonFileCache<Payload> = JsonFileCache::with_ttl(Duration::from_secs(60));

        let first = cache.read(&path).unwrap();
        let second = cache.read(&path).unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.disk_load_count(), 1);
    }

    #[test]
    fn test_read_after_ttl_reloads_exactly_once() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        write_payload(&path, &[("a", 1)]);

        let cache: JsonFileCache<Payload> = JsonFileCache::with_ttl(Duration::from_millis(50));

        cache.read(&path).unwrap();
        assert_eq!(cache.disk_load_count(), 1);

        std::thread::sleep(Duration::from_millis(80));

        cache.read(&path).unwrap();
        cache.read(&path).unwrap();
        assert_eq!(cache.disk_load_count(), 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        write_payload(&path, &[("a", 1)]);

        let cache: JsonFileCache<Payload> = JsonFileCache::with_ttl(Duration::from_secs(60));

        let stale = cache.read(&path).unwrap();
        assert_eq!(stale.get("a"), Some(&1));

        write_payload(&path, &[("a", 2)]);

        // Still served from cache until invalidated
        let cached = cache.read(&path).unwrap();
        assert_eq!(cached.get("a"), Some(&1));

        cache.invalidate(&path);
        let fresh = cache.read(&path).unwrap();
        assert_eq!(fresh.get("a"), Some(&2));
        assert_eq!(cache.disk_load_count(), 2);
    }

    #[test]
    fn test_missing_file_reads_as_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.json");

        let cache: JsonFileCache<Payload> = JsonFileCache::new();
        let value = cache.read(&path).unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_disk_error_propagates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, b"][").unwrap();

        let cache: JsonFileCache<Payload> = JsonFileCache::new();
        assert!(cache.read(&path).is_err());
    }
}
