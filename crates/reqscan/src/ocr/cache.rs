//! Content-addressed store of extracted text.
//!
//! Each entry is one MessagePack file `<key>.msgpack` holding the text and its creation time.
//! Writes go to a temp file that is renamed into place, so a reader sees either the old
//! record or the new one. Expired and unreadable records are deleted on sight and reported
//! as misses.

use super::error::CacheError;
use crate::core::config::CacheConfig;
use crate::{ExtractionError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const ENTRY_EXTENSION: &str = "msgpack";

/// Source of the current time for expiry decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord {
    /// Unix seconds
    created_at: u64,
    text: String,
}

pub struct OcrCache {
    cache_dir: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    /// Sweep expired entries every N writes; 0 disables
    sweep_every: usize,
    write_counter: AtomicUsize,
}

impl std::fmt::Debug for OcrCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrCache")
            .field("cache_dir", &self.cache_dir)
            .field("ttl", &self.ttl)
            .field("sweep_every", &self.sweep_every)
            .finish_non_exhaustive()
    }
}

impl OcrCache {
    /// Open (creating if needed) a cache directory.
    pub fn new(cache_dir: impl Into<PathBuf>, ttl: Duration) -> std::result::Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache directory {}: {}", cache_dir.display(), e)))?;

        Ok(Self {
            cache_dir,
            ttl,
            clock: Arc::new(SystemClock),
            sweep_every: 100,
            write_counter: AtomicUsize::new(0),
        })
    }

    /// Open the cache described by `config`.
    ///
    /// # Errors
    ///
    /// `ExtractionError::Config` when the directory cannot be created.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let dir = config.resolved_dir();
        let cache = Self::new(&dir, config.ttl())
            .map_err(|e| ExtractionError::config_with_source(format!("Unusable cache directory {}", dir.display()), e))?;
        Ok(cache.with_sweep_every(config.sweep_every_writes))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sweep_every(mut self, writes: usize) -> Self {
        self.sweep_every = writes;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    fn now_secs(&self) -> u64 {
        self.clock
            .now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }

    fn is_expired(&self, created_at: u64, now: u64) -> bool {
        now.saturating_sub(created_at) > self.ttl.as_secs()
    }

    /// Text stored under `key`, if present and fresh.
    ///
    /// Expired or corrupt entries are removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<String> {
        if !is_valid_key(key) {
            return None;
        }
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Removing unreadable cache entry");
                discard(&path);
                return None;
            }
        };

        match rmp_serde::from_slice::<CacheRecord>(&bytes) {
            Ok(record) if self.is_expired(record.created_at, self.now_secs()) => {
                tracing::debug!(key, "Cache entry expired");
                let _ = fs::remove_file(&path);
                None
            }
            Ok(record) => Some(record.text),
            Err(e) => {
                tracing::warn!(key, error = %e, "Removing corrupt cache entry");
                discard(&path);
                None
            }
        }
    }

    /// Store `text` under `key`, replacing any existing entry.
    pub fn set(&self, key: &str, text: &str) -> std::result::Result<(), CacheError> {
        if !is_valid_key(key) {
            return Err(CacheError::Io(format!("Invalid cache key '{}'", key)));
        }

        let record = CacheRecord {
            created_at: self.now_secs(),
            text: text.to_string(),
        };
        let serialized =
            rmp_serde::to_vec(&record).map_err(|e| CacheError::Encode(format!("Failed to serialize entry: {}", e)))?;

        let cache_path = self.entry_path(key);
        let pid = std::process::id();
        let thread_id = std::thread::current().id();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let temp_path = self
            .cache_dir
            .join(format!("{}.tmp.{}.{:?}.{}", key, pid, thread_id, nanos));

        fs::write(&temp_path, &serialized)
            .map_err(|e| CacheError::Io(format!("Failed to write temp cache file: {}", e)))?;

        fs::rename(&temp_path, &cache_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            CacheError::Io(format!("Failed to rename cache file: {}", e))
        })?;

        let count = self.write_counter.fetch_add(1, Ordering::Relaxed) + 1;
        if self.sweep_every > 0 && count % self.sweep_every == 0 {
            let removed = self.sweep_expired();
            tracing::debug!(removed, "Periodic cache sweep");
        }

        Ok(())
    }

    /// Delete one entry. Returns whether it existed.
    pub fn remove(&self, key: &str) -> bool {
        is_valid_key(key) && fs::remove_file(self.entry_path(key)).is_ok()
    }

    /// Delete every expired or unreadable entry. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return 0;
        };

        let now = self.now_secs();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != ENTRY_EXTENSION) {
                continue;
            }
            let stale = match fs::read(&path) {
                Ok(bytes) => match rmp_serde::from_slice::<CacheRecord>(&bytes) {
                    Ok(record) => self.is_expired(record.created_at, now),
                    Err(_) => true,
                },
                Err(e) => e.kind() != io::ErrorKind::NotFound,
            };
            if stale && discard(&path) {
                removed += 1;
            }
        }
        removed
    }

    /// Delete every entry. Returns how many were removed.
    pub fn clear(&self) -> std::result::Result<usize, CacheError> {
        if !self.cache_dir.exists() {
            return Ok(0);
        }

        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to read cache directory: {}", e)))?;

        let mut removed = 0;
        for entry in entries.flatten() {
            if let Some(ext) = entry.path().extension()
                && ext == ENTRY_EXTENSION
                && discard(&entry.path())
            {
                removed += 1;
            }
        }

        Ok(removed)
    }

    pub fn stats(&self) -> std::result::Result<OcrCacheStats, CacheError> {
        if !self.cache_dir.exists() {
            return Ok(OcrCacheStats::default());
        }

        let entries = fs::read_dir(&self.cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to read cache directory: {}", e)))?;

        let mut total_files = 0;
        let mut total_size_bytes = 0u64;

        for entry in entries.flatten() {
            if let Some(ext) = entry.path().extension()
                && ext == ENTRY_EXTENSION
            {
                total_files += 1;
                if let Ok(metadata) = entry.metadata() {
                    total_size_bytes += metadata.len();
                }
            }
        }

        Ok(OcrCacheStats {
            total_files,
            total_size_mb: total_size_bytes as f64 / 1024.0 / 1024.0,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct OcrCacheStats {
    pub total_files: usize,
    pub total_size_mb: f64,
}

/// Delete an entry path, whatever it turned out to be. Returns whether it is gone.
fn discard(path: &Path) -> bool {
    let removed = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.is_ok()
}

/// Keys become file names, so only hex-like keys are accepted.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 128 && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Clock that only moves when told to.
    struct ManualClock(Mutex<SystemTime>);

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self(Mutex::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000))))
        }

        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> SystemTime {
            *self.0.lock().unwrap()
        }
    }

    const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);
    const DAY: Duration = Duration::from_secs(24 * 3600);

    fn cache_with_clock(dir: &Path, clock: Arc<ManualClock>) -> OcrCache {
        OcrCache::new(dir, WEEK).unwrap().with_clock(clock)
    }

    #[test]
    fn test_round_trip_then_expiry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let cache = cache_with_clock(temp_dir.path(), clock.clone());

        cache.set("abc123", "hello").unwrap();
        assert_eq!(cache.get("abc123").as_deref(), Some("hello"));

        clock.advance(8 * DAY);
        assert_eq!(cache.get("abc123"), None);
        assert!(!temp_dir.path().join("abc123.msgpack").exists());
    }

    #[test]
    fn test_entry_fresh_until_ttl() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let cache = cache_with_clock(temp_dir.path(), clock.clone());

        cache.set("k", "text").unwrap();
        clock.advance(WEEK);
        assert_eq!(cache.get("k").as_deref(), Some("text"));
    }

    #[test]
    fn test_cache_miss() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = OcrCache::new(temp_dir.path(), WEEK).unwrap();
        assert_eq!(cache.get("nonexistent"), None);
    }

    #[test]
    fn test_corrupt_entry_is_miss_and_removed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = OcrCache::new(temp_dir.path(), WEEK).unwrap();
        let path = temp_dir.path().join("bad.msgpack");
        fs::write(&path, b"\xff\x00 not msgpack").unwrap();

        assert_eq!(cache.get("bad"), None);
        assert!(!path.exists());
    }

    #[test]
    fn test_unreadable_entry_is_miss_and_removed() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = OcrCache::new(temp_dir.path(), WEEK).unwrap();
        let path = temp_dir.path().join("abc.msgpack");
        fs::create_dir(&path).unwrap();

        assert_eq!(cache.get("abc"), None);
        assert!(!path.exists());

        fs::create_dir(&path).unwrap();
        assert_eq!(cache.sweep_expired(), 1);
        assert!(!path.exists());

        // The slot is usable again
        cache.set("abc", "text").unwrap();
        assert_eq!(cache.get("abc").as_deref(), Some("text"));
    }

    #[test]
    fn test_last_writer_wins() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = OcrCache::new(temp_dir.path(), WEEK).unwrap();
        cache.set("k", "first").unwrap();
        cache.set("k", "second").unwrap();
        assert_eq!(cache.get("k").as_deref(), Some("second"));
        assert_eq!(cache.stats().unwrap().total_files, 1);
    }

    #[test]
    fn test_sweep_removes_only_expired_and_corrupt() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let cache = cache_with_clock(temp_dir.path(), clock.clone());

        cache.set("old", "a").unwrap();
        clock.advance(6 * DAY);
        cache.set("new", "b").unwrap();
        fs::write(temp_dir.path().join("junk.msgpack"), b"junk").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), b"keep me").unwrap();
        clock.advance(2 * DAY);

        assert_eq!(cache.sweep_expired(), 2);
        assert_eq!(cache.get("new").as_deref(), Some("b"));
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_periodic_sweep_on_write() {
        let temp_dir = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let cache = cache_with_clock(temp_dir.path(), clock.clone()).with_sweep_every(3);

        cache.set("a", "1").unwrap();
        cache.set("b", "2").unwrap();
        clock.advance(8 * DAY);
        assert!(temp_dir.path().join("a.msgpack").exists());

        cache.set("c", "3").unwrap();
        assert!(!temp_dir.path().join("a.msgpack").exists());
        assert!(!temp_dir.path().join("b.msgpack").exists());
        assert!(temp_dir.path().join("c.msgpack").exists());
    }

    #[test]
    fn test_remove_and_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = OcrCache::new(temp_dir.path(), WEEK).unwrap();
        cache.set("a", "1").unwrap();
        cache.set("b", "2").unwrap();

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.clear().unwrap(), 1);
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn test_cache_stats() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = OcrCache::new(temp_dir.path(), WEEK).unwrap();
        assert_eq!(cache.stats().unwrap().total_files, 0);

        cache.set("test", "Test").unwrap();
        let stats = cache.stats().unwrap();
        assert_eq!(stats.total_files, 1);
        assert!(stats.total_size_mb > 0.0);
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let cache = OcrCache::new(temp_dir.path(), WEEK).unwrap();
        assert!(cache.set("../escape", "x").is_err());
        assert_eq!(cache.get("../escape"), None);
        assert!(!is_valid_key(""));
    }

    #[test]
    fn test_from_config_creates_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path().join("nested").join("ocr");
        let config = CacheConfig {
            dir: Some(dir.clone()),
            ..Default::default()
        };
        let cache = OcrCache::from_config(&config).unwrap();
        assert!(dir.is_dir());
        assert_eq!(cache.ttl(), WEEK);
    }
}
