//! Content-addressable asset cache

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use squish_core::Buffer;
use tokio::fs;
use tracing::{debug, info};

use crate::reporter::{PipelineEvent, PipelineReporter};

/// Suffix of in-progress entry writes
const TEMP_SUFFIX: &str = ".tmp";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Cache key: hex SHA-1 of the original asset content
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for a content buffer
    pub fn for_content(content: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(content);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cache errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// IO error
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistent key/value surface addressed by content digest.
///
/// Entries are immutable: `write` for a key that already exists must leave
/// the stored bytes unchanged.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether an entry exists for `key`
    async fn exists(&self, key: &CacheKey) -> bool;

    /// Read an entry, `None` when it does not exist
    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store an entry if absent
    async fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError>;
}

/// Directory-backed store, one file per digest
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    cache_dir: PathBuf,
}

impl FsCacheStore {
    /// Create a store rooted at `cache_dir`; the directory is created on first write
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Get the cache directory
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.as_str())
    }

    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.cache_dir
            .join(format!("{}.{}.{}{}", key, std::process::id(), n, TEMP_SUFFIX))
    }

    /// Remove entries not modified within `max_age`
    pub fn prune(&self, max_age: Duration) -> Result<PruneStats, CacheError> {
        info!(max_age_secs = max_age.as_secs(), "pruning cache");
        let mut stats = PruneStats::default();

        if !self.cache_dir.exists() {
            return Ok(stats);
        }

        let cutoff = SystemTime::now()
            .checked_sub(max_age)
            .unwrap_or(SystemTime::UNIX_EPOCH);

        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            stats.total += 1;

            let modified = entry.metadata().and_then(|m| m.modified());
            if let Ok(modified) = modified {
                if modified <= cutoff && std::fs::remove_file(&path).is_ok() {
                    stats.removed += 1;
                    continue;
                }
            }

            stats.kept += 1;
        }

        info!(total = stats.total, removed = stats.removed, kept = stats.kept, "cache prune complete");
        Ok(stats)
    }

    /// Get cache statistics
    pub fn status(&self) -> Result<CacheStats, CacheError> {
        let mut stats = CacheStats::default();

        if !self.cache_dir.exists() {
            return Ok(stats);
        }

        for entry in std::fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;

            if !meta.is_file() || entry.file_name().to_string_lossy().ends_with(TEMP_SUFFIX) {
                continue;
            }

            stats.entries += 1;
            stats.total_size += meta.len();
        }

        Ok(stats)
    }

    /// Remove the cache directory and everything in it
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.cache_dir.exists() {
            info!(dir = %self.cache_dir.display(), "clearing cache");
            std::fs::remove_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for FsCacheStore {
    async fn exists(&self, key: &CacheKey) -> bool {
        fs::metadata(self.entry_path(key))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        match fs::read(self.entry_path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let path = self.entry_path(key);
        if self.exists(key).await {
            debug!(key = %key, "cache entry already present");
            return Ok(());
        }

        fs::create_dir_all(&self.cache_dir).await?;

        // Readers only ever see complete entries: write aside, then rename in.
        let temp = self.temp_path(key);
        fs::write(&temp, bytes).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(key = %key, size = bytes.len(), "stored cache entry");
        Ok(())
    }
}

/// In-process store, useful for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryCacheStore {
    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get a copy of an entry
    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn exists(&self, key: &CacheKey) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }

    async fn read(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.get(key))
    }

    async fn write(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| std::io::Error::other("memory cache lock poisoned"))?;
        entries
            .entry(key.clone())
            .or_insert_with(|| bytes.to_vec());
        Ok(())
    }
}

/// Best-effort memoizing cache in front of a transform.
///
/// Concurrent misses on the same content may compute twice; both writes
/// target the same key with the same bytes.
#[derive(Clone)]
pub struct AssetCache {
    store: Option<Arc<dyn CacheStore>>,
    reporter: Arc<dyn PipelineReporter>,
}

impl AssetCache {
    /// Cache that always computes
    pub fn disabled(reporter: Arc<dyn PipelineReporter>) -> Self {
        Self {
            store: None,
            reporter,
        }
    }

    /// Cache backed by a store
    pub fn new(store: Arc<dyn CacheStore>, reporter: Arc<dyn PipelineReporter>) -> Self {
        Self {
            store: Some(store),
            reporter,
        }
    }

    /// Cache backed by a directory, or disabled when `cache_dir` is `None`
    pub fn from_dir(cache_dir: Option<&Path>, reporter: Arc<dyn PipelineReporter>) -> Self {
        match cache_dir {
            Some(dir) => Self::new(Arc::new(FsCacheStore::new(dir)), reporter),
            None => Self::disabled(reporter),
        }
    }

    /// Whether a store is configured
    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// Return the cached result for `content`, or run `compute` and store its result.
    ///
    /// Store failures never surface: a failed read falls through to
    /// `compute`, a failed write is reported and the computed buffer is
    /// still returned.
    pub async fn fetch_or_compute<F, Fut>(&self, name: &str, content: &[u8], compute: F) -> Buffer
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Buffer>,
    {
        let Some(store) = &self.store else {
            return compute().await;
        };

        let key = CacheKey::for_content(content);

        if store.exists(&key).await {
            match store.read(&key).await {
                Ok(Some(bytes)) => {
                    self.reporter.report(&PipelineEvent::CacheHit {
                        name: name.to_string(),
                        key,
                    });
                    return Buffer::from(bytes);
                }
                Ok(None) => {}
                Err(e) => {
                    self.reporter.report(&PipelineEvent::CacheReadFailed {
                        name: name.to_string(),
                        key: key.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.reporter.report(&PipelineEvent::CacheMiss {
            name: name.to_string(),
            key: key.clone(),
        });

        let result = compute().await;

        if let Err(e) = store.write(&key, &result).await {
            self.reporter.report(&PipelineEvent::CacheWriteFailed {
                name: name.to_string(),
                key,
                error: e.to_string(),
            });
        }

        result
    }
}

impl fmt::Debug for AssetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetCache")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Statistics from a prune operation
#[derive(Debug, Default)]
pub struct PruneStats {
    /// Total entries found
    pub total: usize,
    /// Entries removed
    pub removed: usize,
    /// Entries kept
    pub kept: usize,
}

/// Cache statistics
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Number of cache entries
    pub entries: usize,
    /// Total size in bytes
    pub total_size: u64,
}

impl CacheStats {
    /// Format total size in human-readable form
    pub fn formatted_size(&self) -> String {
        format_size(self.total_size)
    }
}

/// Format a byte count in human-readable form
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    fn counting_compute(
        calls: &Arc<AtomicUsize>,
        output: &'static [u8],
    ) -> impl FnOnce() -> std::future::Ready<Buffer> {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Buffer::from(output))
        }
    }

    /// Store whose entries always exist but never read or write
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn exists(&self, _key: &CacheKey) -> bool {
            true
        }

        async fn read(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
            Err(std::io::Error::other("disk on fire").into())
        }

        async fn write(&self, _key: &CacheKey, _bytes: &[u8]) -> Result<(), CacheError> {
            Err(std::io::Error::other("read-only filesystem").into())
        }
    }

    #[test]
    fn test_cache_key_is_sha1_hex() {
        let key = CacheKey::for_content(b"abc");
        assert_eq!(key.as_str(), "a9993e364706816aba3e25717850c26c9cd0d89d");
        assert_eq!(key.to_string().len(), 40);
    }

    #[test]
    fn test_cache_key_differs_on_content() {
        assert_ne!(
            CacheKey::for_content(b"image-a"),
            CacheKey::for_content(b"image-b")
        );
        assert_eq!(
            CacheKey::for_content(b"image-a"),
            CacheKey::for_content(b"image-a")
        );
    }

    #[tokio::test]
    async fn test_computes_once_then_hits() {
        let temp = TempDir::new().unwrap();
        let reporter = Arc::new(CollectingReporter::default());
        let cache = AssetCache::from_dir(Some(&temp.path().join("cache")), reporter.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut results = Vec::new();
        for _ in 0..3 {
            results.push(
                cache
                    .fetch_or_compute("a.png", b"original", counting_compute(&calls, b"small"))
                    .await,
            );
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| &r[..] == b"small"));
        assert_eq!(
            reporter.count(|e| matches!(e, PipelineEvent::CacheHit { .. })),
            2
        );

        let entry = temp
            .path()
            .join("cache")
            .join(CacheKey::for_content(b"original").as_str());
        assert_eq!(std::fs::read(entry).unwrap(), b"small");
    }

    #[tokio::test]
    async fn test_distinct_content_gets_distinct_entries() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::new(temp.path().join("cache"));
        let cache = AssetCache::new(
            Arc::new(store.clone()),
            Arc::new(CollectingReporter::default()),
        );
        let calls = Arc::new(AtomicUsize::new(0));

        let a = cache
            .fetch_or_compute("a.png", b"content-a", counting_compute(&calls, b"out-a"))
            .await;
        let b = cache
            .fetch_or_compute("b.png", b"content-b", counting_compute(&calls, b"out-b"))
            .await;

        assert_eq!(&a[..], b"out-a");
        assert_eq!(&b[..], b"out-b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.status().unwrap().entries, 2);
        assert_eq!(
            store.read(&CacheKey::for_content(b"content-a")).await.unwrap(),
            Some(b"out-a".to_vec())
        );
    }

    #[tokio::test]
    async fn test_disabled_cache_always_computes() {
        let reporter = Arc::new(CollectingReporter::default());
        let cache = AssetCache::disabled(reporter.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let result = cache
                .fetch_or_compute("a.png", b"same", counting_compute(&calls, b"out"))
                .await;
            assert_eq!(&result[..], b"out");
        }

        assert!(!cache.is_enabled());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(reporter.events().is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_to_compute() {
        let reporter = Arc::new(CollectingReporter::default());
        let cache = AssetCache::new(Arc::new(BrokenStore), reporter.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let result = cache
            .fetch_or_compute("a.png", b"x", counting_compute(&calls, b"computed"))
            .await;

        assert_eq!(&result[..], b"computed");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            reporter.count(|e| matches!(e, PipelineEvent::CacheReadFailed { .. })),
            1
        );
        assert_eq!(
            reporter.count(|e| matches!(e, PipelineEvent::CacheWriteFailed { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_entry_removed_between_check_and_read_is_a_miss() {
        struct VanishingStore;

        #[async_trait]
        impl CacheStore for VanishingStore {
            async fn exists(&self, _key: &CacheKey) -> bool {
                true
            }
            async fn read(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
                Ok(None)
            }
            async fn write(&self, _key: &CacheKey, _bytes: &[u8]) -> Result<(), CacheError> {
                Ok(())
            }
        }

        let reporter = Arc::new(CollectingReporter::default());
        let cache = AssetCache::new(Arc::new(VanishingStore), reporter.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        let result = cache
            .fetch_or_compute("a.png", b"x", counting_compute(&calls, b"fresh"))
            .await;

        assert_eq!(&result[..], b"fresh");
        assert_eq!(
            reporter.count(|e| matches!(e, PipelineEvent::CacheMiss { .. })),
            1
        );
    }

    #[tokio::test]
    async fn test_write_is_create_if_absent() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::new(temp.path().join("nested").join("cache"));
        let key = CacheKey::for_content(b"input");

        store.write(&key, b"first").await.unwrap();
        store.write(&key, b"second").await.unwrap();

        assert_eq!(store.read(&key).await.unwrap(), Some(b"first".to_vec()));
    }

    #[tokio::test]
    async fn test_concurrent_misses_leave_one_complete_entry() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::new(temp.path().join("cache"));
        let cache = AssetCache::new(
            Arc::new(store.clone()),
            Arc::new(CollectingReporter::default()),
        );

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .fetch_or_compute("a.png", b"shared", || async {
                        tokio::task::yield_now().await;
                        Buffer::from(vec![7u8; 4096])
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().len(), 4096);
        }

        let names: Vec<_> = std::fs::read_dir(store.cache_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![CacheKey::for_content(b"shared").to_string()]);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = Arc::new(MemoryCacheStore::default());
        let cache = AssetCache::new(store.clone(), Arc::new(CollectingReporter::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        cache
            .fetch_or_compute("a.png", b"a", counting_compute(&calls, b"A"))
            .await;
        cache
            .fetch_or_compute("a.png", b"a", counting_compute(&calls, b"A"))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&CacheKey::for_content(b"a")), Some(b"A".to_vec()));
    }

    #[tokio::test]
    async fn test_prune_and_clear() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::new(temp.path().join("cache"));
        store.write(&CacheKey::for_content(b"1"), b"one").await.unwrap();
        store.write(&CacheKey::for_content(b"2"), b"two").await.unwrap();

        let stats = store.prune(Duration::from_secs(24 * 60 * 60)).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.kept, 2);

        let stats = store.prune(Duration::ZERO).unwrap();
        assert_eq!(stats.removed, 2);
        assert_eq!(store.status().unwrap().entries, 0);

        store.clear().unwrap();
        assert!(!store.cache_dir().exists());
    }

    #[test]
    fn test_cache_status_missing_dir() {
        let temp = TempDir::new().unwrap();
        let store = FsCacheStore::new(temp.path().join("cache"));

        let stats = store.status().unwrap();
        assert_eq!(stats.entries, 0);
        assert_eq!(stats.total_size, 0);
    }

    #[test]
    fn test_cache_stats_formatted_size() {
        let stats = CacheStats {
            entries: 0,
            total_size: 1536,
        };
        assert_eq!(stats.formatted_size(), "1.5 KB");

        let stats = CacheStats {
            entries: 0,
            total_size: 500,
        };
        assert_eq!(stats.formatted_size(), "500 B");
    }
}
