// src/fs/cache.rs

//! Scoped memoization of filesystem metadata queries.
//!
//! An up-to-date pass over a large graph asks the same questions about the
//! same ancestor files over and over. [`FsQueryCache::activate`] hands out a
//! [`CacheRegion`] that answers each distinct query once and replays the
//! answer afterwards. The table lives exactly as long as the region: once it
//! is dropped (normal exit, `?`, or unwind) every caller sees live results
//! again.
//!
//! Only one region may be active in the process at a time. A second
//! activation blocks until the first region is dropped, so a region must
//! never be activated while the same thread already holds one.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::debug;

use super::{FileStat, FileSystem};

static ACTIVE: Mutex<bool> = Mutex::new(false);
static RELEASED: Condvar = Condvar::new();

fn lock_active() -> MutexGuard<'static, bool> {
    ACTIVE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Entry point for creating cache regions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsQueryCache;

impl FsQueryCache {
    /// Start a caching region over `inner`.
    pub fn activate(inner: &dyn FileSystem) -> CacheRegion<'_> {
        let mut active = lock_active();
        while *active {
            active = RELEASED
                .wait(active)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
        *active = true;
        debug!("filesystem query cache activated");

        CacheRegion {
            inner,
            entries: Mutex::new(HashMap::new()),
            stats: Mutex::new(CacheStats::default()),
        }
    }

    /// Whether some region is currently active.
    pub fn is_active() -> bool {
        *lock_active()
    }
}

/// Identity of a memoized query: which query, with which arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum QueryKey {
    Stat(PathBuf),
    Absolute(PathBuf),
    Canonical(PathBuf),
    Relative(PathBuf, PathBuf),
    IsSymlink(PathBuf),
}

/// `io::Error` is not `Clone`; keep enough of it to rebuild an equivalent one.
#[derive(Debug, Clone)]
struct CachedError {
    kind: io::ErrorKind,
    message: String,
}

impl From<&io::Error> for CachedError {
    fn from(err: &io::Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<&CachedError> for io::Error {
    fn from(err: &CachedError) -> Self {
        io::Error::new(err.kind, err.message.clone())
    }
}

#[derive(Debug, Clone)]
enum CachedValue {
    Stat(Result<FileStat, CachedError>),
    Path(Result<PathBuf, CachedError>),
    Flag(bool),
}

/// Hit/miss counters for one region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// An active caching region. Implements [`FileSystem`] by delegating misses
/// to the wrapped filesystem and replaying hits from its table.
#[derive(Debug)]
pub struct CacheRegion<'a> {
    inner: &'a dyn FileSystem,
    entries: Mutex<HashMap<QueryKey, CachedValue>>,
    stats: Mutex<CacheStats>,
}

impl CacheRegion<'_> {
    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lookup(&self, key: &QueryKey) -> Option<CachedValue> {
        let found = self
            .entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .cloned();
        let mut stats = self.stats.lock().unwrap_or_else(|p| p.into_inner());
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    fn store(&self, key: QueryKey, value: CachedValue) {
        self.entries
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(key, value);
    }

    fn cached_path(
        &self,
        key: QueryKey,
        compute: impl FnOnce() -> io::Result<PathBuf>,
    ) -> io::Result<PathBuf> {
        if let Some(CachedValue::Path(value)) = self.lookup(&key) {
            return value.map_err(|e| io::Error::from(&e));
        }
        let result = compute();
        let stored = match &result {
            Ok(path) => Ok(path.clone()),
            Err(e) => Err(CachedError::from(e)),
        };
        self.store(key, CachedValue::Path(stored));
        result
    }
}

impl FileSystem for CacheRegion<'_> {
    fn stat(&self, path: &Path) -> io::Result<FileStat> {
        let key = QueryKey::Stat(path.to_path_buf());
        if let Some(CachedValue::Stat(value)) = self.lookup(&key) {
            return value.map_err(|e| io::Error::from(&e));
        }
        let result = self.inner.stat(path);
        let stored = match &result {
            Ok(stat) => Ok(*stat),
            Err(e) => Err(CachedError::from(e)),
        };
        self.store(key, CachedValue::Stat(stored));
        result
    }

    fn absolute(&self, path: &Path) -> io::Result<PathBuf> {
        self.cached_path(QueryKey::Absolute(path.to_path_buf()), || {
            self.inner.absolute(path)
        })
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        self.cached_path(QueryKey::Canonical(path.to_path_buf()), || {
            self.inner.canonicalize(path)
        })
    }

    fn relative(&self, path: &Path, base: &Path) -> io::Result<PathBuf> {
        self.cached_path(
            QueryKey::Relative(path.to_path_buf(), base.to_path_buf()),
            || self.inner.relative(path, base),
        )
    }

    fn is_symlink(&self, path: &Path) -> bool {
        let key = QueryKey::IsSymlink(path.to_path_buf());
        if let Some(CachedValue::Flag(value)) = self.lookup(&key) {
            return value;
        }
        let value = self.inner.is_symlink(path);
        self.store(key, CachedValue::Flag(value));
        value
    }
}

impl Drop for CacheRegion<'_> {
    fn drop(&mut self) {
        let stats = self.stats();
        self.entries
            .get_mut()
            .unwrap_or_else(|p| p.into_inner())
            .clear();

        let mut active = lock_active();
        *active = false;
        RELEASED.notify_one();

        debug!(
            hits = stats.hits,
            misses = stats.misses,
            "filesystem query cache released"
        );
    }
}
