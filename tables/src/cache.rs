//! Process-wide table cache.
//!
//! Table files are treated as immutable for the lifetime of the process, so
//! entries are never invalidated. Callers opt in per load.

use crate::TableType;
use crate::tables::TableFile;
use anyhow::Result;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tracing::debug;

static DISK_READS: AtomicUsize = AtomicUsize::new(0);

type Cache = Mutex<FxHashMap<PathBuf, Arc<TableFile>>>;

fn cache() -> MutexGuard<'static, FxHashMap<PathBuf, Arc<TableFile>>> {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE
        .get_or_init(|| Mutex::new(FxHashMap::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Number of table files actually read from disk by this process.
pub fn disk_reads() -> usize {
    DISK_READS.load(Ordering::Relaxed)
}

pub(crate) fn record_disk_read() {
    DISK_READS.fetch_add(1, Ordering::Relaxed);
}

pub fn cached<P: AsRef<Path>>(path: P) -> Option<Arc<TableFile>> {
    cache().get(path.as_ref()).cloned()
}

/// Read `path`, going through the cache when `use_cache` is set.
pub fn load<P: AsRef<Path>>(path: P, table_type: TableType, use_cache: bool) -> Result<Arc<TableFile>> {
    let path = path.as_ref();

    if use_cache {
        if let Some(table) = cached(path) {
            debug!(path = %path.display(), "table cache hit");
            return Ok(table);
        }
    }

    let table = Arc::new(TableFile::read(path, table_type)?);
    debug!(path = %path.display(), lines = table.len(), "loaded {}", table_type);

    if use_cache {
        cache().insert(path.to_path_buf(), table.clone());
    }
    Ok(table)
}
