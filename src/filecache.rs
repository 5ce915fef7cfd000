//! In-memory memoization of per-file computations.
//!
//! An entry remembers when its value was read. It is served as long as the
//! file's modification time is not newer than that instant; otherwise the
//! loader runs again. Entries are never evicted individually, only flushed
//! all at once.

use anyhow::Result;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub file: PathBuf,
    pub read_ts: SystemTime,
    pub value: V,
}

#[derive(Debug)]
pub struct FileCache<V> {
    name: &'static str,
    entries: HashMap<PathBuf, CacheEntry<V>>,
}

impl<V> FileCache<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached value for `path`, running `loader` when there is no
    /// entry yet, the file changed after it was read, or the file is gone.
    /// Loader errors are returned as-is and leave no entry behind.
    pub fn get_or_load<F>(&mut self, path: &Path, loader: F) -> Result<&V>
    where
        F: FnOnce(&Path) -> Result<V>,
    {
        let key = absolute(path);
        let mtime = modified(&key);

        let fresh = match (self.entries.get(&key), mtime) {
            (Some(entry), Some(mtime)) => mtime <= entry.read_ts,
            _ => false,
        };
        if fresh {
            debug!(cache = self.name, path = %key.display(), "cache hit");
            return Ok(&self.entries[&key].value);
        }

        if self.entries.contains_key(&key) {
            debug!(cache = self.name, path = %key.display(), "cache entry stale, reloading");
        } else {
            debug!(cache = self.name, path = %key.display(), "cache miss");
        }

        let read_ts = SystemTime::now();
        let value = match loader(&key) {
            Ok(value) => value,
            Err(e) => {
                self.entries.remove(&key);
                return Err(e);
            }
        };

        let entry = CacheEntry {
            file: key.clone(),
            read_ts,
            value,
        };
        let slot = match self.entries.entry(key) {
            Entry::Occupied(mut o) => {
                o.insert(entry);
                o.into_mut()
            }
            Entry::Vacant(v) => v.insert(entry),
        };
        Ok(&slot.value)
    }

    pub fn entry(&self, path: &Path) -> Option<&CacheEntry<V>> {
        self.entries.get(&absolute(path))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn flush(&mut self) {
        debug!(cache = self.name, entries = self.entries.len(), "flushing cache");
        self.entries.clear();
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

pub(crate) fn modified(path: &Path) -> Option<SystemTime> {
    path.metadata().and_then(|m| m.modified()).ok()
}
