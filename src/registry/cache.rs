//! File-based cache for release metadata.
//!
//! Metadata of a pinned release does not change, so responses are cached
//! per `(package, version)` to avoid repeated network calls. Cache is stored
//! in ~/.cache/pyreach/metadata/

use super::PackageMetadata;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// In-memory + file-based cache for metadata responses.
pub struct MetadataCache {
    /// In-memory cache for current session
    memory: RwLock<HashMap<String, CacheEntry>>,
    /// Path to cache directory
    cache_dir: Option<PathBuf>,
    /// TTL in hours; 0 disables caching
    ttl_hours: u32,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    metadata: PackageMetadata,
    timestamp: u64, // Unix timestamp in seconds
}

impl MetadataCache {
    /// Create a cache in the user cache directory with the given TTL.
    pub fn new(ttl_hours: u32) -> Self {
        let cache_dir =
            ProjectDirs::from("", "", "pyreach").map(|dirs| dirs.cache_dir().join("metadata"));
        Self::with_dir(cache_dir, ttl_hours)
    }

    /// Create a cache backed by `dir`, or memory only when `dir` is `None`.
    pub fn with_dir(cache_dir: Option<PathBuf>, ttl_hours: u32) -> Self {
        if let Some(ref dir) = cache_dir {
            if let Err(e) = fs::create_dir_all(dir) {
                log::debug!("cannot create cache dir {}: {}", dir.display(), e);
            }
        }

        Self {
            memory: RwLock::new(HashMap::new()),
            cache_dir,
            ttl_hours,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    fn cache_key(package: &str, version: &str) -> String {
        format!("{}=={}", package, version)
    }

    /// Get a cached response if it exists and is not expired.
    pub fn get(&self, package: &str, version: &str) -> Option<PackageMetadata> {
        if self.ttl_hours == 0 {
            return None;
        }
        let key = Self::cache_key(package, version);
        let found = self.lookup(&key);
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    fn lookup(&self, key: &str) -> Option<PackageMetadata> {
        let now = current_timestamp();
        let ttl_secs = (self.ttl_hours as u64) * 3600;

        {
            let cache = self.memory.read().ok()?;
            if let Some(entry) = cache.get(key) {
                if now.saturating_sub(entry.timestamp) < ttl_secs {
                    return Some(entry.metadata.clone());
                }
            }
        }

        let entry = self.read_file_cache(key)?;
        if now.saturating_sub(entry.timestamp) >= ttl_secs {
            return None;
        }
        let metadata = entry.metadata.clone();
        // Promote to memory cache
        if let Ok(mut cache) = self.memory.write() {
            cache.insert(key.to_string(), entry);
        }
        Some(metadata)
    }

    /// Store a response in the cache.
    pub fn set(&self, package: &str, version: &str, metadata: &PackageMetadata) {
        if self.ttl_hours == 0 {
            return;
        }
        let key = Self::cache_key(package, version);
        let entry = CacheEntry {
            metadata: metadata.clone(),
            timestamp: current_timestamp(),
        };

        self.write_file_cache(&key, &entry);
        if let Ok(mut cache) = self.memory.write() {
            cache.insert(key, entry);
        }
    }

    /// Cache hits and misses so far.
    pub fn stats(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    fn read_file_cache(&self, key: &str) -> Option<CacheEntry> {
        let path = self.cache_file_path(key)?;
        let content = fs::read_to_string(path).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn write_file_cache(&self, key: &str, entry: &CacheEntry) {
        let Some(path) = self.cache_file_path(key) else {
            return;
        };
        match serde_json::to_string(entry) {
            Ok(content) => {
                if let Err(e) = fs::write(&path, content) {
                    log::debug!("cannot write cache file {}: {}", path.display(), e);
                }
            }
            Err(e) => log::debug!("cannot encode cache entry {}: {}", key, e),
        }
    }

    fn cache_file_path(&self, key: &str) -> Option<PathBuf> {
        self.cache_dir.as_ref().map(|dir| {
            let filename = key.replace(['=', '/', ':'], "_");
            dir.join(format!("{}.json", filename))
        })
    }
}

/// Get current Unix timestamp in seconds.
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}
