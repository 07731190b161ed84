//! Persisted cache for values fetched from external services.
//!
//! The cache is loaded once at startup, shared by every render task, and
//! written once at the end of a build. Entries never expire within a
//! process: a key that has been resolved is not fetched again.
//!
//! ```json
//! {
//!   "github:owner/repo/issues/12": { "value": "Fix typo", "fetched_at": 1700000000 }
//! }
//! ```

pub mod github;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("failed to access lookup cache `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("lookup cache `{}` is not valid JSON", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {url}: {reason}")]
    Response { url: String, reason: String },
}

/// Something that can retrieve a document by URL.
///
/// Implemented over HTTP by [`github::HttpFetch`]; tests substitute fakes.
pub trait Fetch: Sync {
    fn fetch(&self, url: &str) -> Result<String, LookupError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: String,
    /// Unix timestamp of the fetch.
    pub fetched_at: i64,
}

/// Thread-safe key/value cache backed by a JSON file.
#[derive(Debug)]
pub struct LookupCache {
    path: PathBuf,
    entries: RwLock<FxHashMap<String, CacheEntry>>,
}

impl LookupCache {
    /// Empty cache that will be written to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(FxHashMap::default()),
        }
    }

    /// Load the cache at `path`. A missing file yields an empty cache.
    pub fn load(path: &Path) -> Result<Self, LookupError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::new(path)),
            Err(source) => {
                return Err(LookupError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let entries: FxHashMap<String, CacheEntry> =
            serde_json::from_str(&content).map_err(|source| LookupError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).map(|entry| entry.value.clone())
    }

    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) {
        let entry = CacheEntry {
            value: value.into(),
            fetched_at: chrono::Utc::now().timestamp(),
        };
        self.entries.write().insert(key.into(), entry);
    }

    /// Cached value for `key`, or the result of `fetch` (stored on success).
    ///
    /// The lock is not held while fetching, so two tasks racing on the same
    /// key may both fetch; the later write wins.
    pub fn get_or_fetch<F>(&self, key: &str, fetch: F) -> Result<String, LookupError>
    where
        F: FnOnce() -> Result<String, LookupError>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch()?;
        self.put(key, value.clone());
        Ok(value)
    }

    /// Write all entries as JSON, replacing the file through a rename.
    pub fn write(&self) -> Result<(), LookupError> {
        let io_err = |source| LookupError::Io {
            path: self.path.clone(),
            source,
        };

        // Sorted for stable diffs
        let json = {
            let entries = self.entries.read();
            let sorted: BTreeMap<&String, &CacheEntry> = entries.iter().collect();
            serde_json::to_string_pretty(&sorted).map_err(|source| LookupError::Corrupt {
                path: self.path.clone(),
                source,
            })?
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = LookupCache::load(&dir.path().join("absent.json")).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();

        let err = LookupCache::load(&path).unwrap_err();
        assert!(matches!(err, LookupError::Corrupt { .. }));
    }

    #[test]
    fn test_put_get() {
        let cache = LookupCache::new("unused.json");
        assert_eq!(cache.get("k"), None);
        cache.put("k", "v");
        assert_eq!(cache.get("k").as_deref(), Some("v"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_or_fetch_fetches_once() {
        let cache = LookupCache::new("unused.json");
        let calls = AtomicUsize::new(0);
        let fetch = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("title".to_string())
        };

        assert_eq!(cache.get_or_fetch("issue:1", fetch).unwrap(), "title");
        assert_eq!(cache.get_or_fetch("issue:1", fetch).unwrap(), "title");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_get_or_fetch_error_is_not_cached() {
        let cache = LookupCache::new("unused.json");
        let result = cache.get_or_fetch("k", || {
            Err(LookupError::Response {
                url: "http://x".into(),
                reason: "missing title".into(),
            })
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/cache.json");

        let cache = LookupCache::new(&path);
        cache.put("b", "second");
        cache.put("a", "first");
        cache.write().unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        let loaded = LookupCache::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get("a").as_deref(), Some("first"));

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn test_concurrent_puts() {
        use rayon::prelude::*;

        let cache = LookupCache::new("unused.json");
        (0..64).into_par_iter().for_each(|i| {
            cache.put(format!("k{i}"), i.to_string());
        });
        assert_eq!(cache.len(), 64);
        assert_eq!(cache.get("k63").as_deref(), Some("63"));
    }
}
