//! On-disk cache for Flickr API responses.
//!
//! A site build expands the same gallery tags on every run, and each tag costs
//! at least three REST round-trips (user lookup, photoset list, photo list).
//! When a cache directory is configured, [`FlickrClient`](crate::flickr::FlickrClient)
//! stores every successful response body here and serves repeat requests
//! without touching the network.
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: each response is stored as
//! `<cache_dir>/<key>.json` where `key` is the SHA-256 of the request
//! parameters. Parameters are sorted by name before hashing, so the key does
//! not depend on the order the client happens to add them. The API key is
//! left out of the hash so rotating credentials does not bust the cache.
//!
//! A [`CACHE_VERSION`] prefix is hashed in as well. Bump it to orphan all
//! existing entries when the response handling changes.
//!
//! ## Invalidation
//!
//! There is none beyond the version prefix: photosets change rarely and a
//! stale gallery is fixed by deleting the directory or passing `--no-cache`.
//! Unreadable or non-JSON entries are treated as misses and overwritten.

use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Version of the cache key scheme.
const CACHE_VERSION: u32 = 1;

/// Parameters never included in the cache key.
const UNKEYED_PARAMS: &[&str] = &["api_key"];

/// A directory of cached response bodies.
#[derive(Debug)]
pub struct ResponseCache {
    dir: PathBuf,
    stats: CacheStats,
}

impl ResponseCache {
    /// Open (and create if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            stats: CacheStats::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the cached body for `key`, if present and valid JSON.
    pub fn get(&self, key: &str) -> Option<String> {
        let body = std::fs::read_to_string(self.entry_path(key)).ok();
        match body.filter(|b| serde_json::from_str::<serde_json::Value>(b).is_ok()) {
            Some(body) => {
                self.stats.hit();
                Some(body)
            }
            None => {
                self.stats.miss();
                None
            }
        }
    }

    /// Store a response body under `key`.
    pub fn put(&self, key: &str, body: &str) -> io::Result<()> {
        std::fs::write(self.entry_path(key), body)
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

/// SHA-256 cache key of a request's parameters, returned as a hex string.
pub fn request_key(params: &[(&str, &str)]) -> String {
    let mut sorted: Vec<&(&str, &str)> = params
        .iter()
        .filter(|(name, _)| !UNKEYED_PARAMS.contains(name))
        .collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    hasher.update(CACHE_VERSION.to_le_bytes());
    for (name, value) in sorted {
        hasher.update(name.as_bytes());
        hasher.update(b"\0");
        hasher.update(value.as_bytes());
        hasher.update(b"\0");
    }
    format!("{:x}", hasher.finalize())
}

/// Hit/miss counters for one run.
///
/// Counters use `Cell` because lookups go through shared references; the
/// client is single-threaded.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: Cell<u32>,
    misses: Cell<u32>,
}

impl CacheStats {
    pub fn hit(&self) {
        self.hits.set(self.hits.get() + 1);
    }

    pub fn miss(&self) {
        self.misses.set(self.misses.get() + 1);
    }

    pub fn hits(&self) -> u32 {
        self.hits.get()
    }

    pub fn misses(&self) -> u32 {
        self.misses.get()
    }

    pub fn total(&self) -> u32 {
        self.hits() + self.misses()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits() > 0 {
            write!(
                f,
                "{} cached, {} fetched ({} total)",
                self.hits(),
                self.misses(),
                self.total()
            )
        } else {
            write!(f, "{} fetched", self.misses())
        }
    }
}
