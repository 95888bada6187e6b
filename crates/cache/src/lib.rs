//! Fingerprint-addressed TTL cache for codescout
//!
//! This crate stores two kinds of payload under the same contract:
//! - raw upstream search pages, keyed by query + page + filters
//! - complete aggregated result sets, keyed by query + a `complete` marker
//!
//! The complete aggregate doubles as the hand-off between a search call and a later,
//! independent retrieval call.
//!
//! Design Principles:
//! - Lookups never fail: read and decode errors are logged and reported as misses
//! - Expiry is lazy: an expired entry is deleted by the read that discovers it
//! - Single node, best effort: no locking, last writer wins

mod backend;

pub use backend::{CacheBackend, FileBackend, MemoryBackend};

use chrono::{DateTime, Utc};
use error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Entries older than this are treated as absent
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// ============================================================================
// Fingerprint
// ============================================================================

/// Deterministic cache key: SHA-256 over the canonical JSON of the request parameters.
///
/// Parameters are kept in a sorted map before encoding, so the order in which fields
/// are added never changes the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn builder() -> FingerprintBuilder {
        FingerprintBuilder::default()
    }

    /// Wrap an already computed hex digest (e.g. a cache file stem)
    pub fn from_hex<S: Into<String>>(hex: S) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collects named request parameters for a [`Fingerprint`]
#[derive(Debug, Default, Clone)]
pub struct FingerprintBuilder {
    params: BTreeMap<String, serde_json::Value>,
}

impl FingerprintBuilder {
    pub fn field<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn build(&self) -> Fingerprint {
        // A BTreeMap of JSON values always encodes; the fallback only keeps this total.
        let canonical = serde_json::to_vec(&self.params).unwrap_or_default();
        let digest = Sha256::digest(&canonical);
        Fingerprint(hex::encode(digest))
    }
}

// ============================================================================
// Cache Entry
// ============================================================================

/// A cached payload with its creation time and originating query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub query: String,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, query: impl Into<String>) -> Self {
        Self {
            data,
            timestamp: Utc::now(),
            query: query.into(),
        }
    }

    /// Check if the entry is older than `ttl` as of `now`
    pub fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        older_than(self.timestamp, ttl, now)
    }
}

// Entries stamped in the future are never expired.
fn older_than(timestamp: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    (now - timestamp)
        .to_std()
        .map(|age| age > ttl)
        .unwrap_or(false)
}

/// Entry metadata without the payload
#[derive(Debug, Deserialize)]
struct EntryHeader {
    timestamp: DateTime<Utc>,
    query: String,
}

impl EntryHeader {
    fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        older_than(self.timestamp, ttl, now)
    }
}

// ============================================================================
// Cache
// ============================================================================

/// Typed TTL cache over a [`CacheBackend`]
pub struct Cache {
    backend: Box<dyn CacheBackend>,
    ttl: Duration,
}

impl Cache {
    pub fn new(backend: impl CacheBackend + 'static) -> Self {
        Self::with_ttl(backend, DEFAULT_TTL)
    }

    pub fn with_ttl(backend: impl CacheBackend + 'static, ttl: Duration) -> Self {
        Self {
            backend: Box::new(backend),
            ttl,
        }
    }

    /// Disk cache rooted at `dir`
    pub fn on_disk<P: AsRef<std::path::Path>>(dir: P, ttl: Duration) -> Self {
        Self::with_ttl(FileBackend::new(dir), ttl)
    }

    /// Ephemeral in-memory cache
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a payload; any failure is a miss
    pub fn get<T: DeserializeOwned>(&self, key: &Fingerprint) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    /// [`Cache::get`] evaluated against an explicit clock
    pub fn get_at<T: DeserializeOwned>(&self, key: &Fingerprint, now: DateTime<Utc>) -> Option<T> {
        let bytes = match self.backend.read(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to read cache entry");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, error = %e, "failed to decode cache entry");
                return None;
            }
        };

        if entry.is_expired_at(self.ttl, now) {
            info!(key = %key, "cache expired");
            if let Err(e) = self.backend.remove(key) {
                warn!(key = %key, error = %e, "failed to remove expired cache entry");
            }
            return None;
        }

        debug!(key = %key, "cache hit");
        Some(entry.data)
    }

    /// Store `data` under `key`, overwriting any previous entry
    pub fn put<T: Serialize>(&self, key: &Fingerprint, data: &T, query: &str) -> Result<()> {
        let entry = CacheEntry::new(data, query);
        let bytes = serde_json::to_vec(&entry)?;
        self.backend.write(key, &bytes)
    }

    /// All live fingerprints whose entry originated from `query`
    pub fn find_by_query(&self, query: &str) -> Result<Vec<Fingerprint>> {
        let now = Utc::now();
        let mut found = Vec::new();

        for key in self.backend.keys()? {
            match self.header(&key) {
                Some(header) if header.query == query && !header.is_expired_at(self.ttl, now) => {
                    found.push(key)
                }
                _ => {}
            }
        }

        found.sort();
        Ok(found)
    }

    /// Delete every expired entry and return how many were removed.
    ///
    /// Normal operation never calls this; expiry is otherwise lazy.
    pub fn purge_expired(&self) -> Result<usize> {
        self.purge_expired_at(Utc::now())
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        for key in self.backend.keys()? {
            if let Some(header) = self.header(&key) {
                if header.is_expired_at(self.ttl, now) {
                    self.backend.remove(&key)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn header(&self, key: &Fingerprint) -> Option<EntryHeader> {
        let bytes = self.backend.read(key).ok().flatten()?;
        serde_json::from_slice(&bytes).ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
