//! Storage backends for the fingerprint-addressed cache

use crate::Fingerprint;
use error::{Result, ScoutError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Raw byte storage keyed by fingerprint.
///
/// Backends know nothing about entries or expiry; [`crate::Cache`] layers both on top.
pub trait CacheBackend: Send + Sync {
    /// Read the bytes stored under `key`, `None` if absent
    fn read(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>>;

    /// Store `bytes` under `key`, replacing any previous value
    fn write(&self, key: &Fingerprint, bytes: &[u8]) -> Result<()>;

    /// Remove the value under `key`; removing an absent key is not an error
    fn remove(&self, key: &Fingerprint) -> Result<()>;

    /// List every stored key
    fn keys(&self) -> Result<Vec<Fingerprint>>;
}

// ============================================================================
// File Backend
// ============================================================================

/// One `<fingerprint>.json` file per entry under a directory.
///
/// Writes are plain overwrites without locking or rename: a concurrent reader can
/// observe a partially written file. Such a read fails to deserialize and is treated
/// as a miss by [`crate::Cache`].
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// The directory is created lazily on first write
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &Fingerprint) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl CacheBackend for FileBackend {
    fn read(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.entry_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &Fingerprint, bytes: &[u8]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.entry_path(key), bytes)?;
        Ok(())
    }

    fn remove(&self, key: &Fingerprint) -> Result<()> {
        match std::fs::remove_file(self.entry_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> Result<Vec<Fingerprint>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(Fingerprint::from_hex(stem));
            }
        }

        Ok(keys)
    }
}

// ============================================================================
// Memory Backend
// ============================================================================

/// In-process backend, mostly for tests and ephemeral runs
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> ScoutError {
    ScoutError::cache("memory backend lock poisoned")
}

impl CacheBackend for MemoryBackend {
    fn read(&self, key: &Fingerprint) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key.as_str()).cloned())
    }

    fn write(&self, key: &Fingerprint, bytes: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.as_str().to_string(), bytes.to_vec());
        Ok(())
    }

    fn remove(&self, key: &Fingerprint) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.remove(key.as_str());
        Ok(())
    }

    fn keys(&self) -> Result<Vec<Fingerprint>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.keys().map(|k| Fingerprint::from_hex(k)).collect())
    }
}
