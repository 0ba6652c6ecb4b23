// src/cache.rs

//! Per-gene snapshots of [`RetrievalResult`].
//!
//! Entries never expire; delete them (or the whole directory) to force a
//! fresh retrieval. There is no schema version, so a format change also
//! means clearing the directory.

use crate::error::CacheError;
use crate::models::{GeneSymbol, RetrievalResult};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

pub const CACHE_FILE_SUFFIX: &str = "_protein_data.json";

pub trait RetrievalCache {
    /// `None` on a miss. Never touches the network.
    fn get(&self, gene: &GeneSymbol) -> Option<RetrievalResult>;

    /// Replace the whole entry for `gene`.
    fn put(&self, gene: &GeneSymbol, result: &RetrievalResult) -> Result<(), CacheError>;

    /// Returns whether an entry was removed.
    fn remove(&self, gene: &GeneSymbol) -> Result<bool, CacheError>;
}

/// One pretty-printed JSON file per gene under `root`.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the entry, so readers see either the old or the new snapshot.
/// Concurrent writers for the same gene race; the last rename wins.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    root: PathBuf,
}

impl JsonFileCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{gene}_protein_data.json` under the root. Bytes outside
    /// `[A-Za-z0-9._-]` are percent-encoded, so distinct symbols never share
    /// a file and no symbol can escape the root.
    pub fn entry_path(&self, gene: &GeneSymbol) -> PathBuf {
        let mut stem = String::with_capacity(gene.as_str().len());
        for byte in gene.as_str().bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'.' | b'_' | b'-') {
                stem.push(char::from(byte));
            } else {
                stem.push_str(&format!("%{:02X}", byte));
            }
        }
        self.root.join(format!("{}{}", stem, CACHE_FILE_SUFFIX))
    }

    /// Remove every entry under the root. Other files are left alone.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.root.clone(),
            source,
        };
        if !self.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.root).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            let is_entry = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.ends_with(CACHE_FILE_SUFFIX))
                .unwrap_or(false);
            if is_entry {
                fs::remove_file(&path).map_err(|source| CacheError::Io { path, source })?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

impl RetrievalCache for JsonFileCache {
    fn get(&self, gene: &GeneSymbol) -> Option<RetrievalResult> {
        let path = self.entry_path(gene);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read cache entry {}: {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(result) => {
                debug!("Cache hit for {} at {}", gene, path.display());
                Some(result)
            }
            Err(e) => {
                warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    fn put(&self, gene: &GeneSymbol, result: &RetrievalResult) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root).map_err(|source| CacheError::Io {
            path: self.root.clone(),
            source,
        })?;

        let json = serde_json::to_vec_pretty(result).map_err(|source| CacheError::Serialize {
            gene: gene.to_string(),
            source,
        })?;

        let path = self.entry_path(gene);
        let mut tmp = NamedTempFile::new_in(&self.root).map_err(|source| CacheError::Io {
            path: self.root.clone(),
            source,
        })?;
        tmp.write_all(&json).map_err(|source| CacheError::Io {
            path: tmp.path().to_path_buf(),
            source,
        })?;
        tmp.persist(&path).map_err(|e| CacheError::Io {
            path: path.clone(),
            source: e.error,
        })?;

        debug!("Cached {} at {}", gene, path.display());
        Ok(())
    }

    fn remove(&self, gene: &GeneSymbol) -> Result<bool, CacheError> {
        let path = self.entry_path(gene);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}

/// Process-local cache, mainly for tests and batch runs that should not
/// write to disk.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<GeneSymbol, RetrievalResult>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic while the lock was held cannot leave a half-written entry
    /// behind, so a poisoned map is still consistent.
    fn entries(&self) -> MutexGuard<'_, HashMap<GeneSymbol, RetrievalResult>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RetrievalCache for MemoryCache {
    fn get(&self, gene: &GeneSymbol) -> Option<RetrievalResult> {
        self.entries().get(gene).cloned()
    }

    fn put(&self, gene: &GeneSymbol, result: &RetrievalResult) -> Result<(), CacheError> {
        self.entries().insert(gene.clone(), result.clone());
        Ok(())
    }

    fn remove(&self, gene: &GeneSymbol) -> Result<bool, CacheError> {
        Ok(self.entries().remove(gene).is_some())
    }
}
