//! Durable latest-snapshot store.
//!
//! The cache holds exactly one snapshot, pretty-printed JSON for
//! operability. Writes go to a temporary file in the same directory followed
//! by an atomic rename, so a concurrent reader sees either the previous
//! complete document or the new one, never a partial write.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use crate::snapshot::Snapshot;

/// Errors that can occur when writing the cache.
///
/// Reads never error: a missing or corrupt cache file reads as absent.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cache rename error: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Atomic single-snapshot file cache.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a cache file exists on disk (backs the ping endpoint).
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Replace the cached snapshot atomically.
    ///
    /// The temp file lives in the cache directory so the final rename stays
    /// on one filesystem and is atomic.
    pub fn write(&self, snapshot: &Snapshot) -> Result<(), CacheError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, snapshot)?;
        tmp.flush()?;
        tmp.persist(&self.path)?;
        Ok(())
    }

    /// Read the latest snapshot.
    ///
    /// Returns `None` both when no snapshot has been written yet and when
    /// the file cannot be parsed; callers treat either as "collector not
    /// running yet", which is distinct from any auth or routing failure.
    pub fn read(&self) -> Option<Snapshot> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Cache not readable");
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Cache not parsable");
                None
            }
        }
    }
}
