//! Last-known-good snapshot persistence.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::snapshot::ConfigSnapshot;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("snapshot cache I/O error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot cache at {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Persists the most recently applied snapshot so a cold start can serve it
/// when the service is unreachable.
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

    /// Load the cached snapshot, `Ok(None)` if nothing has been saved yet.
    pub fn load(&self) -> Result<Option<ConfigSnapshot>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path).map_err(|source| self.io(source))?;
        let snapshot: ConfigSnapshot =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| CacheError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        tracing::info!(
            path = %self.path.display(),
            version = %snapshot.version(),
            keys = snapshot.len(),
            "Loaded last-known-good snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Write `snapshot` to a temporary file, then rename it into place.
    pub fn save(&self, snapshot: &ConfigSnapshot) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io(source))?;
        }

        let tmp = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp).map_err(|source| self.io(source))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, snapshot).map_err(|source| {
                CacheError::Corrupt {
                    path: tmp.clone(),
                    source,
                }
            })?;
            writer.flush().map_err(|source| self.io(source))?;
        }
        fs::rename(&tmp, &self.path).map_err(|source| self.io(source))?;

        tracing::debug!(
            path = %self.path.display(),
            version = %snapshot.version(),
            "Saved snapshot cache"
        );
        Ok(())
    }

    fn io(&self, source: std::io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
