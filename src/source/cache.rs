//! On-disk read-through cache for the downloaded dataset.
//!
//! An entry is the raw CSV text plus a small JSON sidecar recording which
//! source it came from and when it was fetched. Entries older than the TTL
//! or belonging to another source are ignored.

use crate::error::SourceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

const DATA_FILE: &str = "dataset.csv";
const META_FILE: &str = "dataset.json";

/// Sidecar describing a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheMeta {
    source: String,
    fetched_at: DateTime<Utc>,
}

/// A dataset served from the cache.
#[derive(Debug, Clone)]
pub struct CachedDataset {
    pub text: String,
    pub fetched_at: DateTime<Utc>,
}

/// Dataset cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct DatasetCache {
    dir: PathBuf,
    ttl_seconds: u64,
}

impl DatasetCache {
    pub fn new(dir: impl Into<PathBuf>, ttl_seconds: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl_seconds,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the cached dataset for `source` if it is still fresh.
    pub fn get(&self, source: &str) -> Result<Option<CachedDataset>, SourceError> {
        self.get_at(source, Utc::now())
    }

    /// Same as [`get`](Self::get) with an explicit clock.
    pub fn get_at(
        &self,
        source: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<CachedDataset>, SourceError> {
        let meta_path = self.dir.join(META_FILE);
        let data_path = self.dir.join(DATA_FILE);

        if !meta_path.exists() || !data_path.exists() {
            debug!("Cache miss: no entry in {}", self.dir.display());
            return Ok(None);
        }

        let meta_json = match fs::read_to_string(&meta_path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Ignoring unreadable cache metadata: {}", e);
                return Ok(None);
            }
        };

        let meta: CacheMeta = match serde_json::from_str(&meta_json) {
            Ok(meta) => meta,
            Err(e) => {
                warn!("Ignoring unreadable cache metadata: {}", e);
                return Ok(None);
            }
        };

        if meta.source != source {
            debug!("Cache miss: entry belongs to {}", meta.source);
            return Ok(None);
        }

        let age = (now - meta.fetched_at).num_seconds();
        if age < 0 || age as u64 >= self.ttl_seconds {
            debug!("Cache miss: entry is {}s old (ttl {}s)", age, self.ttl_seconds);
            return Ok(None);
        }

        let text = match fs::read_to_string(&data_path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Ignoring unreadable cached dataset: {}", e);
                return Ok(None);
            }
        };

        debug!("Cache hit: entry is {}s old", age);
        Ok(Some(CachedDataset {
            text,
            fetched_at: meta.fetched_at,
        }))
    }

    /// Store a freshly fetched dataset, replacing any previous entry.
    pub fn store(
        &self,
        source: &str,
        text: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<(), SourceError> {
        fs::create_dir_all(&self.dir)?;

        let meta = CacheMeta {
            source: source.to_string(),
            fetched_at,
        };
        let meta_json =
            serde_json::to_string_pretty(&meta).map_err(|e| SourceError::Cache(e.to_string()))?;

        self.write_atomic(DATA_FILE, text.as_bytes())?;
        self.write_atomic(META_FILE, meta_json.as_bytes())?;

        debug!("Cached {} bytes from {}", text.len(), source);
        Ok(())
    }

    /// Drop the cached entry, if any.
    pub fn invalidate(&self) -> Result<(), SourceError> {
        for name in [META_FILE, DATA_FILE] {
            let path = self.dir.join(name);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        debug!("Cache invalidated: {}", self.dir.display());
        Ok(())
    }

    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<(), SourceError> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(self.dir.join(name))
            .map_err(|e| SourceError::Io(e.error))?;
        Ok(())
    }
}
