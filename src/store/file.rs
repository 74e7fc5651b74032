//! File-backed key-value store.
//!
//! Disk-backed artifact partition: one JSON envelope file per key under a
//! root directory. `modified` comes from the filesystem mtime, which is
//! exactly the "last build time" the staleness checks compare against.
//! Keys may contain `/` (locale prefixes map to subdirectories).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::warn;

use crate::error::StoreError;
use crate::host::Timestamp;

use super::KvStore;

const FILE_SUFFIX: &str = ".cache.json";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<Timestamp>,
}

/// One file per key under `root`, flushed by recreating the directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a file store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are host-controlled cache keys, not arbitrary user input;
        // neutralize traversal components anyway. Dots inside a component
        // are legal and must stay distinct from underscores.
        let sanitized = key
            .split('/')
            .map(|part| match part {
                "" | "." | ".." => "_",
                part => part,
            })
            .collect::<Vec<_>>()
            .join("/")
            .replace('\\', "_");
        self.root.join(format!("{sanitized}{FILE_SUFFIX}"))
    }

    fn now() -> Timestamp {
        OffsetDateTime::now_utc().unix_timestamp()
    }

    fn read_envelope(&self, key: &str) -> Result<Option<Envelope>, StoreError> {
        let path = self.path_for(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice::<Envelope>(&raw) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(err) => {
                warn!(key, error = %err, "Discarding unreadable cache file");
                Ok(None)
            }
        }
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        match self.read_envelope(key)? {
            Some(envelope) if !envelope.expires_at.is_some_and(|at| at <= Self::now()) => {
                Ok(Some(envelope.value))
            }
            _ => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value, ttl_secs: u64) -> Result<(), StoreError> {
        let expires_at = (ttl_secs > 0).then(|| Self::now() + ttl_secs as Timestamp);
        let envelope = Envelope { value, expires_at };
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_vec(&envelope)?)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), StoreError> {
        fs::remove_dir_all(&self.root)?;
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    fn modified(&self, key: &str) -> Option<Timestamp> {
        let mtime = fs::metadata(self.path_for(key)).ok()?.modified().ok()?;
        Some(OffsetDateTime::from(mtime).unix_timestamp())
    }
}
