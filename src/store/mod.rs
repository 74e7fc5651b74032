//! Key-value store boundary.
//!
//! The cache core persists two kinds of values through the same narrow
//! interface: the dependency index (one nested JSON record) and cached
//! artifacts (arbitrary JSON values). The trait is deliberately small,
//! just get, set with TTL, flush, and a modification-time query, so any
//! persistent store the host already runs can sit behind it.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use serde_json::Value;

use crate::error::StoreError;
use crate::host::Timestamp;

/// A persistent key-value store partition.
///
/// Values must survive nested structured data (mapping-of-mappings); the
/// dependency index is stored as a single such record. `ttl_secs` of 0
/// means "store default / never expires".
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    fn set(&self, key: &str, value: Value, ttl_secs: u64) -> Result<(), StoreError>;

    /// Remove every entry in this partition.
    fn flush(&self) -> Result<(), StoreError>;

    /// When the value under `key` was last written, if it exists.
    fn modified(&self, key: &str) -> Option<Timestamp>;
}
