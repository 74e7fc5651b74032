//! Cache facade.
//!
//! Wires the configuration, the two store partitions (index and artifacts),
//! and the host collaborator together, and hands out per-request guards,
//! the indexer and the event bridge.

use std::sync::Arc;

use tracing::warn;

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::events::EventBridge;
use crate::guard::CacheGuard;
use crate::host::Host;
use crate::index::Indexer;
use crate::store::{KvStore, MemoryStore};

/// Store partition names, as addressed by the admin flush route.
pub const PARTITION_INDEX: &str = "index";
pub const PARTITION_FILES: &str = "files";

/// Entry point for the partial cache.
pub struct FragmentCache {
    config: Arc<CacheConfig>,
    index_store: Arc<dyn KvStore>,
    artifact_store: Arc<dyn KvStore>,
    host: Arc<dyn Host>,
}

impl FragmentCache {
    pub fn new(
        config: CacheConfig,
        host: Arc<dyn Host>,
        index_store: Arc<dyn KvStore>,
        artifact_store: Arc<dyn KvStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            index_store,
            artifact_store,
            host,
        }
    }

    /// Convenience constructor backed by in-process stores.
    pub fn in_memory(config: CacheConfig, host: Arc<dyn Host>) -> Self {
        Self::new(
            config,
            host,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
        )
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// A guard for one cached artifact. One instance per request.
    pub fn entry(&self, key: &str) -> CacheGuard {
        CacheGuard::new(
            self.config.clone(),
            self.artifact_store.clone(),
            self.indexer(),
            self.host.clone(),
            key,
        )
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(
            self.config.clone(),
            self.index_store.clone(),
            self.host.clone(),
        )
    }

    /// Event bridge to register with the host's mutation notifications.
    pub fn bridge(&self) -> EventBridge {
        EventBridge::new(self.indexer())
    }

    /// Rebuild the dependency index from a full scan. Returns the number
    /// of entities indexed.
    pub fn rebuild_index(&self) -> Result<usize, CacheError> {
        self.indexer().rebuild()
    }

    /// Flush a named store partition. Unknown partitions and store
    /// failures report `false`, never an error.
    pub fn flush_partition(&self, partition: &str) -> bool {
        let store = match partition {
            PARTITION_INDEX => &self.index_store,
            PARTITION_FILES => &self.artifact_store,
            _ => {
                warn!(partition, "Unknown cache partition");
                return false;
            }
        };
        match store.flush() {
            Ok(()) => true,
            Err(err) => {
                warn!(partition, error = %err, "Partition flush failed");
                false
            }
        }
    }
}
