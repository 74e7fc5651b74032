//! Dependency index.
//!
//! One persisted record mapping entity identifiers, categories, collections
//! and site-level events to "last changed" watermarks. Two write
//! disciplines coexist and are deliberately not unified:
//!
//! - the **scan path** (`record_*`) reconstructs historical maxima and
//!   max-merges, so a rebuild never regresses a watermark an event already
//!   advanced;
//! - the **event path** (`stamp_*`) represents a genuine new change and
//!   overwrites with "now" unconditionally, so the watermark always moves
//!   forward.
//!
//! Every operation is a read-modify-write of the whole record against the
//! index store partition. Concurrent writers can race; the loser costs one
//! late refresh, never an early serve.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::host::{EntityRecord, Host, Timestamp};
use crate::store::KvStore;

/// Store key the index record is persisted under.
pub const INDEX_KEY: &str = "index";

const METRIC_INDEX_REBUILD_MS: &str = "frammento_index_rebuild_ms";
const METRIC_INDEX_UPDATE_TOTAL: &str = "frammento_index_update_total";

/// Per-entity watermarks, keyed by every stable identifier an entity has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageIndex {
    /// `pages.id[identifier]`: both the uuid and the path id of an entity
    /// point at the same watermark.
    #[serde(default)]
    pub id: BTreeMap<String, Timestamp>,
    /// `pages.blueprint[category]`: max modified across the category.
    #[serde(default)]
    pub blueprint: BTreeMap<String, Timestamp>,
    /// Any page mutation at all (event path only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all: Option<Timestamp>,
}

/// The persisted dependency index record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyIndex {
    #[serde(default)]
    pub pages: PageIndex,
    #[serde(default)]
    pub collections: BTreeMap<String, Timestamp>,
    #[serde(rename = "site.modified", default, skip_serializing_if = "Option::is_none")]
    pub site_modified: Option<Timestamp>,
    #[serde(rename = "site.update", default, skip_serializing_if = "Option::is_none")]
    pub site_update: Option<Timestamp>,
}

fn merge_max(slot: &mut Option<Timestamp>, candidate: Timestamp) {
    if slot.is_none_or(|current| candidate > current) {
        *slot = Some(candidate);
    }
}

fn merge_max_key(map: &mut BTreeMap<String, Timestamp>, key: &str, candidate: Timestamp) {
    match map.get_mut(key) {
        Some(current) if *current >= candidate => {}
        Some(current) => *current = candidate,
        None => {
            map.insert(key.to_string(), candidate);
        }
    }
}

impl DependencyIndex {
    /// Scan path: record an entity's modified time under both identifiers
    /// and max-merge its category watermark.
    pub fn record_entity(&mut self, entity: &EntityRecord) {
        self.pages.id.insert(entity.uuid.clone(), entity.modified);
        self.pages.id.insert(entity.path_id.clone(), entity.modified);
        merge_max_key(&mut self.pages.blueprint, &entity.blueprint, entity.modified);
    }

    /// Scan path: max-merge a collection watermark.
    pub fn record_collection(&mut self, name: &str, modified: Timestamp) {
        merge_max_key(&mut self.collections, name, modified);
    }

    /// Event path: stamp an entity mutation with a fresh "now".
    pub fn stamp_entity(&mut self, entity: &EntityRecord, now: Timestamp) {
        self.pages
            .blueprint
            .insert(entity.blueprint.clone(), now);
        self.pages.id.insert(entity.uuid.clone(), now);
        self.pages.id.insert(entity.path_id.clone(), now);
        self.pages.all = Some(now);
        self.site_modified = Some(now);
    }

    /// Event path: stamp a collection the mutated entity belongs to.
    pub fn stamp_collection(&mut self, name: &str, now: Timestamp) {
        self.collections.insert(name.to_string(), now);
    }

    /// Event path: stamp a whole-site mutation.
    pub fn stamp_site(&mut self, now: Timestamp) {
        self.site_update = Some(now);
        self.site_modified = Some(now);
    }

    /// Scan path: merge the site-wide modified time without touching
    /// `site.update`.
    pub fn merge_site_modified(&mut self, modified: Timestamp) {
        merge_max(&mut self.site_modified, modified);
    }
}

/// Read-modify-write orchestration of the index record against the store
/// and the host.
#[derive(Clone)]
pub struct Indexer {
    config: Arc<CacheConfig>,
    store: Arc<dyn KvStore>,
    host: Arc<dyn Host>,
}

impl Indexer {
    pub fn new(config: Arc<CacheConfig>, store: Arc<dyn KvStore>, host: Arc<dyn Host>) -> Self {
        Self {
            config,
            store,
            host,
        }
    }

    /// The persisted index, or `None` if it has never been built. A record
    /// that fails to deserialize is discarded (the next rebuild replaces
    /// it) rather than treated as an error.
    pub fn load(&self) -> Result<Option<DependencyIndex>, CacheError> {
        let Some(raw) = self.store.get(INDEX_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_value(raw) {
            Ok(index) => Ok(Some(index)),
            Err(err) => {
                warn!(error = %err, "Discarding malformed dependency index record");
                Ok(None)
            }
        }
    }

    fn load_or_default(&self) -> Result<DependencyIndex, CacheError> {
        Ok(self.load()?.unwrap_or_default())
    }

    fn save(&self, index: &DependencyIndex) -> Result<(), CacheError> {
        let raw = serde_json::to_value(index).map_err(crate::error::StoreError::from)?;
        self.store.set(INDEX_KEY, raw, 0)?;
        Ok(())
    }

    /// The index, built on the spot if it does not exist yet. This is the
    /// lazy bootstrap path `watch` relies on; the cold-start scan is paid
    /// once.
    pub fn ensure(&self) -> Result<DependencyIndex, CacheError> {
        if let Some(index) = self.load()? {
            return Ok(index);
        }
        self.rebuild()?;
        self.load_or_default()
    }

    /// Scan path: index one entity.
    pub fn index_entity(&self, entity: &EntityRecord) -> Result<(), CacheError> {
        let mut index = self.load_or_default()?;
        index.record_entity(entity);
        self.save(&index)
    }

    /// Scan path: index the most recently modified member of a named
    /// collection. An unknown or empty collection is a no-op; no null or
    /// zero watermark is ever written.
    pub fn index_collection(&self, name: &str) -> Result<(), CacheError> {
        let Some(latest) = self.host.collection_latest(name) else {
            debug!(collection = name, "Skipping empty collection");
            return Ok(());
        };
        let mut index = self.load_or_default()?;
        index.record_collection(name, latest.modified);
        self.save(&index)
    }

    /// Event path: an entity was mutated. Stamps a fresh "now" into its
    /// category, both identifiers, `pages.all`, `site.modified`, and every
    /// configured collection the entity is currently a member of.
    pub fn update_entity(&self, entity: &EntityRecord) -> Result<(), CacheError> {
        let now = self.host.now();
        let mut index = self.load_or_default()?;
        index.stamp_entity(entity, now);

        for name in self.config.collections.names() {
            if self.host.collection_contains(name, entity) {
                index.stamp_collection(name, now);
            }
        }

        self.save(&index)?;
        metrics::counter!(METRIC_INDEX_UPDATE_TOTAL, "kind" => "entity").increment(1);
        Ok(())
    }

    /// Event path: a whole-site mutation.
    pub fn site_update(&self) -> Result<(), CacheError> {
        let now = self.host.now();
        let mut index = self.load_or_default()?;
        index.stamp_site(now);
        self.save(&index)?;
        metrics::counter!(METRIC_INDEX_UPDATE_TOTAL, "kind" => "site").increment(1);
        Ok(())
    }

    /// Full rebuild from an entity scan. Safe to run while readers are
    /// active: each entity is its own read-modify-write, so a reader may
    /// observe a partially built index, which at worst delays one refresh.
    ///
    /// Run rebuilds before trusting event-driven updates, or accept
    /// last-write-wins: the scan max-merges while events overwrite, and no
    /// reconciliation between interleaved sequences is attempted.
    ///
    /// Returns the number of entities indexed.
    pub fn rebuild(&self) -> Result<usize, CacheError> {
        let started_at = Instant::now();
        let entities = self.host.all_entities();

        for entity in &entities {
            self.index_entity(entity)?;
        }

        self.site_update()?;

        for name in self.config.collections.names() {
            self.index_collection(name)?;
        }

        let mut index = self.load_or_default()?;
        index.merge_site_modified(self.host.site_modified());
        self.save(&index)?;

        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        info!(
            entity_count = entities.len(),
            collection_count = self.config.collections.names().len(),
            elapsed_ms,
            "Dependency index rebuilt"
        );
        metrics::histogram!(METRIC_INDEX_REBUILD_MS).record(elapsed_ms);

        Ok(entities.len())
    }
}
