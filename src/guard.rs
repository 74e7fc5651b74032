//! Cache entry guard.
//!
//! One ephemeral guard per artifact per request. Construction loads the
//! stored artifact and its write time; `watch` loads a dependency index
//! snapshot (building it on first use) and evaluates the declared
//! dependencies cheapest-first; `data`/`render` then either serve the
//! stored artifact or recompute and store. Once a guard has decided
//! `needs_update`, the verdict is locked in for its lifetime.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::host::{Host, Timestamp};
use crate::index::{DependencyIndex, Indexer};
use crate::serialize::{CacheInput, serialize};
use crate::store::KvStore;
use crate::watch::{CheckContext, Watch, canonical_order};

const METRIC_GUARD_HIT_TOTAL: &str = "frammento_guard_hit_total";
const METRIC_GUARD_STALE_TOTAL: &str = "frammento_guard_stale_total";

/// Guards one cached artifact.
pub struct CacheGuard {
    config: Arc<CacheConfig>,
    artifacts: Arc<dyn KvStore>,
    indexer: Indexer,
    host: Arc<dyn Host>,
    key: String,
    cache_item: Option<Value>,
    last_modified: Option<Timestamp>,
    needs_update: bool,
    expires: u64,
    index: Option<DependencyIndex>,
}

impl CacheGuard {
    pub(crate) fn new(
        config: Arc<CacheConfig>,
        artifacts: Arc<dyn KvStore>,
        indexer: Indexer,
        host: Arc<dyn Host>,
        key: &str,
    ) -> Self {
        let key = match host.locale() {
            Some(code) => format!("{code}/{key}"),
            None => key.to_string(),
        };

        let (cache_item, last_modified) = if config.file_cache {
            let cache_item = match artifacts.get(&key) {
                Ok(item) => item,
                Err(err) => {
                    warn!(key, error = %err, "Artifact read failed, treating as uncached");
                    None
                }
            };
            let last_modified = artifacts.modified(&key);
            (cache_item, last_modified)
        } else {
            (None, None)
        };

        // A disabled cache forces recomputation on every request.
        let needs_update = !config.enabled;
        let expires = config.default_ttl_secs;

        Self {
            config,
            artifacts,
            indexer,
            host,
            key,
            cache_item,
            last_modified,
            needs_update,
            expires,
            index: None,
        }
    }

    /// The locale-prefixed key this guard operates on.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the artifact has been found stale.
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// TTL for the next write, in seconds; 0 means no expiry.
    pub fn expires(mut self, secs: u64) -> Self {
        self.expires = secs;
        self
    }

    /// Evaluate watched dependencies against the index snapshot.
    ///
    /// Loads the dependency index on first call, triggering a full rebuild
    /// when it does not exist yet. Kinds are re-sorted into canonical
    /// cheapest-first order; evaluation stops at the first stale hit.
    pub fn watch(mut self, specs: impl IntoIterator<Item = Watch>) -> Self {
        if self.index.is_none() {
            self.index = Some(match self.indexer.ensure() {
                Ok(index) => index,
                Err(err) => {
                    warn!(key = self.key, error = %err, "Index unavailable, checks see an empty snapshot");
                    DependencyIndex::default()
                }
            });
        }

        if self.needs_update {
            return self;
        }

        let Some(index) = self.index.as_ref() else {
            return self;
        };
        let ctx = CheckContext {
            last_modified: self.last_modified,
            index,
            host: self.host.as_ref(),
        };

        for spec in canonical_order(specs.into_iter().collect()) {
            if spec.is_stale(&ctx) {
                debug!(key = self.key, dependency = ?spec, "Dependency marks artifact stale");
                self.needs_update = true;
                break;
            }
        }

        self
    }

    /// Serve the stored artifact, or serialize `value`, store and return it
    /// when there is no valid artifact or a dependency proved staleness.
    ///
    /// A nullish input means "nothing to cache" and returns `None`.
    pub fn data(&mut self, value: impl Into<CacheInput>) -> Option<Value> {
        let input = value.into();
        if input.is_null() {
            return None;
        }

        if self.cache_item.is_none() || self.needs_update {
            let item = serialize(input);
            if item.is_null() {
                return None;
            }
            self.store_item(&item);
            metrics::counter!(METRIC_GUARD_STALE_TOTAL).increment(1);
            self.cache_item = Some(item.clone());
            return Some(item);
        }

        metrics::counter!(METRIC_GUARD_HIT_TOTAL).increment(1);
        self.cache_item.clone()
    }

    /// Like [`data`](Self::data), but the artifact is produced by a render
    /// callback receiving the serialized input. Used for cached fragments
    /// whose inputs are cheap but whose rendering is not.
    pub fn render<F>(&mut self, input: impl Into<CacheInput>, render_fn: F) -> Option<Value>
    where
        F: FnOnce(&Value) -> String,
    {
        if self.cache_item.is_none() || self.needs_update {
            let data = serialize(input.into());
            let item = Value::String(render_fn(&data));
            self.store_item(&item);
            metrics::counter!(METRIC_GUARD_STALE_TOTAL).increment(1);
            self.cache_item = Some(item.clone());
            return Some(item);
        }

        metrics::counter!(METRIC_GUARD_HIT_TOTAL).increment(1);
        self.cache_item.clone()
    }

    /// Remove every artifact in this guard's backing partition. Store
    /// failures degrade to `false`, they never propagate.
    pub fn flush(&self) -> bool {
        match self.artifacts.flush() {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "Artifact flush failed");
                false
            }
        }
    }

    fn store_item(&self, item: &Value) {
        if !self.config.file_cache {
            return;
        }
        if let Err(err) = self.artifacts.set(&self.key, item.clone(), self.expires) {
            // Fail-open: the fresh value is still returned to the caller.
            warn!(key = self.key, error = %err, "Artifact write failed");
        }
    }
}
