//! Frammento, a dependency-indexed partial cache for content sites.
//!
//! Two components cooperate to decide cheaply whether a cached fragment is
//! still valid, without recomputing its inputs on every request:
//!
//! - a **dependency index**: one persisted record of "last changed"
//!   watermarks per entity identifier, category, collection and site-level
//!   event, built once from a full scan and advanced incrementally on
//!   every mutation event;
//! - a **cache entry guard**: wraps one artifact, compares its last build
//!   time against the watermarks of its declared dependencies (cheapest
//!   check first, short-circuiting on the first stale hit) and either
//!   serves the stored artifact or recomputes and stores.
//!
//! ## Usage
//!
//! ```ignore
//! let cache = FragmentCache::new(config, host, index_store, artifact_store);
//!
//! // Register the bridge with the host's mutation hooks:
//! let bridge = cache.bridge();
//! // ... on every entity mutation: bridge.dispatch(HostEvent::EntityUpdated(entity));
//!
//! // Per request:
//! let html = cache
//!     .entry("sidebar")
//!     .watch([
//!         Watch::collections(["blog"]),
//!         Watch::snippets(["sidebar"]),
//!     ])
//!     .render(inputs, |data| render_sidebar(data));
//! ```
//!
//! The host content system is abstracted behind [`Host`]; persistence
//! behind [`KvStore`]. Everything degrades toward recomputation: missing
//! watermarks are "no information", a store outage costs a recompute or a
//! skipped flush, never an incorrectly served artifact.

mod admin;
mod cache;
mod config;
mod error;
mod events;
mod guard;
mod host;
mod index;
mod lock;
mod serialize;
mod store;
mod telemetry;
mod watch;

pub use admin::{AdminState, router as admin_router};
pub use cache::{FragmentCache, PARTITION_FILES, PARTITION_INDEX};
pub use config::{CacheConfig, CollectionTracking};
pub use error::{CacheError, StoreError};
pub use events::{CacheEvent, EventBridge, HostEvent};
pub use guard::CacheGuard;
pub use host::{EntityRecord, Host, Timestamp};
pub use index::{DependencyIndex, Indexer, PageIndex};
pub use serialize::{CacheInput, LazyField, serialize};
pub use store::{FileStore, KvStore, MemoryStore};
pub use telemetry::{LogFormat, init as telemetry_init};
pub use watch::{CheckContext, PageWatch, Watch};
