//! Mutation event bridge.
//!
//! The host fires a notification after every entity or site mutation; the
//! bridge maps each one onto the matching dependency-index update. All
//! entity-level events funnel into the same stamp: what matters for
//! invalidation is *that* the entity changed, not how. A failing store
//! must never take the host's write path down with it, so indexer errors
//! are logged and swallowed here.

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::host::EntityRecord;
use crate::index::Indexer;

/// Lifecycle notifications the host can report.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// An entity was created.
    EntityCreated(EntityRecord),
    /// An entity was updated (content, title, slug, status or ordering).
    EntityUpdated(EntityRecord),
    /// An entity was deleted. Stamped like an update: watchers of the
    /// entity, its category and its collections must all refresh.
    EntityDeleted(EntityRecord),
    /// An entity was duplicated; carries the duplicate.
    EntityDuplicated(EntityRecord),
    /// A file changed; attributed to its owning entity when it has one.
    FileChanged { owner: Option<EntityRecord> },
    /// A whole-site mutation (site settings, site title, ...).
    SiteUpdated,
}

/// An event as dispatched, with an idempotency id and wall-clock time.
#[derive(Debug, Clone)]
pub struct CacheEvent {
    pub id: Uuid,
    pub kind: HostEvent,
    pub timestamp: OffsetDateTime,
}

impl CacheEvent {
    pub fn new(kind: HostEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Maps host events onto dependency-index updates.
#[derive(Clone)]
pub struct EventBridge {
    indexer: Indexer,
}

impl EventBridge {
    pub fn new(indexer: Indexer) -> Self {
        Self { indexer }
    }

    /// Handle one host event. Never fails; degraded updates surface as
    /// warnings and the next mutation re-stamps the watermark anyway.
    pub fn dispatch(&self, kind: HostEvent) {
        let event = CacheEvent::new(kind);

        info!(
            event_id = %event.id,
            event_kind = ?event.kind,
            "Mutation event received"
        );

        let result = match &event.kind {
            HostEvent::EntityCreated(entity)
            | HostEvent::EntityUpdated(entity)
            | HostEvent::EntityDeleted(entity)
            | HostEvent::EntityDuplicated(entity) => self.indexer.update_entity(entity),
            HostEvent::FileChanged { owner: Some(owner) } => self.indexer.update_entity(owner),
            HostEvent::FileChanged { owner: None } => Ok(()),
            HostEvent::SiteUpdated => self.indexer.site_update(),
        };

        if let Err(err) = result {
            warn!(
                event_id = %event.id,
                error = %err,
                "Index update failed; watermark will catch up on the next mutation"
            );
        }
    }
}
