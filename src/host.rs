//! Host collaborator contract.
//!
//! The cache core never talks to the content system directly. Everything it
//! needs (the entity scan, collection membership, template and snippet file
//! resolution, the active locale and the clock) comes through the [`Host`]
//! trait, so the core can be exercised against a stub in tests and bolted
//! onto any content model in production.

use std::path::{Path, PathBuf};

use time::OffsetDateTime;

/// Unix timestamp in seconds. All watermarks in the dependency index use
/// this representation.
pub type Timestamp = i64;

/// A snapshot of one content entity, as seen at scan or mutation time.
///
/// Entities carry two stable identifiers that both resolve to the same
/// index slot: a durable `uuid` (which may wear a URI-style prefix such as
/// `page://`) and a path-like `path_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRecord {
    /// Durable identifier, stable across renames and moves.
    pub uuid: String,
    /// Path-like identifier, e.g. `blog/my-post`.
    pub path_id: String,
    /// The entity's kind/category classifier (blueprint or template name).
    pub blueprint: String,
    /// Last-modified time of the entity.
    pub modified: Timestamp,
}

impl EntityRecord {
    pub fn new(
        uuid: impl Into<String>,
        path_id: impl Into<String>,
        blueprint: impl Into<String>,
        modified: Timestamp,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            path_id: path_id.into(),
            blueprint: blueprint.into(),
            modified,
        }
    }
}

/// Services the host content system provides to the cache core.
///
/// Implementations must be cheap to call repeatedly; `collection_*` methods
/// in particular run on every mutation event for every configured
/// collection.
pub trait Host: Send + Sync {
    /// Every entity in the system, for full index rebuilds.
    fn all_entities(&self) -> Vec<EntityRecord>;

    /// Last-modified time of the site as a whole.
    fn site_modified(&self) -> Timestamp;

    /// The most recently modified member of a named collection, or `None`
    /// when the collection is unknown or empty.
    fn collection_latest(&self, name: &str) -> Option<EntityRecord>;

    /// Live membership test against the named collection.
    fn collection_contains(&self, name: &str, entity: &EntityRecord) -> bool;

    /// Resolve a logical template name to a file path, if one exists.
    fn template_path(&self, name: &str) -> Option<PathBuf>;

    /// Resolve a logical snippet name to a file path, if one exists.
    fn snippet_path(&self, name: &str) -> Option<PathBuf>;

    /// Modification time of a file on disk. The default implementation
    /// stats the path; a missing file is "no information", not an error.
    fn file_modified(&self, path: &Path) -> Option<Timestamp> {
        let mtime = std::fs::metadata(path).ok()?.modified().ok()?;
        Some(OffsetDateTime::from(mtime).unix_timestamp())
    }

    /// Active locale code when the host is multi-language. Cache keys are
    /// namespaced per locale so translated fragments never collide.
    fn locale(&self) -> Option<String> {
        None
    }

    /// Current wall-clock time. Overridable so tests can pin the clock.
    fn now(&self) -> Timestamp {
        OffsetDateTime::now_utc().unix_timestamp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BareHost;

    impl Host for BareHost {
        fn all_entities(&self) -> Vec<EntityRecord> {
            Vec::new()
        }
        fn site_modified(&self) -> Timestamp {
            0
        }
        fn collection_latest(&self, _name: &str) -> Option<EntityRecord> {
            None
        }
        fn collection_contains(&self, _name: &str, _entity: &EntityRecord) -> bool {
            false
        }
        fn template_path(&self, _name: &str) -> Option<PathBuf> {
            None
        }
        fn snippet_path(&self, _name: &str) -> Option<PathBuf> {
            None
        }
    }

    #[test]
    fn default_locale_is_monolingual() {
        assert!(BareHost.locale().is_none());
    }

    #[test]
    fn default_clock_advances() {
        let now = BareHost.now();
        assert!(now > 1_600_000_000);
    }

    #[test]
    fn file_modified_missing_file_is_none() {
        assert!(BareHost.file_modified(Path::new("/nonexistent/f.tpl")).is_none());
    }
}
