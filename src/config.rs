//! Cache configuration.
//!
//! Controls the cache toggle, the artifact file-cache layer and the list of
//! tracked collections, typically via a `[cache]` table in the host's TOML
//! configuration:
//!
//! ```toml
//! [cache]
//! enabled = true
//! file_cache = true
//! collections = ["blog", "news"]
//! ```

use serde::Deserialize;

use crate::error::CacheError;

const DEFAULT_TTL_SECS: u64 = 0; // 0 = store default / never expires

/// Cache configuration consumed by the core.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Master switch. When off, every guard reports `needs_update`
    /// immediately and nothing is ever served from cache.
    pub enabled: bool,
    /// Enable the artifact store layer. When off, guards neither read nor
    /// write stored artifacts (every request recomputes).
    pub file_cache: bool,
    /// Collections whose membership is tracked in the dependency index.
    pub collections: CollectionTracking,
    /// TTL applied to artifact writes unless a guard overrides it.
    pub default_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            file_cache: true,
            collections: CollectionTracking::default(),
            default_ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

/// Which collections to track: disabled, a single name, or a list.
///
/// Accepts the three shapes hosts commonly configure: `false`, `"blog"`,
/// or `["blog", "news"]`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CollectionTracking {
    Toggle(bool),
    One(String),
    Many(Vec<String>),
}

impl Default for CollectionTracking {
    fn default() -> Self {
        Self::Toggle(false)
    }
}

impl CollectionTracking {
    /// The configured collection names. `Toggle` carries none either way:
    /// `false` disables tracking and a bare `true` names nothing to track.
    pub fn names(&self) -> &[String] {
        match self {
            Self::Toggle(_) => &[],
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names().is_empty()
    }
}

impl CacheConfig {
    /// Parse a `CacheConfig` from a TOML fragment.
    pub fn from_toml(source: &str) -> Result<Self, CacheError> {
        toml::from_str(source)
            .map_err(|err| CacheError::configuration(format!("invalid cache config: {err}")))
    }
}
