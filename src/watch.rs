//! Watched dependency kinds.
//!
//! A guard declares what its artifact depends on as a list of [`Watch`]
//! values. Before evaluation the list is partitioned into the canonical
//! cheapest-first order (in-memory index lookups before file stats, the
//! broad site watermark last) with custom kinds appended in their original
//! relative order. Evaluation short-circuits on the first stale hit; the
//! verdict never depends on the order, only the cost does.

use crate::host::{Host, Timestamp};
use crate::index::DependencyIndex;

/// Page identifiers to watch, split by identifier class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageWatch {
    /// Stable identifiers (uuid or path id). URI-style prefixes such as
    /// `page://` are stripped before lookup.
    pub id: Vec<String>,
    /// Category (blueprint) names.
    pub blueprint: Vec<String>,
}

impl PageWatch {
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn blueprints<I, S>(blueprints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blueprint: blueprints.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// Everything a check may consult.
pub struct CheckContext<'a> {
    /// When the artifact was last written, if ever.
    pub last_modified: Option<Timestamp>,
    /// Read-only dependency index snapshot.
    pub index: &'a DependencyIndex,
    /// Host collaborator, for file resolution.
    pub host: &'a dyn Host,
}

impl CheckContext<'_> {
    /// A found watermark makes the artifact stale when it is newer than the
    /// stored artifact, or when no artifact was ever stored.
    pub fn is_newer(&self, watermark: Timestamp) -> bool {
        self.last_modified.is_none_or(|last| watermark > last)
    }
}

/// One watched dependency.
pub enum Watch {
    /// Specific entities and/or categories, by index lookup.
    Pages(PageWatch),
    /// Named collections, by index lookup.
    Collections(Vec<String>),
    /// Template files, by file mtime.
    Templates(Vec<String>),
    /// Snippet files, by file mtime.
    Snippets(Vec<String>),
    /// Whole-site mutation events (`site.update`), when `true`.
    SiteUpdate(bool),
    /// Any tracked mutation at all (`site.modified`). Broadest check; by
    /// canonical order it runs last because a cheaper check has usually
    /// already decided.
    SiteModified,
    /// Host-supplied predicate, evaluated after all canonical kinds.
    Custom {
        name: String,
        check: Box<dyn Fn(&CheckContext<'_>) -> bool + Send + Sync>,
    },
}

impl Watch {
    pub fn collections<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Collections(names.into_iter().map(Into::into).collect())
    }

    pub fn templates<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Templates(names.into_iter().map(Into::into).collect())
    }

    pub fn snippets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Snippets(names.into_iter().map(Into::into).collect())
    }

    pub fn custom(
        name: impl Into<String>,
        check: impl Fn(&CheckContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            name: name.into(),
            check: Box::new(check),
        }
    }

    /// Position in the canonical cheapest-first order; `None` for kinds
    /// outside it.
    fn canonical_rank(&self) -> Option<usize> {
        match self {
            Self::Pages(_) => Some(0),
            Self::Collections(_) => Some(1),
            Self::SiteUpdate(_) => Some(2),
            Self::Templates(_) => Some(3),
            Self::Snippets(_) => Some(4),
            Self::SiteModified => Some(5),
            Self::Custom { .. } => None,
        }
    }

    /// Evaluate this dependency. `true` means the artifact is stale.
    /// Missing index entries or unresolvable files are "no information"
    /// and never mark anything stale.
    pub(crate) fn is_stale(&self, ctx: &CheckContext<'_>) -> bool {
        match self {
            Self::Pages(pages) => check_pages(pages, ctx),
            Self::Collections(names) => names.iter().any(|name| {
                ctx.index
                    .collections
                    .get(name)
                    .is_some_and(|&ts| ctx.is_newer(ts))
            }),
            Self::Templates(names) => names
                .iter()
                .any(|name| file_is_newer(ctx, ctx.host.template_path(name))),
            Self::Snippets(names) => names
                .iter()
                .any(|name| file_is_newer(ctx, ctx.host.snippet_path(name))),
            Self::SiteUpdate(enabled) => {
                *enabled && ctx.index.site_update.is_some_and(|ts| ctx.is_newer(ts))
            }
            Self::SiteModified => ctx.index.site_modified.is_some_and(|ts| ctx.is_newer(ts)),
            Self::Custom { check, .. } => check(ctx),
        }
    }
}

impl std::fmt::Debug for Watch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pages(pages) => f.debug_tuple("Pages").field(pages).finish(),
            Self::Collections(names) => f.debug_tuple("Collections").field(names).finish(),
            Self::Templates(names) => f.debug_tuple("Templates").field(names).finish(),
            Self::Snippets(names) => f.debug_tuple("Snippets").field(names).finish(),
            Self::SiteUpdate(enabled) => f.debug_tuple("SiteUpdate").field(enabled).finish(),
            Self::SiteModified => f.write_str("SiteModified"),
            Self::Custom { name, .. } => f.debug_struct("Custom").field("name", name).finish(),
        }
    }
}

fn check_pages(pages: &PageWatch, ctx: &CheckContext<'_>) -> bool {
    let id_hit = pages.id.iter().any(|id| {
        ctx.index
            .pages
            .id
            .get(strip_uri_prefix(id))
            .is_some_and(|&ts| ctx.is_newer(ts))
    });
    if id_hit {
        return true;
    }
    pages.blueprint.iter().any(|name| {
        ctx.index
            .pages
            .blueprint
            .get(strip_uri_prefix(name))
            .is_some_and(|&ts| ctx.is_newer(ts))
    })
}

fn file_is_newer(ctx: &CheckContext<'_>, path: Option<std::path::PathBuf>) -> bool {
    path.and_then(|p| ctx.host.file_modified(&p))
        .is_some_and(|mtime| ctx.is_newer(mtime))
}

/// Strip a URI-style prefix (`page://`, `file://`, ...) from an identifier.
fn strip_uri_prefix(id: &str) -> &str {
    match id.find("://") {
        Some(at) => &id[at + 3..],
        None => id,
    }
}

/// Partition specs into canonical order: ranked kinds first, by rank
/// (stable within a rank), then the remaining kinds in their original
/// relative order.
pub(crate) fn canonical_order(specs: Vec<Watch>) -> Vec<Watch> {
    let mut ranked: Vec<(usize, Watch)> = Vec::with_capacity(specs.len());
    let mut rest: Vec<Watch> = Vec::new();

    for spec in specs {
        match spec.canonical_rank() {
            Some(rank) => ranked.push((rank, spec)),
            None => rest.push(spec),
        }
    }

    ranked.sort_by_key(|(rank, _)| *rank);
    ranked
        .into_iter()
        .map(|(_, spec)| spec)
        .chain(rest)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use crate::host::EntityRecord;

    use super::*;

    struct NoFilesHost;

    impl Host for NoFilesHost {
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

    fn ctx<'a>(index: &'a DependencyIndex, last_modified: Option<Timestamp>) -> CheckContext<'a> {
        CheckContext {
            last_modified,
            index,
            host: &NoFilesHost,
        }
    }

    fn sample_index() -> DependencyIndex {
        let mut index = DependencyIndex::default();
        index.record_entity(&EntityRecord::new("uuid-a", "blog/a", "article", 150));
        index.record_collection("blog", 150);
        index.stamp_site(120);
        index
    }

    #[test]
    fn page_id_newer_than_artifact_is_stale() {
        let index = sample_index();
        let watch = Watch::Pages(PageWatch::ids(["uuid-a"]));
        assert!(watch.is_stale(&ctx(&index, Some(100))));
        assert!(!watch.is_stale(&ctx(&index, Some(200))));
    }

    #[test]
    fn uri_prefix_is_stripped() {
        let index = sample_index();
        let watch = Watch::Pages(PageWatch::ids(["page://uuid-a"]));
        assert!(watch.is_stale(&ctx(&index, Some(100))));
    }

    #[test]
    fn unknown_identifier_is_no_information() {
        let index = sample_index();
        let watch = Watch::Pages(PageWatch::ids(["page://missing"]));
        assert!(!watch.is_stale(&ctx(&index, Some(100))));
    }

    #[test]
    fn blueprint_class_uses_blueprint_slots() {
        let index = sample_index();
        let watch = Watch::Pages(PageWatch::blueprints(["article"]));
        assert!(watch.is_stale(&ctx(&index, Some(100))));
        assert!(!watch.is_stale(&ctx(&index, Some(151))));
    }

    #[test]
    fn never_stored_artifact_counts_as_stale() {
        let index = sample_index();
        let watch = Watch::Pages(PageWatch::ids(["uuid-a"]));
        assert!(watch.is_stale(&ctx(&index, None)));
    }

    #[test]
    fn collection_watermark_comparison() {
        let index = sample_index();
        let watch = Watch::collections(["blog"]);
        assert!(watch.is_stale(&ctx(&index, Some(149))));
        assert!(!watch.is_stale(&ctx(&index, Some(150))));
    }

    #[test]
    fn unknown_collection_is_no_information() {
        let index = sample_index();
        let watch = Watch::collections(["missing"]);
        assert!(!watch.is_stale(&ctx(&index, Some(1))));
    }

    #[test]
    fn site_update_only_when_opted_in() {
        let index = sample_index();
        assert!(Watch::SiteUpdate(true).is_stale(&ctx(&index, Some(100))));
        assert!(!Watch::SiteUpdate(false).is_stale(&ctx(&index, Some(100))));
        assert!(!Watch::SiteUpdate(true).is_stale(&ctx(&index, Some(121))));
    }

    #[test]
    fn site_modified_is_the_broadest_check() {
        let index = sample_index();
        assert!(Watch::SiteModified.is_stale(&ctx(&index, Some(100))));
        assert!(!Watch::SiteModified.is_stale(&ctx(&index, Some(121))));
    }

    #[test]
    fn missing_template_file_is_no_information() {
        let index = sample_index();
        let watch = Watch::templates(["default"]);
        assert!(!watch.is_stale(&ctx(&index, Some(1))));
    }

    /// Resolves every template and snippet name and pins the file mtime.
    struct TemplatedHost {
        mtime: Timestamp,
    }

    impl Host for TemplatedHost {
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
        fn template_path(&self, name: &str) -> Option<PathBuf> {
            Some(PathBuf::from(format!("/templates/{name}.tpl")))
        }
        fn snippet_path(&self, name: &str) -> Option<PathBuf> {
            Some(PathBuf::from(format!("/snippets/{name}.tpl")))
        }
        fn file_modified(&self, _path: &Path) -> Option<Timestamp> {
            Some(self.mtime)
        }
    }

    fn file_ctx<'a>(
        index: &'a DependencyIndex,
        host: &'a TemplatedHost,
        last_modified: Timestamp,
    ) -> CheckContext<'a> {
        CheckContext {
            last_modified: Some(last_modified),
            index,
            host,
        }
    }

    #[test]
    fn template_mtime_newer_than_artifact_is_stale() {
        let index = sample_index();
        let host = TemplatedHost { mtime: 200 };
        let watch = Watch::templates(["default"]);

        assert!(watch.is_stale(&file_ctx(&index, &host, 100)));
        assert!(!watch.is_stale(&file_ctx(&index, &host, 300)));
    }

    #[test]
    fn snippet_mtime_newer_than_artifact_is_stale() {
        let index = sample_index();
        let host = TemplatedHost { mtime: 200 };
        let watch = Watch::snippets(["card"]);

        assert!(watch.is_stale(&file_ctx(&index, &host, 100)));
        assert!(!watch.is_stale(&file_ctx(&index, &host, 300)));
    }

    #[test]
    fn canonical_order_partitions_ranked_before_custom() {
        let specs = vec![
            Watch::custom("extra", |_| false),
            Watch::SiteModified,
            Watch::snippets(["card"]),
            Watch::collections(["blog"]),
            Watch::SiteUpdate(true),
            Watch::templates(["default"]),
            Watch::Pages(PageWatch::ids(["a"])),
        ];
        let ordered = canonical_order(specs);
        let names: Vec<String> = ordered.iter().map(|w| format!("{w:?}")).collect();

        assert!(names[0].starts_with("Pages"));
        assert!(names[1].starts_with("Collections"));
        assert!(names[2].starts_with("SiteUpdate"));
        assert!(names[3].starts_with("Templates"));
        assert!(names[4].starts_with("Snippets"));
        assert_eq!(names[5], "SiteModified");
        assert!(names[6].starts_with("Custom"));
    }

    #[test]
    fn canonical_order_is_stable_within_a_rank() {
        let specs = vec![
            Watch::collections(["first"]),
            Watch::custom("x", |_| false),
            Watch::collections(["second"]),
            Watch::custom("y", |_| false),
        ];
        let ordered = canonical_order(specs);
        assert_eq!(
            format!("{:?}", ordered[0]),
            r#"Collections(["first"])"#
        );
        assert_eq!(
            format!("{:?}", ordered[1]),
            r#"Collections(["second"])"#
        );
        assert_eq!(format!("{:?}", ordered[2]), r#"Custom { name: "x" }"#);
        assert_eq!(format!("{:?}", ordered[3]), r#"Custom { name: "y" }"#);
    }

    #[test]
    fn verdict_is_order_independent() {
        let index = sample_index();

        let forward = vec![
            Watch::Pages(PageWatch::ids(["uuid-a"])),
            Watch::SiteModified,
        ];
        let backward = vec![
            Watch::SiteModified,
            Watch::Pages(PageWatch::ids(["uuid-a"])),
        ];

        for specs in [forward, backward] {
            let ordered = canonical_order(specs);
            let context = ctx(&index, Some(100));
            let stale = ordered.iter().any(|w| w.is_stale(&context));
            assert!(stale);
        }
    }
}
