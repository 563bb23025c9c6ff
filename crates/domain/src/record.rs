//! Closed set of persistable kinds and the records that carry them.
//!
//! An application declares one `EntityKind` enum listing every aggregate and
//! entity type it persists, and one `Record` enum with a variant per kind.
//! Repositories are resolved by kind, and the exhaustive `all()` list lets the
//! repository registry be checked for completeness at startup.

use common::EntityKey;

/// Tag identifying a persisted aggregate or entity type.
pub trait EntityKind:
    Copy + Eq + std::hash::Hash + std::fmt::Debug + std::fmt::Display + Send + Sync + 'static
{
    /// Every kind known to the application.
    fn all() -> &'static [Self];

    /// Stable, human-readable name of the kind.
    fn name(&self) -> &'static str;
}

/// A persistable value: one variant per [`EntityKind`].
pub trait Record: Clone + std::fmt::Debug + Send + Sync + 'static {
    type Kind: EntityKind;

    /// The kind of the wrapped entity.
    fn kind(&self) -> Self::Kind;

    /// Canonical identity key of the wrapped entity.
    fn key(&self) -> EntityKey;
}
