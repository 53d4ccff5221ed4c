//! Identifier cache collaborator.
//!
//! Populated upstream while the streaming pass writes rows; the engine only
//! ever reads it. An entry either carries a resolved row id or maps the
//! identifier onto another one ("same geometry as X, possibly mirrored"),
//! which the resolver chases at lookup time.

use dashmap::DashMap;

/// Which id namespace a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    CityObject,
    Geometry,
}

/// A fully resolved identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub id: i64,
    /// Top of the subtree for hierarchical entities; equals `id` otherwise.
    pub root_id: i64,
    pub class_id: i32,
    pub reverse: bool,
}

/// An identifier defined as "same as `target`", orientation-flipped when
/// `reverse` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedEntry {
    pub target: String,
    pub reverse: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdEntry {
    Resolved(ResolvedEntry),
    Mapped(MappedEntry),
}

/// Read-only cache surface the resolver probes.
pub trait IdLookup: Send + Sync {
    fn get(&self, kind: IdKind, external_id: &str) -> Option<IdEntry>;
}

/// Concurrent in-memory cache, one map per id namespace.
#[derive(Default)]
pub struct MemoryIdCache {
    objects: DashMap<String, IdEntry>,
    geometries: DashMap<String, IdEntry>,
}

impl MemoryIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: IdKind, external_id: impl Into<String>, entry: IdEntry) {
        match kind {
            IdKind::CityObject => self.objects.insert(external_id.into(), entry),
            IdKind::Geometry => self.geometries.insert(external_id.into(), entry),
        };
    }
}

impl IdLookup for MemoryIdCache {
    fn get(&self, kind: IdKind, external_id: &str) -> Option<IdEntry> {
        let map = match kind {
            IdKind::CityObject => &self.objects,
            IdKind::Geometry => &self.geometries,
        };
        map.get(external_id).map(|entry| entry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_do_not_alias() {
        let cache = MemoryIdCache::new();
        cache.insert(
            IdKind::Geometry,
            "g1",
            IdEntry::Resolved(ResolvedEntry {
                id: 5,
                root_id: 5,
                class_id: 0,
                reverse: false,
            }),
        );

        assert!(cache.get(IdKind::Geometry, "g1").is_some());
        assert!(cache.get(IdKind::CityObject, "g1").is_none());
    }
}
