//! Per-category staging areas.
//!
//! The staging area is an explicit queue/arena with a generation counter:
//! each fix-point pass snapshots the current contents into an indexed
//! mirror, truncates the live queue (bumping the generation), and replays
//! the mirror while in-flight re-submissions append to the now-empty queue.
//! Truncation followed by concurrent appends is safe; the queue behaves
//! like a concurrent deque throughout.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::item::{Xlink, XlinkCategory};

#[derive(Default)]
pub struct StagingArea {
    queue: Mutex<VecDeque<Xlink>>,
    generation: AtomicU64,
}

impl StagingArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, item: Xlink) {
        self.queue.lock().push_back(item);
    }

    pub fn size(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Pass counter; bumped on every truncation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn truncate(&self) {
        self.queue.lock().clear();
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Drain everything for a single-pass category.
    pub fn take_all(&self) -> Vec<Xlink> {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.queue.lock().drain(..).collect()
    }

    /// Snapshot the current contents and build the secondary indexes the
    /// self-referential categories probe during a pass.
    pub fn mirror_and_index(&self) -> StagingMirror {
        let records: Vec<Xlink> = self.queue.lock().iter().cloned().collect();

        let mut pending_roots = HashSet::new();
        let mut pending_group_edges = HashSet::new();
        for record in &records {
            match record {
                Xlink::SurfaceGeometry(x) => {
                    pending_roots.insert(x.root_id);
                }
                Xlink::GroupMember(x) => {
                    pending_group_edges.insert((x.group_id, x.is_parent));
                }
                _ => {}
            }
        }

        StagingMirror {
            generation: self.generation(),
            records,
            pending_roots,
            pending_group_edges,
        }
    }
}

/// Immutable snapshot of one staging area, taken at the top of a pass.
pub struct StagingMirror {
    generation: u64,
    records: Vec<Xlink>,
    pending_roots: HashSet<i64>,
    pending_group_edges: HashSet<(i64, bool)>,
}

impl StagingMirror {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn records(&self) -> &[Xlink] {
        &self.records
    }

    /// Whether a geometry subtree rooted at `root_id` still has unresolved
    /// references in this pass.
    pub fn has_pending_root(&self, root_id: i64) -> bool {
        self.pending_roots.contains(&root_id)
    }

    /// Whether `group_id` still owns an unresolved membership edge of the
    /// given direction in this pass.
    pub fn has_pending_group_edge(&self, group_id: i64, is_parent: bool) -> bool {
        self.pending_group_edges.contains(&(group_id, is_parent))
    }
}

/// Lazily creates one staging area per category on first deferral.
#[derive(Default)]
pub struct StagingRegistry {
    areas: DashMap<XlinkCategory, Arc<StagingArea>>,
}

impl StagingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn area(&self, category: XlinkCategory) -> Arc<StagingArea> {
        self.areas
            .entry(category)
            .or_insert_with(|| Arc::new(StagingArea::new()))
            .clone()
    }

    /// The area for `category`, if anything was ever deferred into it.
    pub fn get(&self, category: XlinkCategory) -> Option<Arc<StagingArea>> {
        self.areas.get(&category).map(|area| area.clone())
    }

    pub fn defer(&self, item: Xlink) {
        self.area(item.category()).append(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SolidGeometryXlink;

    fn solid(id: i64) -> Xlink {
        Xlink::SolidGeometry(SolidGeometryXlink { id })
    }

    #[test]
    fn truncate_then_append_keeps_new_items() {
        let area = StagingArea::new();
        area.append(solid(1));
        area.append(solid(2));

        let mirror = area.mirror_and_index();
        area.truncate();
        // Re-submission lands after truncation, like a worker re-queuing
        // mid-pass.
        area.append(solid(3));

        assert_eq!(mirror.len(), 2);
        assert_eq!(area.size(), 1);
        assert_eq!(area.generation(), 1);
    }

    #[test]
    fn mirror_indexes_geometry_roots_and_group_edges() {
        use crate::item::{GroupMemberXlink, SurfaceGeometryXlink};

        let area = StagingArea::new();
        area.append(Xlink::SurfaceGeometry(SurfaceGeometryXlink {
            id: 10,
            parent_id: None,
            root_id: 10,
            reverse: false,
            gml_id: "g".into(),
            cityobject_id: None,
            origin: None,
        }));
        area.append(Xlink::GroupMember(GroupMemberXlink {
            group_id: 7,
            gml_id: "m".into(),
            role: None,
            is_parent: false,
        }));

        let mirror = area.mirror_and_index();
        assert!(mirror.has_pending_root(10));
        assert!(!mirror.has_pending_root(11));
        assert!(mirror.has_pending_group_edge(7, false));
        assert!(!mirror.has_pending_group_edge(7, true));
    }

    #[test]
    fn registry_creates_areas_lazily() {
        let registry = StagingRegistry::new();
        assert!(registry.get(XlinkCategory::SolidGeometry).is_none());

        registry.defer(solid(1));
        let area = registry.get(XlinkCategory::SolidGeometry).unwrap();
        assert_eq!(area.size(), 1);
    }
}
