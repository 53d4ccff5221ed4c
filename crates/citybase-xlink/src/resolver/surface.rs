//! Surface geometry deep-copies.
//!
//! A geometry xlink does not mean "point at that row": the relational model
//! stores a geometry as a tree of rows, and every consumer of a shared
//! geometry needs a private copy of that tree so per-consumer attributes
//! stay independent. This resolver reads the referenced subtree back,
//! applies the composed orientation flip, and flattens the copy into fresh
//! rows under the item's pre-allocated root id.
//!
//! The three statement groups (copied rows, origin-column patches, and
//! the "source has a copy" marker) share one lock; the batch threshold is
//! counted per item and flushes all three as a unit.

use std::collections::HashMap;

use parking_lot::Mutex;

use citybase_schema::geom::encode_polygon;
use citybase_schema::{table, SequenceKind, SqlValue};

use crate::batch::StatementBatch;
use crate::cache::IdKind;
use crate::context::ResolverContext;
use crate::error::XlinkError;
use crate::geometry::{build_subtree, GeometryNode};
use crate::item::{is_remote_reference, SurfaceGeometryXlink, Xlink};
use crate::resolve::Resolution;

struct State {
    inserts: StatementBatch,
    origin_updates: HashMap<(String, String), StatementBatch>,
    markers: StatementBatch,
    items_since_flush: usize,
}

pub struct SurfaceGeometryResolver {
    subtree_sql: String,
    limit: usize,
    state: Mutex<State>,
}

impl SurfaceGeometryResolver {
    pub fn new(ctx: &ResolverContext) -> Self {
        Self {
            subtree_sql: ctx.dialect().select_geometry_subtree(ctx.schema()),
            limit: ctx.batch_size(),
            state: Mutex::new(State {
                inserts: StatementBatch::new(
                    ctx.dialect().insert_surface_geometry(ctx.schema()),
                    usize::MAX,
                ),
                origin_updates: HashMap::new(),
                markers: StatementBatch::new(
                    ctx.dialect().update_xlink_marker(ctx.schema()),
                    usize::MAX,
                ),
                items_since_flush: 0,
            }),
        }
    }

    pub fn apply(
        &self,
        ctx: &ResolverContext,
        item: &SurfaceGeometryXlink,
    ) -> Result<bool, XlinkError> {
        let resolution = ctx.resolve(&item.gml_id, IdKind::Geometry, false)?;

        if is_remote_reference(&item.gml_id) {
            ctx.warn(&format!(
                "geometry reference {} points outside the document, skipping",
                item.gml_id
            ));
            return Ok(false);
        }

        let resolved = match resolution {
            Resolution::Resolved(entry) => entry,
            Resolution::Deferred(_) => {
                // The identity chain itself is still incomplete; try again
                // next pass.
                ctx.resubmit(Xlink::SurfaceGeometry(item.clone()));
                return Ok(true);
            }
            Resolution::NotFound => {
                let from_implicit = item
                    .origin
                    .as_ref()
                    .map(|origin| origin.table == table::IMPLICIT_GEOMETRY)
                    .unwrap_or(false);
                if from_implicit {
                    // Implicit geometries may reference a template that never
                    // materializes in this document; that is not an error.
                    return Ok(true);
                }
                ctx.warn(&format!(
                    "geometry reference {} could not be resolved",
                    item.gml_id
                ));
                return Ok(false);
            }
        };

        // The referenced subtree may itself still contain unresolved
        // references; wait for it inside the same fix-point loop.
        if ctx.pending_geometry_root(resolved.root_id) {
            ctx.resubmit(Xlink::SurfaceGeometry(item.clone()));
            return Ok(true);
        }

        let rows = ctx
            .executor()
            .query(&self.subtree_sql, &[resolved.root_id.into()])?;
        if rows.is_empty() {
            ctx.warn(&format!(
                "geometry reference {} resolves to root {} which has no rows",
                item.gml_id, resolved.root_id
            ));
            return Ok(false);
        }

        let tree = build_subtree(resolved.root_id, &rows)?;
        let mut copy = tree
            .into_subtree(resolved.id)
            .ok_or_else(|| XlinkError::CorruptSubtree {
                root_id: resolved.root_id,
                reason: format!("referenced node {} not in its hierarchy", resolved.id),
            })?;

        if item.reverse ^ resolved.reverse {
            copy.apply_reversal();
        }

        let root_id = if item.parent_id.is_some() {
            item.root_id
        } else {
            item.id
        };

        let mut state = self.state.lock();
        write_copy(
            ctx,
            &mut state.inserts,
            &copy,
            item.id,
            item.parent_id,
            root_id,
            item.cityobject_id,
        )?;

        if let Some(origin) = &item.origin {
            let batch = state
                .origin_updates
                .entry((origin.table.clone(), origin.column.clone()))
                .or_insert_with(|| {
                    let sql = ctx.dialect().update_reference_column(
                        ctx.schema(),
                        &origin.table,
                        &origin.column,
                    );
                    StatementBatch::new(sql, usize::MAX)
                });
            batch.push_buffered(vec![item.id.into(), origin.row_id.into()]);
        }

        state
            .markers
            .push_buffered(vec![resolved.root_id.into()]);

        state.items_since_flush += 1;
        if state.items_since_flush >= self.limit {
            flush_locked(ctx, &mut state)?;
        }
        Ok(true)
    }
}

impl super::StatementLifecycle for SurfaceGeometryResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        let mut state = self.state.lock();
        flush_locked(ctx, &mut state)
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.inserts.release();
        state.origin_updates.clear();
        state.markers.release();
        state.items_since_flush = 0;
    }
}

/// Flatten one copied subtree into insert rows, parents before children.
///
/// The copy root keeps the item's pre-allocated id; every descendant gets a
/// fresh sequence value. Copies are anonymous (no gmlid) and leaf rows
/// carry the xlink marker.
fn write_copy(
    ctx: &ResolverContext,
    inserts: &mut StatementBatch,
    node: &GeometryNode,
    id: i64,
    parent_id: Option<i64>,
    root_id: i64,
    cityobject_id: Option<i64>,
) -> Result<(), XlinkError> {
    let is_leaf = node.payload.is_some();
    let geometry = match &node.payload {
        Some(payload) => encode_polygon(payload)?,
        None => SqlValue::Null,
    };

    inserts.push_buffered(vec![
        id.into(),
        SqlValue::Null,
        parent_id.into(),
        root_id.into(),
        node.is_solid.into(),
        node.is_composite.into(),
        node.is_triangulated.into(),
        is_leaf.into(),
        node.is_reverse.into(),
        cityobject_id.into(),
        geometry,
    ]);

    for child in &node.children {
        let child_id = ctx.next_value(SequenceKind::SurfaceGeometry)?;
        write_copy(ctx, inserts, child, child_id, Some(id), root_id, cityobject_id)?;
    }
    Ok(())
}

fn flush_locked(ctx: &ResolverContext, state: &mut State) -> Result<(), XlinkError> {
    state.inserts.flush(ctx.executor())?;
    for batch in state.origin_updates.values_mut() {
        batch.flush(ctx.executor())?;
    }
    state.markers.flush(ctx.executor())?;
    state.items_since_flush = 0;
    Ok(())
}
