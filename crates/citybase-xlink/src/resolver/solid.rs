//! Solid geometry rebuild.
//!
//! Runs after every surface xlink is flattened: only then is the tree under
//! a solid root complete. The composed shell collection is written back
//! onto the root row so exporters and spatial indexing read one payload
//! instead of re-walking the hierarchy.

use parking_lot::Mutex;

use citybase_schema::geom::encode_solid;
use citybase_schema::Solid;

use crate::batch::StatementBatch;
use crate::context::ResolverContext;
use crate::error::XlinkError;
use crate::geometry::build_subtree;
use crate::item::SolidGeometryXlink;

pub struct SolidGeometryResolver {
    subtree_sql: String,
    state: Mutex<StatementBatch>,
}

impl SolidGeometryResolver {
    pub fn new(ctx: &ResolverContext) -> Self {
        Self {
            subtree_sql: ctx.dialect().select_geometry_subtree(ctx.schema()),
            state: Mutex::new(StatementBatch::new(
                ctx.dialect().update_solid_geometry(ctx.schema()),
                ctx.batch_size(),
            )),
        }
    }

    pub fn apply(
        &self,
        ctx: &ResolverContext,
        item: &SolidGeometryXlink,
    ) -> Result<bool, XlinkError> {
        let rows = ctx.executor().query(&self.subtree_sql, &[item.id.into()])?;
        if rows.is_empty() {
            ctx.warn(&format!("solid geometry {} has no rows", item.id));
            return Ok(false);
        }

        let tree = build_subtree(item.id, &rows)?;
        let mut leaves = Vec::new();
        tree.collect_leaves(&mut leaves);
        let Some(first) = leaves.first() else {
            ctx.warn(&format!(
                "solid geometry {} has no member polygons, nothing to rebuild",
                item.id
            ));
            return Ok(false);
        };

        let solid = Solid {
            srid: first.srid,
            dim: first.dim,
            shells: leaves.iter().map(|polygon| polygon.rings.clone()).collect(),
        };
        self.state.lock().push(
            ctx.executor(),
            vec![encode_solid(&solid)?, item.id.into()],
        )?;
        Ok(true)
    }
}

impl super::StatementLifecycle for SolidGeometryResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        self.state.lock().flush(ctx.executor())?;
        Ok(())
    }

    fn release(&self) {
        self.state.lock().release();
    }
}
