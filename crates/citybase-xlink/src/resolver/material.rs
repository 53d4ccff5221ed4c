//! Legacy (deprecated) material bindings.
//!
//! CityGML 1.0 textured surfaces carried their material inline; the import
//! pass converts them into appearance + surface-data rows and defers the
//! binding to the target surface, which resolves here once all appearance
//! rows exist.

use parking_lot::Mutex;

use citybase_schema::SqlValue;

use crate::batch::StatementBatch;
use crate::cache::IdKind;
use crate::context::ResolverContext;
use crate::error::XlinkError;
use crate::item::DeprecatedMaterialXlink;
use crate::resolve::Resolution;

pub struct DeprecatedMaterialResolver {
    state: Mutex<StatementBatch>,
}

impl DeprecatedMaterialResolver {
    pub fn new(ctx: &ResolverContext) -> Self {
        Self {
            state: Mutex::new(StatementBatch::new(
                ctx.dialect().insert_texture_param(ctx.schema()),
                ctx.batch_size(),
            )),
        }
    }

    pub fn apply(
        &self,
        ctx: &ResolverContext,
        item: &DeprecatedMaterialXlink,
    ) -> Result<bool, XlinkError> {
        let resolved = match ctx.resolve(&item.gml_id, IdKind::Geometry, false)? {
            Resolution::Resolved(entry) => entry,
            _ => {
                ctx.warn(&format!(
                    "legacy material of appearance {} targets unknown surface {}",
                    item.appearance_id, item.gml_id
                ));
                return Ok(false);
            }
        };

        self.state.lock().push(
            ctx.executor(),
            vec![
                resolved.id.into(),
                item.surface_data_id.into(),
                false.into(),
                SqlValue::Null,
                SqlValue::Null,
            ],
        )?;
        Ok(true)
    }
}

impl super::StatementLifecycle for DeprecatedMaterialResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        self.state.lock().flush(ctx.executor())?;
        Ok(())
    }

    fn release(&self) {
        self.state.lock().release();
    }
}
