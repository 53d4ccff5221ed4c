//! Texture parameterization categories.
//!
//! Three flavors of the same `texture_param` insert: explicit coordinate
//! lists targeting a ring, world-to-texture transforms targeting a surface,
//! and associations that copy another surface-data's parameterization
//! wholesale.

use parking_lot::Mutex;

use citybase_schema::{DbError, SqlValue};

use crate::batch::StatementBatch;
use crate::cache::IdKind;
use crate::context::ResolverContext;
use crate::error::XlinkError;
use crate::item::{
    strip_reference_marker, TextureAssociationXlink, TextureCoordListXlink, TextureParamXlink,
};
use crate::resolve::Resolution;

pub struct TextureCoordResolver {
    state: Mutex<StatementBatch>,
}

impl TextureCoordResolver {
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
        item: &TextureCoordListXlink,
    ) -> Result<bool, XlinkError> {
        let resolved = match ctx.resolve(&item.gml_id, IdKind::Geometry, false)? {
            Resolution::Resolved(entry) => entry,
            _ => {
                ctx.warn(&format!(
                    "texture coordinates of surface data {} target unknown ring {}",
                    item.surface_data_id, item.gml_id
                ));
                return Ok(false);
            }
        };

        let coords = serde_json::to_string(&item.coords)
            .map_err(|e| DbError::new(format!("texture coordinates encode: {e}")))?;
        self.state.lock().push(
            ctx.executor(),
            vec![
                resolved.id.into(),
                item.surface_data_id.into(),
                true.into(),
                SqlValue::Null,
                coords.into(),
            ],
        )?;
        Ok(true)
    }
}

impl super::StatementLifecycle for TextureCoordResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        self.state.lock().flush(ctx.executor())?;
        Ok(())
    }

    fn release(&self) {
        self.state.lock().release();
    }
}

pub struct TextureParamResolver {
    state: Mutex<StatementBatch>,
}

impl TextureParamResolver {
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
        item: &TextureParamXlink,
    ) -> Result<bool, XlinkError> {
        let resolved = match ctx.resolve(&item.gml_id, IdKind::Geometry, false)? {
            Resolution::Resolved(entry) => entry,
            _ => {
                ctx.warn(&format!(
                    "texture parameterization of surface data {} targets unknown surface {}",
                    item.surface_data_id, item.gml_id
                ));
                return Ok(false);
            }
        };

        self.state.lock().push(
            ctx.executor(),
            vec![
                resolved.id.into(),
                item.surface_data_id.into(),
                true.into(),
                item.world_to_texture.clone().into(),
                SqlValue::Null,
            ],
        )?;
        Ok(true)
    }
}

impl super::StatementLifecycle for TextureParamResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        self.state.lock().flush(ctx.executor())?;
        Ok(())
    }

    fn release(&self) {
        self.state.lock().release();
    }
}

pub struct TextureAssociationResolver {
    select_target: String,
    select_params: String,
    state: Mutex<StatementBatch>,
}

impl TextureAssociationResolver {
    pub fn new(ctx: &ResolverContext) -> Self {
        Self {
            select_target: ctx.dialect().select_surface_data_by_gmlid(ctx.schema()),
            select_params: ctx
                .dialect()
                .select_texture_params_by_surface_data(ctx.schema()),
            state: Mutex::new(StatementBatch::new(
                ctx.dialect().insert_texture_param(ctx.schema()),
                ctx.batch_size(),
            )),
        }
    }

    pub fn apply(
        &self,
        ctx: &ResolverContext,
        item: &TextureAssociationXlink,
    ) -> Result<bool, XlinkError> {
        let target = strip_reference_marker(&item.gml_id);
        let rows = ctx
            .executor()
            .query(&self.select_target, &[SqlValue::Text(target.to_string())])?;
        let Some(target_id) = rows.first().and_then(|row| row.first()).and_then(|v| v.as_i64())
        else {
            ctx.warn(&format!(
                "texture association of surface data {} targets unknown surface data {}",
                item.surface_data_id, item.gml_id
            ));
            return Ok(false);
        };

        let params = ctx
            .executor()
            .query(&self.select_params, &[SqlValue::Integer(target_id)])?;
        if params.is_empty() {
            ctx.warn(&format!(
                "surface data {} has no parameterization to share with {}",
                item.gml_id, item.surface_data_id
            ));
            return Ok(false);
        }

        let mut state = self.state.lock();
        for row in params {
            let mut copy = row;
            // (surface_geometry_id, is_texture_parametrization,
            // world_to_texture, texture_coordinates) re-bound to the
            // referencing surface data.
            copy.insert(1, item.surface_data_id.into());
            state.push(ctx.executor(), copy)?;
        }
        Ok(true)
    }
}

impl super::StatementLifecycle for TextureAssociationResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        self.state.lock().flush(ctx.executor())?;
        Ok(())
    }

    fn release(&self) {
        self.state.lock().release();
    }
}
