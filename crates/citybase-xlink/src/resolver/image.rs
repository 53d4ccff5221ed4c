//! Texture image import.
//!
//! Images are read through the payload opener, de-duplicated by URI, and
//! inserted once; linking `surface_data.tex_image_id` is a separate step
//! the splitter runs after the phase drains, so every image row exists
//! before the first link update executes.

use std::collections::HashMap;
use std::io::Read;

use parking_lot::Mutex;

use citybase_schema::SequenceKind;

use crate::batch::StatementBatch;
use crate::context::ResolverContext;
use crate::error::XlinkError;
use crate::item::TextureImageXlink;

struct State {
    inserts: StatementBatch,
    by_uri: HashMap<String, i64>,
    pending_links: Vec<(i64, i64)>,
}

pub struct TextureImageResolver {
    link_sql: String,
    limit: usize,
    state: Mutex<State>,
}

impl TextureImageResolver {
    pub fn new(ctx: &ResolverContext) -> Self {
        Self {
            link_sql: ctx.dialect().update_surface_data_image(ctx.schema()),
            limit: ctx.batch_size(),
            state: Mutex::new(State {
                inserts: StatementBatch::new(
                    ctx.dialect().insert_tex_image(ctx.schema()),
                    ctx.batch_size(),
                ),
                by_uri: HashMap::new(),
                pending_links: Vec::new(),
            }),
        }
    }

    pub fn apply(
        &self,
        ctx: &ResolverContext,
        item: &TextureImageXlink,
    ) -> Result<bool, XlinkError> {
        {
            let mut state = self.state.lock();
            if let Some(image_id) = state.by_uri.get(&item.uri).copied() {
                state.pending_links.push((image_id, item.surface_data_id));
                return Ok(true);
            }
        }

        // Read outside the lock; two workers may race on the same URI and
        // the loser's bytes are discarded below.
        let mut bytes = Vec::new();
        match ctx.open_payload(&item.uri) {
            Ok(mut stream) => {
                if let Err(e) = stream.read_to_end(&mut bytes) {
                    ctx.warn(&format!("texture image {}: {e}", item.uri));
                    return Ok(false);
                }
            }
            Err(e) => {
                ctx.warn(&format!("texture image {}: {e}", item.uri));
                return Ok(false);
            }
        }

        let allocated = ctx.next_value(SequenceKind::TexImage)?;
        let mut state = self.state.lock();
        let image_id = match state.by_uri.get(&item.uri).copied() {
            Some(existing) => existing,
            None => {
                state.by_uri.insert(item.uri.clone(), allocated);
                state.inserts.push(
                    ctx.executor(),
                    vec![allocated.into(), item.uri.as_str().into(), bytes.into()],
                )?;
                allocated
            }
        };
        state.pending_links.push((image_id, item.surface_data_id));
        Ok(true)
    }

    /// Flush remaining image inserts, then point every recorded
    /// `surface_data` row at its image.
    pub fn link_surface_data(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        let mut state = self.state.lock();
        state.inserts.flush(ctx.executor())?;

        let mut links = StatementBatch::new(self.link_sql.clone(), self.limit);
        for (image_id, surface_data_id) in state.pending_links.drain(..) {
            links.push(ctx.executor(), vec![image_id.into(), surface_data_id.into()])?;
        }
        links.flush(ctx.executor())?;
        Ok(())
    }
}

impl super::StatementLifecycle for TextureImageResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        self.link_surface_data(ctx)
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.inserts.release();
        state.pending_links.clear();
    }
}
