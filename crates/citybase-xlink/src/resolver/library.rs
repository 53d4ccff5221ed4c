//! Library object import.
//!
//! Prototype geometries referenced by URI; the bytes land in the
//! `implicit_geometry` row that referenced them.

use std::io::Read;

use parking_lot::Mutex;

use crate::batch::StatementBatch;
use crate::context::ResolverContext;
use crate::error::XlinkError;
use crate::item::LibraryObjectXlink;

pub struct LibraryObjectResolver {
    state: Mutex<StatementBatch>,
}

impl LibraryObjectResolver {
    pub fn new(ctx: &ResolverContext) -> Self {
        Self {
            state: Mutex::new(StatementBatch::new(
                ctx.dialect().update_library_object(ctx.schema()),
                ctx.batch_size(),
            )),
        }
    }

    pub fn apply(
        &self,
        ctx: &ResolverContext,
        item: &LibraryObjectXlink,
    ) -> Result<bool, XlinkError> {
        let mut bytes = Vec::new();
        match ctx.open_payload(&item.uri) {
            Ok(mut stream) => {
                if let Err(e) = stream.read_to_end(&mut bytes) {
                    ctx.warn(&format!("library object {}: {e}", item.uri));
                    return Ok(false);
                }
            }
            Err(e) => {
                ctx.warn(&format!("library object {}: {e}", item.uri));
                return Ok(false);
            }
        }

        self.state
            .lock()
            .push(ctx.executor(), vec![bytes.into(), item.row_id.into()])?;
        Ok(true)
    }
}

impl super::StatementLifecycle for LibraryObjectResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        self.state.lock().flush(ctx.executor())?;
        Ok(())
    }

    fn release(&self) {
        self.state.lock().release();
    }
}
