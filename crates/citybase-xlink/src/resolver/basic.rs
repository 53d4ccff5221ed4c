//! Plain foreign-key patches.
//!
//! The same category serves many origin tables, so the update statements
//! are keyed by (table, column).

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::batch::StatementBatch;
use crate::cache::IdKind;
use crate::context::ResolverContext;
use crate::error::XlinkError;
use crate::item::BasicXlink;
use crate::resolve::Resolution;

pub struct BasicResolver {
    state: Mutex<HashMap<(String, String), StatementBatch>>,
}

impl BasicResolver {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
        }
    }

    pub fn apply(&self, ctx: &ResolverContext, item: &BasicXlink) -> Result<bool, XlinkError> {
        let resolved = match ctx.resolve(&item.gml_id, IdKind::CityObject, false)? {
            Resolution::Resolved(entry) => entry,
            _ => {
                ctx.warn(&format!(
                    "reference {} for {}.{} (row {}) could not be resolved",
                    item.gml_id, item.table, item.column, item.row_id
                ));
                return Ok(false);
            }
        };

        let mut state = self.state.lock();
        let batch = state
            .entry((item.table.clone(), item.column.clone()))
            .or_insert_with(|| {
                let sql =
                    ctx.dialect()
                        .update_reference_column(ctx.schema(), &item.table, &item.column);
                StatementBatch::new(sql, ctx.batch_size())
            });
        batch.push(ctx.executor(), vec![resolved.id.into(), item.row_id.into()])?;
        Ok(true)
    }
}

impl super::StatementLifecycle for BasicResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        let mut state = self.state.lock();
        for batch in state.values_mut() {
            batch.flush(ctx.executor())?;
        }
        Ok(())
    }

    fn release(&self) {
        self.state.lock().clear();
    }
}
