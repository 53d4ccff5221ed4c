//! Group membership and group parent edges.
//!
//! Lookups here are deliberately database-wide: group members may live in a
//! document imported years earlier. Nested groups defer until the inner
//! group's own edges are resolved, which lets legitimate hierarchies
//! converge over several passes while a genuine cycle stalls and is caught
//! by the splitter's non-progress check.

use parking_lot::Mutex;

use crate::batch::StatementBatch;
use crate::cache::IdKind;
use crate::context::ResolverContext;
use crate::error::XlinkError;
use crate::item::{GroupMemberXlink, Xlink};
use crate::resolve::Resolution;

struct State {
    members: StatementBatch,
    parents: StatementBatch,
}

pub struct GroupResolver {
    state: Mutex<State>,
}

impl GroupResolver {
    pub fn new(ctx: &ResolverContext) -> Self {
        let limit = ctx.batch_size();
        Self {
            state: Mutex::new(State {
                members: StatementBatch::new(
                    ctx.dialect().insert_group_member(ctx.schema()),
                    limit,
                ),
                parents: StatementBatch::new(
                    ctx.dialect().update_group_parent(ctx.schema()),
                    limit,
                ),
            }),
        }
    }

    pub fn apply(
        &self,
        ctx: &ResolverContext,
        item: &GroupMemberXlink,
    ) -> Result<bool, XlinkError> {
        let resolved = match ctx.resolve(&item.gml_id, IdKind::CityObject, true)? {
            Resolution::Resolved(entry) => entry,
            _ => {
                ctx.warn(&format!(
                    "group {} references {} which exists neither in the document nor in the database",
                    item.group_id, item.gml_id
                ));
                return Ok(false);
            }
        };

        // A member that is itself a group with unresolved edges of the same
        // direction must wait for a later pass; inserting now would either
        // duplicate the edge or close a cycle.
        if ctx.is_group_class(resolved.class_id)
            && ctx.pending_group_edge(resolved.id, item.is_parent)
        {
            ctx.resubmit(Xlink::GroupMember(item.clone()));
            return Ok(true);
        }

        let mut state = self.state.lock();
        if item.is_parent {
            state
                .parents
                .push(ctx.executor(), vec![resolved.id.into(), item.group_id.into()])?;
        } else {
            state.members.push(
                ctx.executor(),
                vec![
                    item.group_id.into(),
                    resolved.id.into(),
                    item.role.clone().into(),
                ],
            )?;
        }
        Ok(true)
    }
}

impl super::StatementLifecycle for GroupResolver {
    fn flush(&self, ctx: &ResolverContext) -> Result<(), XlinkError> {
        let mut state = self.state.lock();
        state.members.flush(ctx.executor())?;
        state.parents.flush(ctx.executor())?;
        Ok(())
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.members.release();
        state.parents.release();
    }
}
