//! Phase orchestration.
//!
//! Replays the staging areas in dependency order: plain feature references
//! first, group membership and surface geometry through a fix-point loop,
//! appearance categories in their internal order with the image link step
//! in between, solids last once every surface xlink is flattened. Each
//! phase drains the worker pool before the next starts; the fix-point loop
//! additionally drains after every pass so the non-progress check sees a
//! settled staging area. Buffered batches flush at the same barriers:
//! later phases (and later passes) read rows the earlier ones wrote, so a
//! subtree read must never miss a buffered copy.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::ResolverContext;
use crate::error::XlinkError;
use crate::events::CancelToken;
use crate::item::{Xlink, XlinkCategory};
use crate::pool::WorkerPool;
use crate::staging::StagingRegistry;

pub struct Splitter {
    ctx: Arc<ResolverContext>,
    staging: Arc<StagingRegistry>,
    pool: WorkerPool,
    cancel: CancelToken,
    fatal: Arc<Mutex<Option<XlinkError>>>,
}

impl Splitter {
    pub fn new(
        ctx: Arc<ResolverContext>,
        staging: Arc<StagingRegistry>,
        worker_threads: usize,
    ) -> Self {
        Self {
            ctx,
            staging,
            pool: WorkerPool::new(worker_threads),
            cancel: CancelToken::new(),
            fatal: Arc::new(Mutex::new(None)),
        }
    }

    /// A handle an external interrupt can use to wind the run down.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Replay every staging area.
    ///
    /// Recovered conditions (unresolvable references, cycles) surface only
    /// through the event sink; the returned error is always a storage or
    /// structural failure, after which no further phase has run. Buffered
    /// batches are flushed on clean completion and resolver resources are
    /// released on every exit path.
    pub fn run(mut self) -> Result<(), XlinkError> {
        let outcome = self.run_phases();
        let outcome = match outcome {
            Ok(()) if !self.cancel.is_interrupted() => self.ctx.flush_all(),
            other => other,
        };
        self.pool.drain_and_stop();
        self.ctx.release_all();
        outcome
    }

    fn run_phases(&self) -> Result<(), XlinkError> {
        self.single_pass(XlinkCategory::Basic)?;
        self.recursive_pass(XlinkCategory::GroupMember)?;

        self.single_pass(XlinkCategory::TextureCoordList)?;
        self.single_pass(XlinkCategory::TextureParam)?;
        self.single_pass(XlinkCategory::TextureImage)?;
        if !self.cancel.is_interrupted() {
            self.ctx.link_texture_images()?;
        }
        self.single_pass(XlinkCategory::TextureAssociation)?;

        self.single_pass(XlinkCategory::LibraryObject)?;
        self.single_pass(XlinkCategory::DeprecatedMaterial)?;

        self.recursive_pass(XlinkCategory::SurfaceGeometry)?;
        self.single_pass(XlinkCategory::SolidGeometry)?;
        Ok(())
    }

    /// Drain one non-recursive category and wait for its items.
    fn single_pass(&self, category: XlinkCategory) -> Result<(), XlinkError> {
        if self.cancel.is_interrupted() {
            return Ok(());
        }
        let Some(area) = self.staging.get(category) else {
            return Ok(());
        };
        let records = area.take_all();
        if records.is_empty() {
            return Ok(());
        }

        self.ctx.events().phase_started(category.label(), records.len());
        for item in records {
            if self.cancel.is_interrupted() {
                break;
            }
            self.dispatch(item);
        }
        self.pool.join();
        self.take_fatal()?;
        if self.cancel.is_interrupted() {
            return Ok(());
        }
        self.ctx.flush_all()
    }

    /// Fix-point replay for a self-referential category.
    ///
    /// Each pass snapshots and truncates the area, replays the snapshot,
    /// and compares the number of re-submitted items against the previous
    /// pass: no progress between two settled passes means the remainder is
    /// a genuine cycle, which is reported once and left unresolved.
    fn recursive_pass(&self, category: XlinkCategory) -> Result<(), XlinkError> {
        let Some(area) = self.staging.get(category) else {
            return Ok(());
        };

        let mut remaining: Option<usize> = None;
        loop {
            if self.cancel.is_interrupted() {
                return Ok(());
            }

            let mirror = Arc::new(area.mirror_and_index());
            area.truncate();
            if mirror.is_empty() {
                return Ok(());
            }

            self.ctx.events().phase_started(category.label(), mirror.len());
            self.ctx.set_pass_snapshot(category, Some(mirror.clone()));
            for item in mirror.records() {
                if self.cancel.is_interrupted() {
                    break;
                }
                self.dispatch(item.clone());
            }
            self.pool.join();
            self.ctx.set_pass_snapshot(category, None);
            self.take_fatal()?;
            if self.cancel.is_interrupted() {
                return Ok(());
            }
            self.ctx.flush_all()?;

            let now = area.size();
            if now == 0 {
                return Ok(());
            }
            if remaining == Some(now) {
                self.ctx.events().error(&format!(
                    "{}: {} unresolved reference(s) form a cycle and cannot be resolved",
                    category.label(),
                    now
                ));
                return Ok(());
            }
            remaining = Some(now);
        }
    }

    fn dispatch(&self, item: Xlink) {
        let ctx = self.ctx.clone();
        let fatal = self.fatal.clone();
        let cancel = self.cancel.clone();
        self.pool.submit(move || {
            if cancel.is_interrupted() {
                return;
            }
            match ctx.apply(item) {
                Ok(_) => ctx.events().item_finished(),
                Err(error) => {
                    let mut slot = fatal.lock();
                    if slot.is_none() {
                        *slot = Some(error);
                    }
                    // A storage failure aborts the whole split.
                    cancel.interrupt();
                }
            }
        });
    }

    fn take_fatal(&self) -> Result<(), XlinkError> {
        match self.fatal.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}
