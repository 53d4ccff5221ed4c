//! Observability side channel and cooperative cancellation.
//!
//! Phase starts, per-item ticks, and warnings are events, not part of the
//! resolution contract; nothing in the engine branches on what a sink does
//! with them. Cancellation flows the other way: whoever holds a clone of
//! the token can ask the splitter to wind down at the next safe point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait EventSink: Send + Sync {
    /// A phase (or one pass of a recursive phase) is about to replay
    /// `pending` records.
    fn phase_started(&self, label: &str, pending: usize);

    /// One record reached a terminal outcome for this pass.
    fn item_finished(&self);

    fn warn(&self, message: &str);

    fn error(&self, message: &str);
}

/// Forwards events to `tracing`. Progress ticks are dropped; they only
/// matter to interactive front ends.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn phase_started(&self, label: &str, pending: usize) {
        tracing::info!(pending, "{label}");
    }

    fn item_finished(&self) {}

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}

/// Swallows everything. Useful for embedding and tests.
pub struct NullSink;

impl EventSink for NullSink {
    fn phase_started(&self, _label: &str, _pending: usize) {}
    fn item_finished(&self) {}
    fn warn(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}

/// Cooperative interrupt flag, checked before every staging read and inside
/// every per-record loop.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
