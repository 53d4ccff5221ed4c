//! Engine error type.
//!
//! Only two failure classes unwind out of the engine: storage/adapter
//! failures and inconsistent structural reads. Everything else (references
//! that are not yet resolvable, malformed targets, cycles left after a
//! fix-point) is recovered internally and surfaces through the event sink.

use citybase_schema::DbError;

#[derive(Debug, thiserror::Error)]
pub enum XlinkError {
    #[error("storage failure: {0}")]
    Storage(#[from] DbError),

    #[error("geometry subtree under root {root_id} is inconsistent: {reason}")]
    CorruptSubtree { root_id: i64, reason: String },
}
