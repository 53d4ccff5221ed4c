//! Sequence-value allocation.
//!
//! Copied geometry nodes and imported texture images need fresh row ids at
//! resolution time, long after the streaming pass allocated its own. The
//! trait keeps the engine indifferent to where values come from: a real
//! database sequence, or process-local atomics for embedded runs and tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::db::{DbError, SqlExecutor};
use crate::{Schema, SequenceKind, SqlDialect};

pub trait IdAllocator: Send + Sync {
    fn next_value(&self, seq: SequenceKind) -> Result<i64, DbError>;
}

/// Allocates from real database sequences through the shared executor.
pub struct SqlSequenceAllocator {
    executor: Arc<dyn SqlExecutor>,
    schema: Schema,
    dialect: SqlDialect,
}

impl SqlSequenceAllocator {
    pub fn new(executor: Arc<dyn SqlExecutor>, schema: Schema, dialect: SqlDialect) -> Self {
        Self {
            executor,
            schema,
            dialect,
        }
    }
}

impl IdAllocator for SqlSequenceAllocator {
    fn next_value(&self, seq: SequenceKind) -> Result<i64, DbError> {
        let sql = self.dialect.next_sequence_value(&self.schema, seq);
        let rows = self.executor.query(&sql, &[])?;
        rows.first()
            .and_then(|row| row.first())
            .and_then(|v| v.as_i64())
            .ok_or_else(|| DbError::new(format!("sequence {} returned no value", seq.sequence_name())))
    }
}

/// Process-local allocator backed by one atomic counter per sequence.
#[derive(Default)]
pub struct MemoryIdAllocator {
    counters: DashMap<SequenceKind, AtomicI64>,
}

impl MemoryIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position `seq` so its next allocated value is `next`.
    pub fn seed(&self, seq: SequenceKind, next: i64) {
        self.counters.insert(seq, AtomicI64::new(next));
    }
}

impl IdAllocator for MemoryIdAllocator {
    fn next_value(&self, seq: SequenceKind) -> Result<i64, DbError> {
        let counter = self.counters.entry(seq).or_insert_with(|| AtomicI64::new(1));
        Ok(counter.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_allocator_counts_per_sequence() {
        let ids = MemoryIdAllocator::new();
        ids.seed(SequenceKind::SurfaceGeometry, 100);

        assert_eq!(ids.next_value(SequenceKind::SurfaceGeometry).unwrap(), 100);
        assert_eq!(ids.next_value(SequenceKind::SurfaceGeometry).unwrap(), 101);
        // Unseeded sequences start at 1 and do not share the counter.
        assert_eq!(ids.next_value(SequenceKind::TexImage).unwrap(), 1);
    }
}
