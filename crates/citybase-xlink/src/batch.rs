//! Buffered batched statements.
//!
//! One `StatementBatch` pairs a statement text with its buffered parameter
//! rows. Resolvers either push with auto-flush (the common case) or buffer
//! explicitly and flush several batches as a unit under their own lock.

use citybase_schema::{DbError, SqlExecutor, SqlRow};

pub struct StatementBatch {
    sql: String,
    rows: Vec<SqlRow>,
    limit: usize,
}

impl StatementBatch {
    pub fn new(sql: String, limit: usize) -> Self {
        Self {
            sql,
            rows: Vec::new(),
            limit: limit.max(1),
        }
    }

    /// Buffer a row and flush if the batch limit is reached.
    pub fn push(&mut self, executor: &dyn SqlExecutor, row: SqlRow) -> Result<(), DbError> {
        self.rows.push(row);
        if self.rows.len() >= self.limit {
            self.flush(executor)?;
        }
        Ok(())
    }

    /// Buffer a row without checking the limit; the owner flushes on its own
    /// schedule.
    pub fn push_buffered(&mut self, row: SqlRow) {
        self.rows.push(row);
    }

    pub fn flush(&mut self, executor: &dyn SqlExecutor) -> Result<(), DbError> {
        if self.rows.is_empty() {
            return Ok(());
        }
        let rows = std::mem::take(&mut self.rows);
        executor.execute_batch(&self.sql, &rows)
    }

    pub fn pending(&self) -> usize {
        self.rows.len()
    }

    /// Discard buffered rows without executing them.
    pub fn release(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use citybase_schema::SqlValue;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        batches: Mutex<Vec<usize>>,
    }

    impl SqlExecutor for Recording {
        fn execute(&self, _sql: &str, _params: &[SqlValue]) -> Result<u64, DbError> {
            Ok(0)
        }
        fn execute_batch(&self, _sql: &str, rows: &[SqlRow]) -> Result<(), DbError> {
            self.batches.lock().push(rows.len());
            Ok(())
        }
        fn query(&self, _sql: &str, _params: &[SqlValue]) -> Result<Vec<SqlRow>, DbError> {
            Ok(vec![])
        }
    }

    #[test]
    fn auto_flush_at_limit_then_remainder_on_flush() {
        let db = Recording::default();
        let mut batch = StatementBatch::new("INSERT".into(), 2);

        for i in 0..5 {
            batch.push(&db, vec![SqlValue::Integer(i)]).unwrap();
        }
        batch.flush(&db).unwrap();

        assert_eq!(*db.batches.lock(), vec![2, 2, 1]);
        assert_eq!(batch.pending(), 0);
    }

    #[test]
    fn empty_flush_is_a_no_op() {
        let db = Recording::default();
        let mut batch = StatementBatch::new("INSERT".into(), 2);
        batch.flush(&db).unwrap();
        assert!(db.batches.lock().is_empty());
    }
}
