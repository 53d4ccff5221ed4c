//! Executor surface the engine writes through.
//!
//! Mirrors the classic `execute(sql, params)` backend contract: statement
//! text plus positional values, nothing driver-specific. Batched execution
//! reuses one statement text for many rows so drivers can prepare once.

use std::fmt;

/// A positional SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

pub type SqlRow = Vec<SqlValue>;

impl SqlValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// `NULL`-tolerant integer read.
    pub fn as_opt_i64(&self) -> Option<Option<i64>> {
        match self {
            SqlValue::Null => Some(None),
            SqlValue::Integer(v) => Some(Some(*v)),
            _ => None,
        }
    }

    /// Integers are the wire form of booleans in this schema.
    pub fn as_bool(&self) -> Option<bool> {
        self.as_i64().map(|v| v != 0)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_opt_str(&self) -> Option<Option<&str>> {
        match self {
            SqlValue::Null => Some(None),
            SqlValue::Text(s) => Some(Some(s.as_str())),
            _ => None,
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(v: Option<i64>) -> Self {
        v.map(SqlValue::Integer).unwrap_or(SqlValue::Null)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        v.map(SqlValue::Text).unwrap_or(SqlValue::Null)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

/// Failure raised by the storage layer or while decoding its rows.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct DbError {
    pub message: String,
}

impl DbError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn decode(context: impl fmt::Display) -> Self {
        Self {
            message: format!("unexpected row shape: {context}"),
        }
    }
}

/// The single write/read channel shared by every category resolver.
///
/// Implementations are expected to serialize writes internally; the engine
/// imposes its own cross-category ordering on top and never relies on
/// transaction isolation between categories.
pub trait SqlExecutor: Send + Sync {
    /// Execute one statement, returning the number of affected rows.
    fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64, DbError>;

    /// Execute one statement once per row, in order.
    fn execute_batch(&self, sql: &str, rows: &[SqlRow]) -> Result<(), DbError>;

    /// Run a read query and materialize all rows.
    fn query(&self, sql: &str, params: &[SqlValue]) -> Result<Vec<SqlRow>, DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_accessors_reject_mismatched_types() {
        assert_eq!(SqlValue::Integer(7).as_i64(), Some(7));
        assert_eq!(SqlValue::Text("7".into()).as_i64(), None);
        assert_eq!(SqlValue::Null.as_opt_i64(), Some(None));
        assert_eq!(SqlValue::Null.as_opt_str(), Some(None));
        assert_eq!(SqlValue::Integer(1).as_bool(), Some(true));
        assert_eq!(SqlValue::Integer(0).as_bool(), Some(false));
    }

    #[test]
    fn option_conversions_produce_null() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3_i64)), SqlValue::Integer(3));
    }
}
