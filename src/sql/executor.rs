//! Statement execution seam
//!
//! The SQL handler only needs raw rows and column descriptors back from the
//! database. [`SqlExecutor`] is that contract; the PostgreSQL implementation
//! lives in [`super::postgres`], and tests use in-memory executors.

use async_trait::async_trait;
use thiserror::Error;

use crate::convert::ColumnDescriptor;

/// Command tag reported for a statement (`SELECT 3`, `INSERT 0 1`, ...)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTag(pub String);

impl CommandTag {
    pub fn select(rows: usize) -> Self {
        Self(format!("SELECT {}", rows))
    }

    /// Whether the statement returns rows
    pub fn is_select(&self) -> bool {
        self.0
            .split_whitespace()
            .next()
            .map(|verb| verb.eq_ignore_ascii_case("SELECT"))
            .unwrap_or(false)
    }
}

/// Raw cells of one row; `None` is SQL NULL
pub type RawRow = Vec<Option<Vec<u8>>>;

/// Everything one statement produced
#[derive(Debug, Clone, PartialEq)]
pub struct StatementResult {
    pub command_tag: CommandTag,
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<RawRow>,
}

impl StatementResult {
    /// A row-returning statement
    pub fn select(columns: Vec<ColumnDescriptor>, rows: Vec<RawRow>) -> Self {
        Self {
            command_tag: CommandTag::select(rows.len()),
            columns,
            rows,
        }
    }

    /// A statement that returned no rows (DDL, DML)
    pub fn command(tag: impl Into<String>) -> Self {
        Self {
            command_tag: CommandTag(tag.into()),
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

/// Errors raised by an executor
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Could not reach the server; the cause is logged, not shown
    #[error("failed to connect to server - please inspect server log for details")]
    Connection(String),

    /// No pooled connection became available in time
    #[error("timed out waiting for a database connection")]
    PoolTimeout,

    /// The server rejected or failed the statement
    #[error("{0}")]
    Query(String),
}

/// Runs query text and returns per-statement results
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<Vec<StatementResult>, ExecutionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_tag() {
        assert!(CommandTag::select(3).is_select());
        assert!(CommandTag("select 1".into()).is_select());
        assert!(!CommandTag("INSERT 0 1".into()).is_select());
        assert!(!CommandTag("SELECTED".into()).is_select());
        assert!(!CommandTag(String::new()).is_select());
    }
}
