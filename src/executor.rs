//! The execution boundary.
//!
//! The core never talks to a driver directly; it hands finished SQL text and
//! execution options to an [`Executor`] and post-processes whatever comes
//! back. Timeout and cancellation, if any, live behind this boundary and pass
//! through unchanged.

use async_trait::async_trait;

use crate::{DatabaseError, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    Upsert,
    Describe,
    ShowTables,
    ShowIndexes,
    ForeignKeys,
    Version,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub kind: QueryKind,
    /// Identifier of the transaction (root connection) the statement targets.
    pub transaction: Option<u64>,
    /// Return the engine's raw result shape without canonicalization.
    pub raw: bool,
    /// Reduce the result to a single scalar.
    pub plain: bool,
}

impl ExecuteOptions {
    #[must_use]
    pub const fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            transaction: None,
            raw: false,
            plain: false,
        }
    }

    #[must_use]
    pub const fn transaction(mut self, id: u64) -> Self {
        self.transaction = Some(id);
        self
    }

    #[must_use]
    pub const fn raw(mut self) -> Self {
        self.raw = true;
        self
    }

    #[must_use]
    pub const fn plain(mut self) -> Self {
        self.plain = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult {
    Rows(Vec<Row>),
    Affected(u64),
    None,
}

impl ExecResult {
    #[must_use]
    pub fn rows(self) -> Vec<Row> {
        match self {
            Self::Rows(rows) => rows,
            Self::Affected(_) | Self::None => vec![],
        }
    }

    #[must_use]
    pub fn first_row(self) -> Option<Row> {
        match self {
            Self::Rows(rows) => rows.into_iter().next(),
            Self::Affected(_) | Self::None => None,
        }
    }

    #[must_use]
    pub fn affected(&self) -> u64 {
        match self {
            Self::Rows(rows) => rows.len() as u64,
            Self::Affected(count) => *count,
            Self::None => 0,
        }
    }
}

/// Runs one SQL statement against a live connection.
///
/// Failures carry the engine's native code/message in
/// [`DatabaseError::Database`] and are never reinterpreted by the core.
#[async_trait]
pub trait Executor: Send + Sync + std::fmt::Debug {
    async fn execute(
        &self,
        sql: &str,
        options: &ExecuteOptions,
    ) -> Result<ExecResult, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DatabaseValue;

    #[test]
    fn affected_counts_rows() {
        let result = ExecResult::Rows(vec![
            Row {
                columns: vec![("id".to_string(), DatabaseValue::Number(1))],
            },
            Row {
                columns: vec![("id".to_string(), DatabaseValue::Number(2))],
            },
        ]);
        assert_eq!(result.affected(), 2);

        assert_eq!(ExecResult::Affected(7).affected(), 7);
        assert_eq!(ExecResult::None.affected(), 0);
    }

    #[test]
    fn options_builder() {
        let options = ExecuteOptions::new(QueryKind::Select).transaction(3).plain();
        assert_eq!(options.kind, QueryKind::Select);
        assert_eq!(options.transaction, Some(3));
        assert!(options.plain);
        assert!(!options.raw);
    }
}
