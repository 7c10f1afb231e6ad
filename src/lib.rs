#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Engine-independent database operations dispatched to engine-specific SQL.
//!
//! The crate is the orchestration layer between three collaborators:
//!
//! * a per-dialect [`generator::SqlGenerator`] that renders normalized
//!   operation descriptors into SQL text,
//! * an [`executor::Executor`] that runs SQL against a live connection,
//! * a static capability table ([`dialect::Dialect::supports`]) that decides,
//!   per engine, whether an operation uses its default strategy or a
//!   multi-statement workaround.
//!
//! [`dispatcher::Dispatcher`] exposes one entry point per logical operation
//! (schema, table, column, index, constraint, and row operations) and
//! [`transaction::TransactionController`] sequences autocommit, isolation,
//! begin, savepoint, commit, and rollback statements in the mandated order.

pub mod dialect;
pub mod dispatcher;
pub mod executor;
pub mod generator;
pub mod introspect;
pub mod query;
pub mod schema;
pub mod transaction;

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::dialect::Dialect;

#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    String(String),
    StringOpt(Option<String>),
    Bool(bool),
    BoolOpt(Option<bool>),
    Number(i64),
    NumberOpt(Option<i64>),
    UNumber(u64),
    UNumberOpt(Option<u64>),
    Real(f64),
    RealOpt(Option<f64>),
    Now,
    DateTime(NaiveDateTime),
}

impl DatabaseValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) | Self::StringOpt(Some(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(value) | Self::NumberOpt(Some(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UNumber(value) | Self::UNumberOpt(Some(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Real(value) | Self::RealOpt(Some(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) | Self::BoolOpt(Some(value)) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Self::DateTime(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(
            self,
            Self::Null
                | Self::StringOpt(None)
                | Self::BoolOpt(None)
                | Self::NumberOpt(None)
                | Self::UNumberOpt(None)
                | Self::RealOpt(None)
        )
    }
}

impl<T: Into<Self>> From<Option<T>> for DatabaseValue {
    fn from(val: Option<T>) -> Self {
        val.map_or(Self::Null, Into::into)
    }
}

impl From<bool> for DatabaseValue {
    fn from(val: bool) -> Self {
        Self::Bool(val)
    }
}

impl From<&str> for DatabaseValue {
    fn from(val: &str) -> Self {
        Self::String(val.to_string())
    }
}

impl From<String> for DatabaseValue {
    fn from(val: String) -> Self {
        Self::String(val)
    }
}

impl From<i32> for DatabaseValue {
    fn from(val: i32) -> Self {
        Self::Number(i64::from(val))
    }
}

impl From<i64> for DatabaseValue {
    fn from(val: i64) -> Self {
        Self::Number(val)
    }
}

impl From<u32> for DatabaseValue {
    fn from(val: u32) -> Self {
        Self::UNumber(u64::from(val))
    }
}

impl From<u64> for DatabaseValue {
    fn from(val: u64) -> Self {
        Self::UNumber(val)
    }
}

impl From<f64> for DatabaseValue {
    fn from(val: f64) -> Self {
        Self::Real(val)
    }
}

impl From<NaiveDateTime> for DatabaseValue {
    fn from(val: NaiveDateTime) -> Self {
        Self::DateTime(val)
    }
}

#[derive(Debug, Error)]
pub enum TryFromError {
    #[error("Could not convert to type '{0}'")]
    CouldNotConvert(String),
    #[error(transparent)]
    TryFromInt(#[from] std::num::TryFromIntError),
}

impl TryFrom<DatabaseValue> for u64 {
    type Error = TryFromError;

    fn try_from(value: DatabaseValue) -> Result<Self, Self::Error> {
        match value {
            DatabaseValue::Number(value) | DatabaseValue::NumberOpt(Some(value)) => {
                Ok(Self::try_from(value)?)
            }
            DatabaseValue::UNumber(value) | DatabaseValue::UNumberOpt(Some(value)) => Ok(value),
            _ => Err(TryFromError::CouldNotConvert("u64".into())),
        }
    }
}

impl TryFrom<DatabaseValue> for i64 {
    type Error = TryFromError;

    fn try_from(value: DatabaseValue) -> Result<Self, Self::Error> {
        match value {
            DatabaseValue::Number(value) | DatabaseValue::NumberOpt(Some(value)) => Ok(value),
            DatabaseValue::UNumber(value) | DatabaseValue::UNumberOpt(Some(value)) => {
                Ok(Self::try_from(value)?)
            }
            _ => Err(TryFromError::CouldNotConvert("i64".into())),
        }
    }
}

impl TryFrom<DatabaseValue> for String {
    type Error = TryFromError;

    fn try_from(value: DatabaseValue) -> Result<Self, Self::Error> {
        match value {
            DatabaseValue::String(value) | DatabaseValue::StringOpt(Some(value)) => Ok(value),
            _ => Err(TryFromError::CouldNotConvert("String".into())),
        }
    }
}

/// Error taxonomy for every operation in the crate.
///
/// `InvalidArgument` and `TransactionState` are raised before any statement is
/// sent. `Database` carries the engine's native code/message untranslated.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Operation '{operation}' is not supported for dialect {dialect}")]
    Unsupported { dialect: Dialect, operation: String },
    #[error("Database error{}: {message}", .code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Database {
        code: Option<String>,
        message: String,
    },
    #[error("Transaction state error: {0}")]
    TransactionState(String),
    #[error("Unexpected result from operation")]
    UnexpectedResult,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub columns: Vec<(String, DatabaseValue)>,
}

impl Row {
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<DatabaseValue> {
        self.columns
            .iter()
            .find(|c| c.0 == column_name)
            .map(|c| c.1.clone())
    }

    #[must_use]
    pub fn id(&self) -> Option<DatabaseValue> {
        self.get("id")
    }
}

impl FromIterator<(String, DatabaseValue)> for Row {
    fn from_iter<T: IntoIterator<Item = (String, DatabaseValue)>>(iter: T) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

pub use dialect::{Capability, Dialect as SqlDialect};
pub use dispatcher::Dispatcher;
pub use executor::{ExecResult, ExecuteOptions, Executor, QueryKind};
pub use generator::SqlGenerator;
pub use transaction::{IsolationLevel, TransactionController, TransactionHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_value_null_detection() {
        assert!(DatabaseValue::Null.is_null());
        assert!(DatabaseValue::StringOpt(None).is_null());
        assert!(DatabaseValue::NumberOpt(None).is_null());
        assert!(!DatabaseValue::Number(0).is_null());
        assert!(!DatabaseValue::StringOpt(Some(String::new())).is_null());
    }

    #[test]
    fn row_get_returns_first_match() {
        let row = Row {
            columns: vec![
                ("id".to_string(), DatabaseValue::Number(1)),
                ("name".to_string(), DatabaseValue::String("a".to_string())),
            ],
        };

        assert_eq!(
            row.get("name"),
            Some(DatabaseValue::String("a".to_string()))
        );
        assert_eq!(row.id(), Some(DatabaseValue::Number(1)));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn try_from_converts_numbers() {
        assert_eq!(u64::try_from(DatabaseValue::Number(5)).unwrap(), 5);
        assert_eq!(i64::try_from(DatabaseValue::UNumber(5)).unwrap(), 5);
        assert!(u64::try_from(DatabaseValue::String("x".into())).is_err());
    }
}
