//! Owned statement descriptors and predicates.
//!
//! Statements are normalized once, before any SQL is generated, and handed to
//! the consumed [`crate::generator::SqlGenerator`] as plain data. Predicates
//! are owned values because the dispatcher clones and inspects them (upsert
//! conflict targets, bulk-delete predicate isolation) before generation.

use crate::DatabaseValue;
use crate::schema::TableRef;

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(String, DatabaseValue),
    NotEq(String, DatabaseValue),
    Gt(String, DatabaseValue),
    Gte(String, DatabaseValue),
    Lt(String, DatabaseValue),
    Lte(String, DatabaseValue),
    In(String, Vec<DatabaseValue>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Raw(String),
}

pub fn where_eq(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Predicate {
    Predicate::Eq(column.into(), value.into())
}

pub fn where_not_eq(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Predicate {
    Predicate::NotEq(column.into(), value.into())
}

pub fn where_gt(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Predicate {
    Predicate::Gt(column.into(), value.into())
}

pub fn where_gte(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Predicate {
    Predicate::Gte(column.into(), value.into())
}

pub fn where_lt(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Predicate {
    Predicate::Lt(column.into(), value.into())
}

pub fn where_lte(column: impl Into<String>, value: impl Into<DatabaseValue>) -> Predicate {
    Predicate::Lte(column.into(), value.into())
}

pub fn where_in(
    column: impl Into<String>,
    values: impl IntoIterator<Item = impl Into<DatabaseValue>>,
) -> Predicate {
    Predicate::In(
        column.into(),
        values.into_iter().map(Into::into).collect(),
    )
}

#[must_use]
pub fn where_and(conditions: Vec<Predicate>) -> Predicate {
    Predicate::And(conditions)
}

#[must_use]
pub fn where_or(conditions: Vec<Predicate>) -> Predicate {
    Predicate::Or(conditions)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct SelectQuery {
    pub table: TableRef,
    pub distinct: bool,
    pub columns: Vec<String>,
    pub filter: Option<Predicate>,
    pub sorts: Vec<(String, SortDirection)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[must_use]
pub fn select(table: impl Into<TableRef>) -> SelectQuery {
    SelectQuery {
        table: table.into(),
        distinct: false,
        columns: vec!["*".to_string()],
        filter: None,
        sorts: vec![],
        limit: None,
        offset: None,
    }
}

impl SelectQuery {
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(Predicate::And(mut conditions)) => {
                conditions.push(predicate);
                Predicate::And(conditions)
            }
            Some(existing) => Predicate::And(vec![existing, predicate]),
            None => predicate,
        });
        self
    }

    #[must_use]
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.filter(where_eq(column, value))
    }

    #[must_use]
    pub fn sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sorts.push((column.into(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone)]
pub struct InsertStatement {
    pub table: TableRef,
    pub values: Vec<(String, DatabaseValue)>,
}

#[must_use]
pub fn insert(table: impl Into<TableRef>) -> InsertStatement {
    InsertStatement {
        table: table.into(),
        values: vec![],
    }
}

impl InsertStatement {
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn values(
        mut self,
        values: impl IntoIterator<Item = (impl Into<String>, impl Into<DatabaseValue>)>,
    ) -> Self {
        self.values
            .extend(values.into_iter().map(|(n, v)| (n.into(), v.into())));
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpdateStatement {
    pub table: TableRef,
    pub values: Vec<(String, DatabaseValue)>,
    pub filter: Option<Predicate>,
    pub limit: Option<usize>,
}

#[must_use]
pub fn update(table: impl Into<TableRef>) -> UpdateStatement {
    UpdateStatement {
        table: table.into(),
        values: vec![],
        filter: None,
        limit: None,
    }
}

impl UpdateStatement {
    #[must_use]
    pub fn set(mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(Predicate::And(mut conditions)) => {
                conditions.push(predicate);
                Predicate::And(conditions)
            }
            Some(existing) => Predicate::And(vec![existing, predicate]),
            None => predicate,
        });
        self
    }

    #[must_use]
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.filter(where_eq(column, value))
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone)]
pub struct DeleteStatement {
    pub table: TableRef,
    pub filter: Option<Predicate>,
    pub limit: Option<usize>,
    /// Fast path for unfiltered bulk deletes on engines with `TRUNCATE`.
    pub truncate: bool,
}

#[must_use]
pub fn delete(table: impl Into<TableRef>) -> DeleteStatement {
    DeleteStatement {
        table: table.into(),
        filter: None,
        limit: None,
        truncate: false,
    }
}

impl DeleteStatement {
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(Predicate::And(mut conditions)) => {
                conditions.push(predicate);
                Predicate::And(conditions)
            }
            Some(existing) => Predicate::And(vec![existing, predicate]),
            None => predicate,
        });
        self
    }

    #[must_use]
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.filter(where_eq(column, value))
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn truncate(mut self, truncate: bool) -> Self {
        self.truncate = truncate;
        self
    }
}

#[derive(Debug, Clone)]
pub struct UpsertStatement {
    pub table: TableRef,
    pub values: Vec<(String, DatabaseValue)>,
    /// Column assignments applied on conflict; defaults to `values`.
    pub update_values: Vec<(String, DatabaseValue)>,
    pub filter: Option<Predicate>,
    /// Declared unique key column sets, in declaration order.
    pub unique_keys: Vec<Vec<String>>,
    pub primary_key: String,
}

#[must_use]
pub fn upsert(table: impl Into<TableRef>) -> UpsertStatement {
    UpsertStatement {
        table: table.into(),
        values: vec![],
        update_values: vec![],
        filter: None,
        unique_keys: vec![],
        primary_key: "id".to_string(),
    }
}

impl UpsertStatement {
    #[must_use]
    pub fn value(mut self, name: impl Into<String>, value: impl Into<DatabaseValue>) -> Self {
        self.values.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn update_value(
        mut self,
        name: impl Into<String>,
        value: impl Into<DatabaseValue>,
    ) -> Self {
        self.update_values.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(Predicate::And(mut conditions)) => {
                conditions.push(predicate);
                Predicate::And(conditions)
            }
            Some(existing) => Predicate::And(vec![existing, predicate]),
            None => predicate,
        });
        self
    }

    #[must_use]
    pub fn unique_key(mut self, columns: &[&str]) -> Self {
        self.unique_keys
            .push(columns.iter().map(ToString::to_string).collect());
        self
    }

    #[must_use]
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }
}
