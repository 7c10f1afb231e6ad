//! Row operations.
//!
//! Inserts, selects, updates, deletes, atomic increments, and the per-dialect
//! upsert adapters. Every adapter maps its engine's native conflict-resolution
//! result onto the same `(inserted, key)` contract so callers never branch on
//! the dialect.

use crate::dialect::{Capability, Dialect};
use crate::executor::{ExecResult, QueryKind};
use crate::query::{
    DeleteStatement, InsertStatement, Predicate, SelectQuery, UpdateStatement, UpsertStatement,
};
use crate::schema::TableRef;
use crate::{DatabaseError, DatabaseValue, Row};

use super::Dispatcher;

#[cfg(feature = "cascade")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
    ToOne,
    ToMany,
}

/// One owner-to-dependent relationship walked by cascading deletes.
#[cfg(feature = "cascade")]
#[derive(Debug, Clone)]
pub struct Association {
    /// Table holding the dependent rows.
    pub table: TableRef,
    /// Column on the dependent table pointing at the owner.
    pub foreign_key: String,
    /// Primary-key column of the dependent table.
    pub primary_key: String,
    pub kind: AssociationKind,
    pub cascade_on_delete: bool,
}

/// The disjunction of conflict targets an upsert can collide on: the caller
/// predicate plus one equality branch per unique key whose columns are all
/// present in the inserted values. Unique keys with absent columns cannot
/// produce a usable match and are skipped.
pub(crate) fn build_conflict_predicate(statement: &UpsertStatement) -> Option<Predicate> {
    let mut branches: Vec<Predicate> = vec![];

    if let Some(filter) = &statement.filter {
        branches.push(filter.clone());
    }

    for key in &statement.unique_keys {
        let covered = key.iter().all(|column| {
            statement.values.iter().any(|(name, _)| name == column)
        });
        if !covered {
            continue;
        }

        let mut equalities: Vec<Predicate> = key
            .iter()
            .filter_map(|column| {
                statement
                    .values
                    .iter()
                    .find(|(name, _)| name == column)
                    .map(|(name, value)| Predicate::Eq(name.clone(), value.clone()))
            })
            .collect();

        branches.push(if equalities.len() == 1 {
            equalities.remove(0)
        } else {
            Predicate::And(equalities)
        });
    }

    match branches.len() {
        0 => None,
        1 => branches.pop(),
        _ => Some(Predicate::Or(branches)),
    }
}

impl Dispatcher {
    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no select statement
    pub async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, DatabaseError> {
        let sql = self.require("select", self.generator.select(query))?;
        Ok(self
            .run(&sql, &self.options(QueryKind::Select))
            .await?
            .rows())
    }

    /// First matching row, if any.
    ///
    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no select statement
    pub async fn select_first(&self, query: &SelectQuery) -> Result<Option<Row>, DatabaseError> {
        let mut query = query.clone();
        query.limit = Some(1);

        let sql = self.require("select", self.generator.select(&query))?;
        Ok(self
            .run(&sql, &self.options(QueryKind::Select))
            .await?
            .first_row())
    }

    /// First column of the first matching row.
    ///
    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no select statement
    pub async fn select_scalar(
        &self,
        query: &SelectQuery,
    ) -> Result<Option<DatabaseValue>, DatabaseError> {
        let mut query = query.clone();
        query.limit = Some(1);

        let sql = self.require("select", self.generator.select(&query))?;
        Ok(self
            .run(&sql, &self.options(QueryKind::Select).plain())
            .await?
            .first_row()
            .and_then(|row| row.columns.into_iter().next())
            .map(|(_, value)| value))
    }

    /// Insert one row. Returns the stored row when the engine reports it,
    /// otherwise echoes the provided values.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if the statement has no values
    pub async fn insert(&self, statement: &InsertStatement) -> Result<Row, DatabaseError> {
        if statement.values.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "insert requires at least one value".to_string(),
            ));
        }

        let sql = self.require("insert", self.generator.insert(statement))?;
        let result = self.run(&sql, &self.options(QueryKind::Insert)).await?;

        Ok(result
            .first_row()
            .unwrap_or_else(|| statement.values.iter().cloned().collect()))
    }

    /// Insert many rows in one statement. Returns the inserted-row count.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if `columns` is empty or any row's arity differs
    pub async fn bulk_insert(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: &[Vec<DatabaseValue>],
    ) -> Result<u64, DatabaseError> {
        if columns.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "bulk_insert requires at least one column".to_string(),
            ));
        }
        for (index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DatabaseError::InvalidArgument(format!(
                    "bulk_insert row {index} has {} values, expected {}",
                    row.len(),
                    columns.len()
                )));
            }
        }
        if rows.is_empty() {
            return Ok(0);
        }

        let sql = self.require(
            "bulk_insert",
            self.generator.bulk_insert(table, columns, rows),
        )?;
        Ok(self
            .run(&sql, &self.options(QueryKind::Insert))
            .await?
            .affected())
    }

    /// # Errors
    ///
    /// * `InvalidArgument` if the statement has no assignments
    pub async fn update(&self, statement: &UpdateStatement) -> Result<u64, DatabaseError> {
        if statement.values.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "update requires at least one assignment".to_string(),
            ));
        }

        let sql = self.require("update", self.generator.update(statement))?;
        Ok(self
            .run(&sql, &self.options(QueryKind::Update))
            .await?
            .affected())
    }

    /// Delete matching rows. An unfiltered delete with the truncate flag uses
    /// the engine's truncate statement where one exists.
    ///
    /// The caller's statement is cloned before any dialect-specific rewriting
    /// and is never mutated.
    ///
    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no delete statement
    pub async fn delete(&self, statement: &DeleteStatement) -> Result<u64, DatabaseError> {
        if statement.truncate
            && statement.filter.is_none()
            && self.dialect.supports(Capability::Truncate)
        {
            if let Some(sql) = self.generator.truncate(&statement.table) {
                return Ok(self
                    .run(&sql, &self.options(QueryKind::Delete))
                    .await?
                    .affected());
            }
        }

        let mut working = statement.clone();
        working.truncate = false;

        let sql = self.require("delete", self.generator.delete(&working))?;
        Ok(self
            .run(&sql, &self.options(QueryKind::Delete))
            .await?
            .affected())
    }

    /// Atomically add each delta to its column on the matching rows.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if `deltas` is empty
    pub async fn increment(
        &self,
        table: &TableRef,
        deltas: &[(String, i64)],
        filter: Option<&Predicate>,
    ) -> Result<u64, DatabaseError> {
        if deltas.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "increment requires at least one delta".to_string(),
            ));
        }

        let sql = self.require(
            "increment",
            self.generator.increment(table, deltas, filter),
        )?;
        Ok(self
            .run(&sql, &self.options(QueryKind::Update))
            .await?
            .affected())
    }

    /// [`Self::increment`] with every delta negated.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if `deltas` is empty or a delta has no negation
    ///   (`i64::MIN`)
    pub async fn decrement(
        &self,
        table: &TableRef,
        deltas: &[(String, i64)],
        filter: Option<&Predicate>,
    ) -> Result<u64, DatabaseError> {
        let negated = deltas
            .iter()
            .map(|(column, delta)| {
                let negated = delta.checked_neg().ok_or_else(|| {
                    DatabaseError::InvalidArgument(format!(
                        "decrement delta {delta} for column '{column}' cannot be negated"
                    ))
                })?;
                Ok((column.clone(), negated))
            })
            .collect::<Result<Vec<(String, i64)>, DatabaseError>>()?;
        self.increment(table, &negated, filter).await
    }

    /// Insert-or-update. Returns whether a new row was created and the
    /// primary-key value when one is known: from the returned row first, then
    /// from the caller-supplied values, else `None`.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if the statement has no values
    /// * `Unsupported` if the dialect defines no upsert statement
    pub async fn upsert(
        &self,
        statement: &UpsertStatement,
    ) -> Result<(bool, Option<DatabaseValue>), DatabaseError> {
        if statement.values.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "upsert requires at least one value".to_string(),
            ));
        }

        let conflict = build_conflict_predicate(statement);
        let sql = self.require(
            "upsert",
            self.generator.upsert(statement, conflict.as_ref()),
        )?;
        let result = self.run(&sql, &self.options(QueryKind::Upsert)).await?;

        Ok(self.normalize_upsert_result(statement, result))
    }

    fn normalize_upsert_result(
        &self,
        statement: &UpsertStatement,
        result: ExecResult,
    ) -> (bool, Option<DatabaseValue>) {
        let caller_key = statement
            .values
            .iter()
            .find(|(name, _)| *name == statement.primary_key)
            .map(|(_, value)| value.clone());

        match result {
            ExecResult::Rows(rows) => {
                let Some(row) = rows.into_iter().next() else {
                    return (false, caller_key);
                };

                let inserted = match self.dialect {
                    // MERGE .. OUTPUT $action
                    Dialect::Mssql => row
                        .get("$action")
                        .as_ref()
                        .and_then(DatabaseValue::as_str)
                        .map(str::to_ascii_uppercase)
                        .as_deref()
                        == Some("INSERT"),
                    Dialect::Postgres | Dialect::Sqlite => row
                        .get("created")
                        .as_ref()
                        .and_then(DatabaseValue::as_bool)
                        .unwrap_or(true),
                    Dialect::MySql => true,
                };

                let key = row
                    .get(&statement.primary_key)
                    .filter(|value| !value.is_null())
                    .or(caller_key);
                (inserted, key)
            }
            // MySQL reports 1 affected row for a fresh insert and 2 when an
            // existing row was updated; the others report 1 either way, so a
            // bare count is taken as an insert.
            ExecResult::Affected(count) => (count == 1, caller_key),
            ExecResult::None => (false, caller_key),
        }
    }

    /// Delete matching owner rows and, first, their dependents along every
    /// cascading association in declaration order. Dependents are removed one
    /// row at a time by primary key; the first failure aborts everything
    /// still pending, including the owner delete.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if `owner_key` is empty
    #[cfg(feature = "cascade")]
    pub async fn delete_cascading(
        &self,
        statement: &DeleteStatement,
        owner_key: &str,
        associations: &[Association],
    ) -> Result<u64, DatabaseError> {
        if owner_key.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "delete_cascading requires the owner key column".to_string(),
            ));
        }

        let owners = SelectQuery {
            table: statement.table.clone(),
            distinct: false,
            columns: vec![owner_key.to_string()],
            filter: statement.filter.clone(),
            sorts: vec![],
            limit: statement.limit,
            offset: None,
        };

        for owner in self.select(&owners).await? {
            let Some(owner_value) = owner.get(owner_key) else {
                continue;
            };

            for association in associations {
                if !association.cascade_on_delete {
                    continue;
                }
                self.delete_dependents(association, owner_value.clone())
                    .await?;
            }
        }

        self.delete(statement).await
    }

    #[cfg(feature = "cascade")]
    async fn delete_dependents(
        &self,
        association: &Association,
        owner_value: DatabaseValue,
    ) -> Result<(), DatabaseError> {
        let mut dependents = SelectQuery {
            table: association.table.clone(),
            distinct: false,
            columns: vec![association.primary_key.clone()],
            filter: Some(Predicate::Eq(association.foreign_key.clone(), owner_value)),
            sorts: vec![],
            limit: None,
            offset: None,
        };
        if association.kind == AssociationKind::ToOne {
            dependents.limit = Some(1);
        }

        for dependent in self.select(&dependents).await? {
            let Some(key) = dependent.get(&association.primary_key) else {
                continue;
            };
            let by_key = DeleteStatement {
                table: association.table.clone(),
                filter: Some(Predicate::Eq(association.primary_key.clone(), key)),
                limit: None,
                truncate: false,
            };
            self.delete(&by_key).await?;
        }
        Ok(())
    }
}
