//! The SQL generation boundary.
//!
//! One pure method per operation kind, taking normalized descriptors and
//! returning SQL text. Returning `None` means the dialect defines no
//! statement for that case and the dispatcher skips it silently; operations
//! that cannot proceed without a statement surface
//! [`crate::DatabaseError::Unsupported`] instead.
//!
//! Transaction-control statements that are close to universal carry ANSI
//! defaults; engine-optional statements (autocommit toggle, constraint
//! deferral, foreign-key enforcement switches, enum-type lifecycle) default
//! to `None`.

use crate::DatabaseValue;
use crate::query::{DeleteStatement, InsertStatement, Predicate, SelectQuery, UpdateStatement, UpsertStatement};
use crate::schema::{
    Column, Constraint, CreateTableOptions, DropTableOptions, FunctionSpec, Index, TableRef,
    TriggerSpec,
};
use crate::transaction::IsolationLevel;

pub trait SqlGenerator: Send + Sync + std::fmt::Debug {
    // Schema namespaces
    fn create_schema(&self, name: &str) -> Option<String> {
        Some(format!("CREATE SCHEMA {name}"))
    }

    fn drop_schema(&self, name: &str) -> Option<String> {
        Some(format!("DROP SCHEMA {name}"))
    }

    // Tables
    fn create_table(
        &self,
        table: &TableRef,
        columns: &[Column],
        options: &CreateTableOptions,
    ) -> Option<String>;

    fn drop_table(&self, table: &TableRef, options: &DropTableOptions) -> Option<String>;

    fn rename_table(&self, from: &TableRef, to: &TableRef) -> Option<String>;

    /// `INSERT INTO .. SELECT` used by table-recreation workarounds. The
    /// `columns` pairs map source column to destination column.
    fn copy_table(
        &self,
        from: &TableRef,
        to: &TableRef,
        columns: &[(String, String)],
    ) -> Option<String> {
        let sources = columns
            .iter()
            .map(|(source, _)| source.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let destinations = columns
            .iter()
            .map(|(_, destination)| destination.clone())
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "INSERT INTO {to} ({destinations}) SELECT {sources} FROM {from}"
        ))
    }

    // Columns
    fn add_column(&self, table: &TableRef, column: &Column) -> Option<String>;

    fn drop_column(&self, table: &TableRef, column: &str) -> Option<String>;

    fn rename_column(&self, _table: &TableRef, _from: &str, _to: &str) -> Option<String> {
        None
    }

    fn change_column(&self, _table: &TableRef, _column: &Column) -> Option<String> {
        None
    }

    /// `UPDATE .. SET to = from` used by the column-rename workaround.
    fn copy_column(&self, table: &TableRef, from: &str, to: &str) -> Option<String> {
        Some(format!("UPDATE {table} SET {to} = {from}"))
    }

    // Indexes
    fn add_index(&self, index: &Index) -> Option<String>;

    fn drop_index(&self, table: &TableRef, name: &str) -> Option<String>;

    // Constraints
    fn add_constraint(&self, table: &TableRef, constraint: &Constraint) -> Option<String>;

    fn drop_constraint(&self, table: &TableRef, name: &str) -> Option<String>;

    /// Query returning `constraint_name` rows for default constraints on one
    /// column. Only meaningful on engines with named default constraints.
    fn default_constraint_query(&self, _table: &TableRef, _column: &str) -> Option<String> {
        None
    }

    // Named enum types
    fn create_enum_type(&self, _name: &str, _variants: &[String]) -> Option<String> {
        None
    }

    fn drop_enum_type(&self, _name: &str) -> Option<String> {
        None
    }

    /// Query returning rows iff the named type already exists.
    fn enum_type_exists(&self, _name: &str) -> Option<String> {
        None
    }

    /// Query returning rows for every column, outside the dropped table, that
    /// still uses the named type.
    fn enum_type_usage(&self, _name: &str) -> Option<String> {
        None
    }

    // Foreign-key enforcement
    fn disable_foreign_keys(&self) -> Option<String> {
        None
    }

    fn enable_foreign_keys(&self) -> Option<String> {
        None
    }

    // Rows
    fn select(&self, query: &SelectQuery) -> Option<String>;

    fn insert(&self, statement: &InsertStatement) -> Option<String>;

    fn bulk_insert(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: &[Vec<DatabaseValue>],
    ) -> Option<String>;

    fn update(&self, statement: &UpdateStatement) -> Option<String>;

    fn delete(&self, statement: &DeleteStatement) -> Option<String>;

    fn truncate(&self, _table: &TableRef) -> Option<String> {
        None
    }

    /// The conflict predicate is the disjunction the dispatcher built from
    /// the caller predicate and the covered unique keys; `None` means the
    /// statement has no usable conflict target beyond the values themselves.
    fn upsert(&self, statement: &UpsertStatement, conflict: Option<&Predicate>) -> Option<String>;

    fn increment(
        &self,
        table: &TableRef,
        deltas: &[(String, i64)],
        filter: Option<&Predicate>,
    ) -> Option<String>;

    // Introspection
    fn describe_table(&self, table: &TableRef) -> Option<String>;

    fn list_tables(&self, schema: Option<&str>) -> Option<String>;

    /// Foreign keys declared by `table`.
    fn foreign_keys(&self, _table: &TableRef) -> Option<String> {
        None
    }

    /// Foreign keys in other tables referencing `table`.
    fn foreign_key_references(&self, _table: &TableRef) -> Option<String> {
        None
    }

    fn version(&self) -> Option<String> {
        Some("SELECT VERSION()".to_string())
    }

    // Triggers and functions
    fn create_trigger(&self, _trigger: &TriggerSpec) -> Option<String> {
        None
    }

    fn drop_trigger(&self, _table: &TableRef, _name: &str) -> Option<String> {
        None
    }

    fn create_function(&self, _function: &FunctionSpec) -> Option<String> {
        None
    }

    fn drop_function(&self, _name: &str) -> Option<String> {
        None
    }

    // Transaction control
    fn set_autocommit(&self, _enabled: bool) -> Option<String> {
        None
    }

    fn set_isolation_level(&self, level: IsolationLevel) -> Option<String> {
        Some(format!(
            "SET TRANSACTION ISOLATION LEVEL {}",
            level.as_sql()
        ))
    }

    fn begin_transaction(&self) -> Option<String> {
        Some("BEGIN".to_string())
    }

    fn create_savepoint(&self, name: &str) -> Option<String> {
        Some(format!("SAVEPOINT {name}"))
    }

    fn release_savepoint(&self, name: &str) -> Option<String> {
        Some(format!("RELEASE SAVEPOINT {name}"))
    }

    fn rollback_to_savepoint(&self, name: &str) -> Option<String> {
        Some(format!("ROLLBACK TO SAVEPOINT {name}"))
    }

    fn defer_constraints(&self) -> Option<String> {
        None
    }

    fn commit(&self) -> Option<String> {
        Some("COMMIT".to_string())
    }

    fn rollback(&self) -> Option<String> {
        Some("ROLLBACK".to_string())
    }
}
