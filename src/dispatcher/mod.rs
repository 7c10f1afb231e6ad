//! The operation dispatcher.
//!
//! One entry point per logical operation. Every operation validates its
//! arguments, consults the capability table, picks the default strategy or
//! the dialect's documented workaround, renders SQL through the consumed
//! generator, and executes the statements strictly in order. A failure in a
//! multi-statement workaround aborts the remaining steps and surfaces the
//! original error untranslated.
//!
//! Multi-statement workarounds are not atomic unless the caller brackets the
//! operation in its own transaction; the dispatcher never opens an implicit
//! one.

pub mod dml;

use std::sync::Arc;

use crate::dialect::{Capability, Dialect};
use crate::executor::{ExecResult, ExecuteOptions, Executor, QueryKind};
use crate::generator::SqlGenerator;
use crate::schema::{
    Column, Constraint, ConstraintKind, CreateTableOptions, DataType, DropTableOptions,
    FunctionSpec, Index, TableRef, TriggerSpec,
};
use crate::transaction::{TransactionController, TransactionHandle};
use crate::DatabaseError;

/// Dispatches engine-independent operations against one
/// connection/configuration. The dialect is bound at construction; there is
/// no implicit global engine selection.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pub(crate) dialect: Dialect,
    pub(crate) generator: Arc<dyn SqlGenerator>,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) transaction: Option<u64>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        dialect: Dialect,
        generator: Arc<dyn SqlGenerator>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            dialect,
            generator,
            executor,
            transaction: None,
        }
    }

    #[must_use]
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// A dispatcher issuing all statements inside `handle`'s transaction.
    #[must_use]
    pub fn with_transaction(&self, handle: &TransactionHandle) -> Self {
        Self {
            dialect: self.dialect,
            generator: Arc::clone(&self.generator),
            executor: Arc::clone(&self.executor),
            transaction: Some(handle.root),
        }
    }

    /// A transaction controller sharing this dispatcher's generator and
    /// executor.
    #[must_use]
    pub fn transactions(&self) -> TransactionController {
        TransactionController::new(
            self.dialect,
            Arc::clone(&self.generator),
            Arc::clone(&self.executor),
        )
    }

    pub(crate) fn options(&self, kind: QueryKind) -> ExecuteOptions {
        let options = ExecuteOptions::new(kind);
        match self.transaction {
            Some(id) => options.transaction(id),
            None => options,
        }
    }

    pub(crate) async fn run(
        &self,
        sql: &str,
        options: &ExecuteOptions,
    ) -> Result<ExecResult, DatabaseError> {
        log::trace!("executing ({:?}): {sql}", options.kind);
        self.executor.execute(sql, options).await
    }

    /// Run an optional statement; `None` from the generator is a silent skip.
    pub(crate) async fn run_optional(
        &self,
        sql: Option<String>,
        kind: QueryKind,
    ) -> Result<Option<ExecResult>, DatabaseError> {
        match sql {
            Some(sql) => Ok(Some(self.run(&sql, &self.options(kind)).await?)),
            None => Ok(None),
        }
    }

    pub(crate) fn require(
        &self,
        operation: &str,
        sql: Option<String>,
    ) -> Result<String, DatabaseError> {
        sql.ok_or_else(|| DatabaseError::Unsupported {
            dialect: self.dialect,
            operation: operation.to_string(),
        })
    }

    fn unsupported(&self, operation: &str) -> DatabaseError {
        DatabaseError::Unsupported {
            dialect: self.dialect,
            operation: operation.to_string(),
        }
    }

    // Schema namespaces

    /// # Errors
    ///
    /// * `InvalidArgument` if `name` is empty
    /// * `Unsupported` if the dialect has no schema namespaces
    pub async fn create_schema(&self, name: &str) -> Result<(), DatabaseError> {
        if name.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "schema name must not be empty".to_string(),
            ));
        }
        if !self.dialect.supports(Capability::Schemas) {
            return Err(self.unsupported("create_schema"));
        }
        self.run_optional(self.generator.create_schema(name), QueryKind::Raw)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// * `InvalidArgument` if `name` is empty
    /// * `Unsupported` if the dialect has no schema namespaces
    pub async fn drop_schema(&self, name: &str) -> Result<(), DatabaseError> {
        if name.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "schema name must not be empty".to_string(),
            ));
        }
        if !self.dialect.supports(Capability::Schemas) {
            return Err(self.unsupported("drop_schema"));
        }
        self.run_optional(self.generator.drop_schema(name), QueryKind::Raw)
            .await?;
        Ok(())
    }

    // Tables

    /// Create a table. On engines with named enum types, every enum-typed
    /// column's type is created first if it does not already exist.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if `columns` is empty
    /// * `Unsupported` if the dialect defines no create-table statement
    pub async fn create_table(
        &self,
        table: &TableRef,
        columns: &[Column],
        options: &CreateTableOptions,
    ) -> Result<(), DatabaseError> {
        if columns.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "create_table requires at least one column".to_string(),
            ));
        }

        self.ensure_enum_types(columns).await?;

        let sql = self.require(
            "create_table",
            self.generator.create_table(table, columns, options),
        )?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// Drop a table. `columns_hint` carries the dropped table's definition so
    /// named enum types left unreferenced can be dropped afterwards.
    ///
    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no drop-table statement
    pub async fn drop_table(
        &self,
        table: &TableRef,
        options: &DropTableOptions,
        columns_hint: Option<&[Column]>,
    ) -> Result<(), DatabaseError> {
        let enum_types: Vec<String> = if self.dialect.supports(Capability::NamedEnumTypes) {
            columns_hint
                .unwrap_or(&[])
                .iter()
                .filter_map(|column| match &column.data_type {
                    DataType::Enum { name, .. } => Some(name.clone()),
                    _ => None,
                })
                .collect()
        } else {
            vec![]
        };

        let sql = self.require("drop_table", self.generator.drop_table(table, options))?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;

        for name in enum_types {
            self.drop_enum_type_if_unused(&name).await?;
        }
        Ok(())
    }

    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no rename-table statement
    pub async fn rename_table(&self, from: &TableRef, to: &TableRef) -> Result<(), DatabaseError> {
        let sql = self.require("rename_table", self.generator.rename_table(from, to))?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// Drop every listed table without tripping foreign-key constraint
    /// violations, regardless of declaration order or reference cycles.
    ///
    /// Engines with a native enforcement switch get it toggled off for the
    /// duration and restored even if an intermediate drop fails. Everything
    /// else gets each table's inbound foreign-key constraints dropped first.
    ///
    /// # Errors
    ///
    /// * `DatabaseError::Database` from the first failing statement
    pub async fn drop_all_tables(&self, tables: &[TableRef]) -> Result<(), DatabaseError> {
        if tables.is_empty() {
            return Ok(());
        }

        let options = DropTableOptions {
            if_exists: true,
            cascade: false,
        };

        let disable = if self.dialect.supports(Capability::DisableForeignKeys) {
            self.generator.disable_foreign_keys()
        } else {
            None
        };

        if let Some(disable) = disable {
            self.run(&disable, &self.options(QueryKind::Raw)).await?;

            let mut result = Ok(());
            for table in tables {
                if let Err(err) = self.drop_table(table, &options, None).await {
                    result = Err(err);
                    break;
                }
            }

            // Enforcement is restored even when a drop failed; the original
            // error wins over a failed restore.
            if let Some(enable) = self.generator.enable_foreign_keys() {
                match self.run(&enable, &self.options(QueryKind::Raw)).await {
                    Ok(_) => {}
                    Err(err) if result.is_ok() => result = Err(err),
                    Err(err) => {
                        log::warn!("failed to re-enable foreign keys after drop failure: {err}");
                    }
                }
            }

            return result;
        }

        for table in tables {
            for fk in self.foreign_key_references_for_table(table).await? {
                let owner = TableRef::new(fk.table.clone());
                if let Some(sql) = self.generator.drop_constraint(&owner, &fk.name) {
                    self.run(&sql, &self.options(QueryKind::Raw)).await?;
                }
            }
        }

        for table in tables {
            self.drop_table(table, &options, None).await?;
        }
        Ok(())
    }

    // Columns

    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no add-column statement
    pub async fn add_column(&self, table: &TableRef, column: &Column) -> Result<(), DatabaseError> {
        self.ensure_enum_types(std::slice::from_ref(column)).await?;

        let sql = self.require("add_column", self.generator.add_column(table, column))?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// Remove a column, visible to the caller as a single call whatever the
    /// engine requires underneath:
    ///
    /// * native drop where supported;
    /// * dependent default/foreign-key constraints dropped first on engines
    ///   that cannot drop a constrained column;
    /// * shadow-table recreation (create, copy, drop, rename) on engines
    ///   without column drop at all.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if `column_name` is empty
    /// * `NotFound` if the recreation path cannot find the column
    /// * `DatabaseError::Database` from the first failing statement
    pub async fn remove_column(
        &self,
        table: &TableRef,
        column_name: &str,
    ) -> Result<(), DatabaseError> {
        if column_name.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "column name must not be empty".to_string(),
            ));
        }

        if !self.dialect.supports(Capability::ColumnDrop) {
            return self.remove_column_via_recreate(table, column_name).await;
        }

        if !self.dialect.supports(Capability::ConstrainedColumnDrop) {
            self.drop_dependent_constraints(table, column_name).await?;
        }

        let sql = self.require(
            "drop_column",
            self.generator.drop_column(table, column_name),
        )?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    async fn drop_dependent_constraints(
        &self,
        table: &TableRef,
        column_name: &str,
    ) -> Result<(), DatabaseError> {
        if let Some(query) = self.generator.default_constraint_query(table, column_name) {
            let rows = self
                .run(&query, &self.options(QueryKind::Select))
                .await?
                .rows();
            for row in rows {
                if let Some(name) = row.get("constraint_name").as_ref().and_then(|v| {
                    v.as_str().map(ToString::to_string)
                }) {
                    if let Some(sql) = self.generator.drop_constraint(table, &name) {
                        self.run(&sql, &self.options(QueryKind::Raw)).await?;
                    }
                }
            }
        }

        for fk in self.foreign_keys_for_table(table).await? {
            if fk.column == column_name {
                if let Some(sql) = self.generator.drop_constraint(table, &fk.name) {
                    self.run(&sql, &self.options(QueryKind::Raw)).await?;
                }
            }
        }
        Ok(())
    }

    async fn remove_column_via_recreate(
        &self,
        table: &TableRef,
        column_name: &str,
    ) -> Result<(), DatabaseError> {
        let columns = self.describe_table_ordered(table).await?;
        if !columns.iter().any(|c| c.name == column_name) {
            return Err(DatabaseError::NotFound(format!(
                "column '{column_name}' on table '{table}'"
            )));
        }

        let remaining: Vec<Column> = columns
            .iter()
            .filter(|c| c.name != column_name)
            .map(crate::schema::ColumnInfo::to_column)
            .collect();
        let copy_columns: Vec<(String, String)> = remaining
            .iter()
            .map(|c| (c.name.clone(), c.name.clone()))
            .collect();

        self.recreate_table(table, &remaining, &copy_columns).await
    }

    /// Shadow-table workaround: create a replacement table, copy rows, drop
    /// the original, rename the replacement. Steps run strictly in order and
    /// the first failure aborts the rest.
    async fn recreate_table(
        &self,
        table: &TableRef,
        columns: &[Column],
        copy_columns: &[(String, String)],
    ) -> Result<(), DatabaseError> {
        let shadow = TableRef {
            name: format!("{}_backup", table.name),
            schema: table.schema.clone(),
        };
        log::debug!("{}: recreating table '{table}' via '{shadow}'", self.dialect);

        let create = self.require(
            "create_table",
            self.generator
                .create_table(&shadow, columns, &CreateTableOptions::default()),
        )?;
        self.run(&create, &self.options(QueryKind::Raw)).await?;

        let copy = self.require(
            "copy_table",
            self.generator.copy_table(table, &shadow, copy_columns),
        )?;
        self.run(&copy, &self.options(QueryKind::Raw)).await?;

        let drop = self.require(
            "drop_table",
            self.generator
                .drop_table(table, &DropTableOptions::default()),
        )?;
        self.run(&drop, &self.options(QueryKind::Raw)).await?;

        let rename = self.require(
            "rename_table",
            self.generator.rename_table(&shadow, table),
        )?;
        self.run(&rename, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// Change a column's definition in place, falling back to table
    /// recreation when the engine has no modify statement.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the recreation path cannot find the column
    /// * `DatabaseError::Database` from the first failing statement
    pub async fn change_column(
        &self,
        table: &TableRef,
        column: &Column,
    ) -> Result<(), DatabaseError> {
        self.ensure_enum_types(std::slice::from_ref(column)).await?;

        if let Some(sql) = self.generator.change_column(table, column) {
            self.run(&sql, &self.options(QueryKind::Raw)).await?;
            return Ok(());
        }

        let columns = self.describe_table_ordered(table).await?;
        if !columns.iter().any(|c| c.name == column.name) {
            return Err(DatabaseError::NotFound(format!(
                "column '{}' on table '{table}'",
                column.name
            )));
        }

        let replaced: Vec<Column> = columns
            .iter()
            .map(|c| {
                if c.name == column.name {
                    column.clone()
                } else {
                    c.to_column()
                }
            })
            .collect();
        let copy_columns: Vec<(String, String)> = columns
            .iter()
            .map(|c| (c.name.clone(), c.name.clone()))
            .collect();

        self.recreate_table(table, &replaced, &copy_columns).await
    }

    /// Rename a column, preserving its introspected type, nullability, and
    /// default exactly. A null default on a NOT NULL column is dropped rather
    /// than copied, so the column never transiently carries `DEFAULT NULL`.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if either name is empty
    /// * `NotFound` if the column does not exist (workaround paths)
    /// * `DatabaseError::Database` from the first failing statement
    pub async fn rename_column(
        &self,
        table: &TableRef,
        from: &str,
        to: &str,
    ) -> Result<(), DatabaseError> {
        if from.is_empty() || to.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "rename_column requires both column names".to_string(),
            ));
        }

        if self.dialect.supports(Capability::ColumnRename) {
            if let Some(sql) = self.generator.rename_column(table, from, to) {
                self.run(&sql, &self.options(QueryKind::Raw)).await?;
                return Ok(());
            }
        }

        let columns = self.describe_table_ordered(table).await?;
        let info = columns
            .iter()
            .find(|c| c.name == from)
            .ok_or_else(|| {
                DatabaseError::NotFound(format!("column '{from}' on table '{table}'"))
            })?;

        let mut renamed = info.to_column();
        renamed.name = to.to_string();
        if !renamed.nullable && renamed.default.as_ref().is_some_and(crate::DatabaseValue::is_null)
        {
            renamed.default = None;
        }

        if self.dialect.supports(Capability::ColumnDrop) {
            // Add the new column with the old definition, copy, drop the old.
            let add = self.require("add_column", self.generator.add_column(table, &renamed))?;
            self.run(&add, &self.options(QueryKind::Raw)).await?;

            let copy = self.require("copy_column", self.generator.copy_column(table, from, to))?;
            self.run(&copy, &self.options(QueryKind::Update)).await?;

            let drop = self.require("drop_column", self.generator.drop_column(table, from))?;
            self.run(&drop, &self.options(QueryKind::Raw)).await?;
            return Ok(());
        }

        // No column drop either: rebuild the table with the renamed column.
        let replaced: Vec<Column> = columns
            .iter()
            .map(|c| {
                if c.name == from {
                    renamed.clone()
                } else {
                    c.to_column()
                }
            })
            .collect();
        let copy_columns: Vec<(String, String)> = columns
            .iter()
            .map(|c| {
                if c.name == from {
                    (c.name.clone(), to.to_string())
                } else {
                    (c.name.clone(), c.name.clone())
                }
            })
            .collect();

        self.recreate_table(table, &replaced, &copy_columns).await
    }

    // Indexes

    /// # Errors
    ///
    /// * `InvalidArgument` if the index has no columns
    /// * `Unsupported` if the dialect defines no add-index statement
    pub async fn add_index(&self, index: &Index) -> Result<(), DatabaseError> {
        if index.columns.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "index requires at least one column".to_string(),
            ));
        }
        let sql = self.require("add_index", self.generator.add_index(index))?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no drop-index statement
    pub async fn remove_index(&self, table: &TableRef, name: &str) -> Result<(), DatabaseError> {
        let sql = self.require("drop_index", self.generator.drop_index(table, name))?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    // Constraints

    /// # Errors
    ///
    /// * `InvalidArgument` if the constraint is structurally invalid (raised
    ///   before any SQL is generated)
    /// * `Unsupported` if the dialect cannot add this constraint kind
    pub async fn add_constraint(
        &self,
        table: &TableRef,
        constraint: &Constraint,
    ) -> Result<(), DatabaseError> {
        constraint.validate()?;

        if !self.dialect.supports(Capability::AddConstraints) {
            return Err(self.unsupported("add_constraint"));
        }
        match constraint.kind {
            ConstraintKind::Check if !self.dialect.supports(Capability::CheckConstraints) => {
                return Err(self.unsupported("add_constraint(check)"));
            }
            ConstraintKind::Default if !self.dialect.supports(Capability::DefaultConstraints) => {
                return Err(self.unsupported("add_constraint(default)"));
            }
            _ => {}
        }

        let sql = self.require(
            "add_constraint",
            self.generator.add_constraint(table, constraint),
        )?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// * `InvalidArgument` if `name` is empty
    /// * `Unsupported` if the dialect defines no drop-constraint statement
    pub async fn remove_constraint(
        &self,
        table: &TableRef,
        name: &str,
    ) -> Result<(), DatabaseError> {
        if name.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "constraint name must not be empty".to_string(),
            ));
        }
        let sql = self.require(
            "drop_constraint",
            self.generator.drop_constraint(table, name),
        )?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    // Named enum types

    async fn ensure_enum_types(&self, columns: &[Column]) -> Result<(), DatabaseError> {
        if !self.dialect.supports(Capability::NamedEnumTypes) {
            return Ok(());
        }

        for column in columns {
            let DataType::Enum { name, variants } = &column.data_type else {
                continue;
            };

            if let Some(query) = self.generator.enum_type_exists(name) {
                let rows = self
                    .run(&query, &self.options(QueryKind::Select))
                    .await?
                    .rows();
                if !rows.is_empty() {
                    continue;
                }
            }

            if let Some(sql) = self.generator.create_enum_type(name, variants) {
                self.run(&sql, &self.options(QueryKind::Raw)).await?;
            }
        }
        Ok(())
    }

    /// Drop a named enum type unless some other column still uses it.
    async fn drop_enum_type_if_unused(&self, name: &str) -> Result<(), DatabaseError> {
        if let Some(query) = self.generator.enum_type_usage(name) {
            let rows = self
                .run(&query, &self.options(QueryKind::Select))
                .await?
                .rows();
            if !rows.is_empty() {
                log::debug!("enum type '{name}' still referenced, keeping");
                return Ok(());
            }
        }
        if let Some(sql) = self.generator.drop_enum_type(name) {
            self.run(&sql, &self.options(QueryKind::Raw)).await?;
        }
        Ok(())
    }

    // Triggers and functions

    /// # Errors
    ///
    /// * `Unsupported` if the dialect has no trigger/function DDL
    pub async fn create_trigger(&self, trigger: &TriggerSpec) -> Result<(), DatabaseError> {
        if !self.dialect.supports(Capability::ProceduralFunctions) {
            return Err(self.unsupported("create_trigger"));
        }
        let sql = self.require("create_trigger", self.generator.create_trigger(trigger))?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// * `Unsupported` if the dialect has no trigger/function DDL
    pub async fn drop_trigger(&self, table: &TableRef, name: &str) -> Result<(), DatabaseError> {
        if !self.dialect.supports(Capability::ProceduralFunctions) {
            return Err(self.unsupported("drop_trigger"));
        }
        let sql = self.require("drop_trigger", self.generator.drop_trigger(table, name))?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// * `InvalidArgument` if the function has no name or body
    /// * `Unsupported` if the dialect has no trigger/function DDL
    pub async fn create_function(&self, function: &FunctionSpec) -> Result<(), DatabaseError> {
        if function.name.is_empty() || function.body.is_empty() {
            return Err(DatabaseError::InvalidArgument(
                "function requires a name and a body".to_string(),
            ));
        }
        if !self.dialect.supports(Capability::ProceduralFunctions) {
            return Err(self.unsupported("create_function"));
        }
        let sql = self.require(
            "create_function",
            self.generator.create_function(function),
        )?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// * `Unsupported` if the dialect has no trigger/function DDL
    pub async fn drop_function(&self, name: &str) -> Result<(), DatabaseError> {
        if !self.dialect.supports(Capability::ProceduralFunctions) {
            return Err(self.unsupported("drop_function"));
        }
        let sql = self.require("drop_function", self.generator.drop_function(name))?;
        self.run(&sql, &self.options(QueryKind::Raw)).await?;
        Ok(())
    }

    /// Engine version string.
    ///
    /// # Errors
    ///
    /// * `UnexpectedResult` if the engine returns no scalar
    pub async fn version(&self) -> Result<String, DatabaseError> {
        let sql = self.require("version", self.generator.version())?;
        let result = self
            .run(&sql, &self.options(QueryKind::Version).plain())
            .await?;

        result
            .first_row()
            .and_then(|row| row.columns.into_iter().next())
            .and_then(|(_, value)| value.as_str().map(ToString::to_string))
            .ok_or(DatabaseError::UnexpectedResult)
    }
}
