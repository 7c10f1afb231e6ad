#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use crossdb::dialect::Dialect;
use crossdb::query::{
    DeleteStatement, InsertStatement, Predicate, SelectQuery, SortDirection, UpdateStatement,
    UpsertStatement,
};
use crossdb::schema::{
    Column, Constraint, CreateTableOptions, DataType, DropTableOptions, FunctionSpec, Index,
    TableRef, TriggerSpec,
};
use crossdb::{
    DatabaseError, DatabaseValue, ExecResult, ExecuteOptions, Executor, QueryKind, Row,
    SqlGenerator,
};

pub fn row(columns: Vec<(&str, DatabaseValue)>) -> Row {
    columns
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

pub fn db_error(message: &str) -> DatabaseError {
    DatabaseError::Database {
        code: None,
        message: message.to_string(),
    }
}

/// Executor that logs every statement and answers from a scripted queue,
/// defaulting to [`ExecResult::None`] once the queue runs dry.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    log: Mutex<Vec<(String, QueryKind)>>,
    responses: Mutex<VecDeque<Result<ExecResult, DatabaseError>>>,
}

impl ScriptedExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: Result<ExecResult, DatabaseError>) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(response);
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.push(Ok(ExecResult::Rows(rows)));
    }

    pub fn executed(&self) -> Vec<String> {
        self.log
            .lock()
            .expect("log lock")
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn executed_kinds(&self) -> Vec<QueryKind> {
        self.log
            .lock()
            .expect("log lock")
            .iter()
            .map(|(_, kind)| *kind)
            .collect()
    }
}

#[async_trait]
impl Executor for ScriptedExecutor {
    async fn execute(
        &self,
        sql: &str,
        options: &ExecuteOptions,
    ) -> Result<ExecResult, DatabaseError> {
        self.log
            .lock()
            .expect("log lock")
            .push((sql.to_string(), options.kind));
        self.responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .unwrap_or(Ok(ExecResult::None))
    }
}

fn render_type(data_type: &DataType) -> String {
    match data_type {
        DataType::Text => "TEXT".to_string(),
        DataType::VarChar(size) => format!("VARCHAR({size})"),
        DataType::Char(size) => format!("CHAR({size})"),
        DataType::SmallInt => "SMALLINT".to_string(),
        DataType::Int => "INTEGER".to_string(),
        DataType::BigInt => "BIGINT".to_string(),
        DataType::Serial => "SERIAL".to_string(),
        DataType::BigSerial => "BIGSERIAL".to_string(),
        DataType::Real => "REAL".to_string(),
        DataType::Double => "DOUBLE PRECISION".to_string(),
        DataType::Decimal(precision, scale) => format!("DECIMAL({precision}, {scale})"),
        DataType::Bool => "BOOLEAN".to_string(),
        DataType::Date => "DATE".to_string(),
        DataType::Time => "TIME".to_string(),
        DataType::DateTime => "DATETIME".to_string(),
        DataType::Timestamp => "TIMESTAMP".to_string(),
        DataType::Blob => "BLOB".to_string(),
        DataType::Json => "JSON".to_string(),
        DataType::Uuid => "UUID".to_string(),
        DataType::Enum { name, .. } => name.clone(),
        DataType::Custom(raw) => raw.clone(),
    }
}

pub fn render_value(value: &DatabaseValue) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }
    if let Some(text) = value.as_str() {
        return format!("'{}'", text.replace('\'', "''"));
    }
    if let Some(flag) = value.as_bool() {
        return if flag { "TRUE" } else { "FALSE" }.to_string();
    }
    if let Some(number) = value.as_i64() {
        return number.to_string();
    }
    if let Some(number) = value.as_u64() {
        return number.to_string();
    }
    if let Some(real) = value.as_f64() {
        return real.to_string();
    }
    if let Some(datetime) = value.as_datetime() {
        return format!("'{datetime}'");
    }
    "CURRENT_TIMESTAMP".to_string()
}

pub fn render_predicate(predicate: &Predicate) -> String {
    match predicate {
        Predicate::Eq(column, value) => format!("{column} = {}", render_value(value)),
        Predicate::NotEq(column, value) => format!("{column} <> {}", render_value(value)),
        Predicate::Gt(column, value) => format!("{column} > {}", render_value(value)),
        Predicate::Gte(column, value) => format!("{column} >= {}", render_value(value)),
        Predicate::Lt(column, value) => format!("{column} < {}", render_value(value)),
        Predicate::Lte(column, value) => format!("{column} <= {}", render_value(value)),
        Predicate::In(column, values) => format!(
            "{column} IN ({})",
            values.iter().map(render_value).collect::<Vec<_>>().join(", ")
        ),
        Predicate::And(conditions) => format!(
            "({})",
            conditions
                .iter()
                .map(render_predicate)
                .collect::<Vec<_>>()
                .join(" AND ")
        ),
        Predicate::Or(conditions) => format!(
            "({})",
            conditions
                .iter()
                .map(render_predicate)
                .collect::<Vec<_>>()
                .join(" OR ")
        ),
        Predicate::Raw(sql) => sql.clone(),
    }
}

fn render_column(column: &Column) -> String {
    let mut sql = format!("{} {}", column.name, render_type(&column.data_type));
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if column.primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", render_value(default)));
    }
    sql
}

fn render_assignments(values: &[(String, DatabaseValue)]) -> String {
    values
        .iter()
        .map(|(name, value)| format!("{name} = {}", render_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Deterministic generator producing recognizable SQL for assertions. Not a
/// faithful dialect implementation, just shaped enough to drive the
/// dispatcher's strategy selection.
#[derive(Debug)]
pub struct TestGenerator {
    pub dialect: Dialect,
    /// Answer foreign-key catalog queries; `false` simulates a generator with
    /// no catalog support.
    pub fk_catalog: bool,
    /// Produce a native rename-column statement; `false` simulates a
    /// generator without one.
    pub native_column_rename: bool,
}

impl TestGenerator {
    pub fn new(dialect: Dialect) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            fk_catalog: true,
            native_column_rename: true,
        })
    }

    pub fn without_fk_catalog(dialect: Dialect) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            fk_catalog: false,
            native_column_rename: true,
        })
    }

    pub fn without_native_rename(dialect: Dialect) -> Arc<Self> {
        Arc::new(Self {
            dialect,
            fk_catalog: true,
            native_column_rename: false,
        })
    }
}

impl SqlGenerator for TestGenerator {
    fn create_table(
        &self,
        table: &TableRef,
        columns: &[Column],
        options: &CreateTableOptions,
    ) -> Option<String> {
        let if_not_exists = if options.if_not_exists {
            "IF NOT EXISTS "
        } else {
            ""
        };
        let columns = columns.iter().map(render_column).collect::<Vec<_>>().join(", ");
        Some(format!("CREATE TABLE {if_not_exists}{table} ({columns})"))
    }

    fn drop_table(&self, table: &TableRef, options: &DropTableOptions) -> Option<String> {
        let if_exists = if options.if_exists { "IF EXISTS " } else { "" };
        let cascade = if options.cascade { " CASCADE" } else { "" };
        Some(format!("DROP TABLE {if_exists}{table}{cascade}"))
    }

    fn rename_table(&self, from: &TableRef, to: &TableRef) -> Option<String> {
        Some(format!("ALTER TABLE {from} RENAME TO {to}"))
    }

    fn add_column(&self, table: &TableRef, column: &Column) -> Option<String> {
        Some(format!(
            "ALTER TABLE {table} ADD COLUMN {}",
            render_column(column)
        ))
    }

    fn drop_column(&self, table: &TableRef, column: &str) -> Option<String> {
        Some(format!("ALTER TABLE {table} DROP COLUMN {column}"))
    }

    fn rename_column(&self, table: &TableRef, from: &str, to: &str) -> Option<String> {
        if !self.native_column_rename {
            return None;
        }
        Some(format!("ALTER TABLE {table} RENAME COLUMN {from} TO {to}"))
    }

    fn change_column(&self, table: &TableRef, column: &Column) -> Option<String> {
        match self.dialect {
            Dialect::Sqlite => None,
            _ => Some(format!(
                "ALTER TABLE {table} ALTER COLUMN {}",
                render_column(column)
            )),
        }
    }

    fn add_index(&self, index: &Index) -> Option<String> {
        let unique = if index.unique { "UNIQUE " } else { "" };
        Some(format!(
            "CREATE {unique}INDEX {} ON {} ({})",
            index.resolved_name(),
            index.table,
            index.columns.join(", ")
        ))
    }

    fn drop_index(&self, table: &TableRef, name: &str) -> Option<String> {
        Some(format!("DROP INDEX {name} ON {table}"))
    }

    fn add_constraint(&self, table: &TableRef, constraint: &Constraint) -> Option<String> {
        Some(format!(
            "ALTER TABLE {table} ADD CONSTRAINT {}",
            constraint.resolved_name(table)
        ))
    }

    fn drop_constraint(&self, table: &TableRef, name: &str) -> Option<String> {
        Some(format!("ALTER TABLE {table} DROP CONSTRAINT {name}"))
    }

    fn default_constraint_query(&self, table: &TableRef, column: &str) -> Option<String> {
        match self.dialect {
            Dialect::Mssql => Some(format!(
                "SELECT constraint_name FROM default_constraints WHERE table_name = '{}' AND column_name = '{column}'",
                table.name
            )),
            _ => None,
        }
    }

    fn create_enum_type(&self, name: &str, variants: &[String]) -> Option<String> {
        match self.dialect {
            Dialect::Postgres => Some(format!(
                "CREATE TYPE {name} AS ENUM ({})",
                variants
                    .iter()
                    .map(|v| format!("'{v}'"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
            _ => None,
        }
    }

    fn drop_enum_type(&self, name: &str) -> Option<String> {
        match self.dialect {
            Dialect::Postgres => Some(format!("DROP TYPE {name}")),
            _ => None,
        }
    }

    fn enum_type_exists(&self, name: &str) -> Option<String> {
        match self.dialect {
            Dialect::Postgres => Some(format!(
                "SELECT 1 FROM pg_type WHERE typname = '{name}'"
            )),
            _ => None,
        }
    }

    fn enum_type_usage(&self, name: &str) -> Option<String> {
        match self.dialect {
            Dialect::Postgres => Some(format!(
                "SELECT table_name FROM information_schema.columns WHERE udt_name = '{name}'"
            )),
            _ => None,
        }
    }

    fn disable_foreign_keys(&self) -> Option<String> {
        match self.dialect {
            Dialect::Sqlite => Some("PRAGMA foreign_keys = OFF".to_string()),
            Dialect::MySql => Some("SET FOREIGN_KEY_CHECKS = 0".to_string()),
            _ => None,
        }
    }

    fn enable_foreign_keys(&self) -> Option<String> {
        match self.dialect {
            Dialect::Sqlite => Some("PRAGMA foreign_keys = ON".to_string()),
            Dialect::MySql => Some("SET FOREIGN_KEY_CHECKS = 1".to_string()),
            _ => None,
        }
    }

    fn select(&self, query: &SelectQuery) -> Option<String> {
        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if query.distinct { "DISTINCT " } else { "" },
            query.columns.join(", "),
            query.table
        );
        if let Some(filter) = &query.filter {
            sql.push_str(&format!(" WHERE {}", render_predicate(filter)));
        }
        if !query.sorts.is_empty() {
            let sorts = query
                .sorts
                .iter()
                .map(|(column, direction)| {
                    let direction = match direction {
                        SortDirection::Asc => "ASC",
                        SortDirection::Desc => "DESC",
                    };
                    format!("{column} {direction}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&format!(" ORDER BY {sorts}"));
        }
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Some(sql)
    }

    fn insert(&self, statement: &InsertStatement) -> Option<String> {
        let columns = statement
            .values
            .iter()
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>()
            .join(", ");
        let values = statement
            .values
            .iter()
            .map(|(_, value)| render_value(value))
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "INSERT INTO {} ({columns}) VALUES ({values})",
            statement.table
        ))
    }

    fn bulk_insert(
        &self,
        table: &TableRef,
        columns: &[String],
        rows: &[Vec<DatabaseValue>],
    ) -> Option<String> {
        let values = rows
            .iter()
            .map(|row| {
                format!(
                    "({})",
                    row.iter().map(render_value).collect::<Vec<_>>().join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!(
            "INSERT INTO {table} ({}) VALUES {values}",
            columns.join(", ")
        ))
    }

    fn update(&self, statement: &UpdateStatement) -> Option<String> {
        let mut sql = format!(
            "UPDATE {} SET {}",
            statement.table,
            render_assignments(&statement.values)
        );
        if let Some(filter) = &statement.filter {
            sql.push_str(&format!(" WHERE {}", render_predicate(filter)));
        }
        if let Some(limit) = statement.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Some(sql)
    }

    fn delete(&self, statement: &DeleteStatement) -> Option<String> {
        let mut sql = format!("DELETE FROM {}", statement.table);
        if let Some(filter) = &statement.filter {
            sql.push_str(&format!(" WHERE {}", render_predicate(filter)));
        }
        if let Some(limit) = statement.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        Some(sql)
    }

    fn truncate(&self, table: &TableRef) -> Option<String> {
        match self.dialect {
            Dialect::Sqlite => None,
            _ => Some(format!("TRUNCATE TABLE {table}")),
        }
    }

    fn upsert(&self, statement: &UpsertStatement, conflict: Option<&Predicate>) -> Option<String> {
        let insert = self.insert(&InsertStatement {
            table: statement.table.clone(),
            values: statement.values.clone(),
        })?;
        let updates = if statement.update_values.is_empty() {
            render_assignments(&statement.values)
        } else {
            render_assignments(&statement.update_values)
        };
        let target = conflict.map(render_predicate).unwrap_or_default();

        Some(match self.dialect {
            Dialect::Postgres | Dialect::Sqlite => {
                format!("{insert} ON CONFLICT ({target}) DO UPDATE SET {updates} RETURNING *")
            }
            Dialect::MySql => format!("{insert} ON DUPLICATE KEY UPDATE {updates}"),
            Dialect::Mssql => format!(
                "MERGE INTO {} USING ({target}) WHEN MATCHED THEN UPDATE SET {updates} WHEN NOT MATCHED THEN {insert} OUTPUT $action",
                statement.table
            ),
        })
    }

    fn increment(
        &self,
        table: &TableRef,
        deltas: &[(String, i64)],
        filter: Option<&Predicate>,
    ) -> Option<String> {
        let assignments = deltas
            .iter()
            .map(|(column, delta)| format!("{column} = {column} + {delta}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {table} SET {assignments}");
        if let Some(filter) = filter {
            sql.push_str(&format!(" WHERE {}", render_predicate(filter)));
        }
        Some(sql)
    }

    fn describe_table(&self, table: &TableRef) -> Option<String> {
        Some(match self.dialect {
            Dialect::Sqlite => format!("PRAGMA table_info({})", table.name),
            Dialect::MySql => format!(
                "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS WHERE TABLE_NAME = '{}'",
                table.name
            ),
            Dialect::Postgres | Dialect::Mssql => format!(
                "SELECT column_name FROM information_schema.columns WHERE table_name = '{}'",
                table.name
            ),
        })
    }

    fn list_tables(&self, schema: Option<&str>) -> Option<String> {
        let schema = schema.unwrap_or("public");
        Some(match self.dialect {
            Dialect::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table'".to_string(),
            _ => format!(
                "SELECT table_name FROM information_schema.tables WHERE table_schema = '{schema}'"
            ),
        })
    }

    fn foreign_keys(&self, table: &TableRef) -> Option<String> {
        if !self.fk_catalog {
            return None;
        }
        Some(match self.dialect {
            Dialect::Sqlite => format!("PRAGMA foreign_key_list({})", table.name),
            _ => format!(
                "SELECT constraint_name FROM referential_constraints WHERE table_name = '{}'",
                table.name
            ),
        })
    }

    fn foreign_key_references(&self, table: &TableRef) -> Option<String> {
        if !self.fk_catalog {
            return None;
        }
        Some(match self.dialect {
            Dialect::Sqlite => format!("PRAGMA foreign_key_list({})", table.name),
            _ => format!(
                "SELECT constraint_name FROM referential_constraints WHERE referenced_table_name = '{}'",
                table.name
            ),
        })
    }

    fn create_trigger(&self, trigger: &TriggerSpec) -> Option<String> {
        match self.dialect {
            Dialect::Postgres => Some(format!(
                "CREATE TRIGGER {} ON {} EXECUTE FUNCTION {}()",
                trigger.name, trigger.table, trigger.function
            )),
            _ => None,
        }
    }

    fn drop_trigger(&self, table: &TableRef, name: &str) -> Option<String> {
        match self.dialect {
            Dialect::Postgres => Some(format!("DROP TRIGGER {name} ON {table}")),
            _ => None,
        }
    }

    fn create_function(&self, function: &FunctionSpec) -> Option<String> {
        match self.dialect {
            Dialect::Postgres => Some(format!(
                "CREATE FUNCTION {}() RETURNS {} AS $$ {} $$ LANGUAGE {}",
                function.name, function.returns, function.body, function.language
            )),
            _ => None,
        }
    }

    fn drop_function(&self, name: &str) -> Option<String> {
        match self.dialect {
            Dialect::Postgres => Some(format!("DROP FUNCTION {name}")),
            _ => None,
        }
    }

    fn set_autocommit(&self, enabled: bool) -> Option<String> {
        Some(format!("SET AUTOCOMMIT = {}", u8::from(enabled)))
    }

    fn defer_constraints(&self) -> Option<String> {
        match self.dialect {
            Dialect::Postgres => Some("SET CONSTRAINTS ALL DEFERRED".to_string()),
            _ => None,
        }
    }
}
