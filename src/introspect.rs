//! Schema introspection.
//!
//! Every engine answers metadata queries in its own shape: `information_schema`
//! with lowercase keys on Postgres and SQL Server, uppercase keys on MySQL,
//! `PRAGMA` result tables on SQLite. The functions here fold each raw shape
//! into the canonical [`ColumnInfo`] and [`ForeignKeyInfo`] forms so callers
//! never see dialect-specific field names.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::dialect::{Capability, Dialect};
use crate::dispatcher::Dispatcher;
use crate::executor::QueryKind;
use crate::schema::{ColumnInfo, DataType, ForeignKeyInfo, TableInfo, TableRef};
use crate::{DatabaseError, DatabaseValue, Row};

fn parametric_type() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^([a-z ]+?)\s*\(\s*(\d+)\s*(?:,\s*(\d+)\s*)?\)")
            .expect("parametric type pattern")
    })
}

/// Map a raw engine type name to the canonical [`DataType`].
///
/// Unrecognized names come back as [`DataType::Custom`] carrying the raw text
/// so recreation workarounds can still reproduce the column verbatim.
#[must_use]
pub fn parse_data_type(raw: &str) -> DataType {
    let trimmed = raw.trim();

    if let Some(captures) = parametric_type().captures(trimmed) {
        let base = captures[1].trim().to_ascii_lowercase();
        let first: u16 = captures[2].parse().unwrap_or(0);
        let second: Option<u8> = captures.get(3).and_then(|m| m.as_str().parse().ok());

        match base.as_str() {
            "varchar" | "character varying" | "nvarchar" => return DataType::VarChar(first),
            "char" | "character" | "nchar" => return DataType::Char(first),
            "decimal" | "numeric" => {
                let precision = u8::try_from(first).unwrap_or(u8::MAX);
                return DataType::Decimal(precision, second.unwrap_or(0));
            }
            _ => {}
        }
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "text" | "longtext" | "mediumtext" | "clob" | "ntext" => DataType::Text,
        "varchar" | "character varying" | "nvarchar" => DataType::VarChar(255),
        "smallint" | "int2" | "tinyint" => DataType::SmallInt,
        "int" | "integer" | "int4" | "mediumint" => DataType::Int,
        "bigint" | "int8" => DataType::BigInt,
        "serial" => DataType::Serial,
        "bigserial" => DataType::BigSerial,
        "real" | "float4" | "float" => DataType::Real,
        "double" | "double precision" | "float8" => DataType::Double,
        "decimal" | "numeric" => DataType::Decimal(10, 0),
        "boolean" | "bool" | "bit" => DataType::Bool,
        "date" => DataType::Date,
        "time" | "time without time zone" => DataType::Time,
        "datetime" | "datetime2" => DataType::DateTime,
        "timestamp" | "timestamp without time zone" | "timestamp with time zone"
        | "timestamptz" => DataType::Timestamp,
        "blob" | "longblob" | "mediumblob" | "bytea" | "binary" | "varbinary" | "image" => {
            DataType::Blob
        }
        "json" | "jsonb" => DataType::Json,
        "uuid" | "uniqueidentifier" => DataType::Uuid,
        _ => DataType::Custom(trimmed.to_string()),
    }
}

/// Interpret a raw column default.
///
/// Returns the parsed default value and whether the default marks the column
/// as auto-incrementing (sequence-backed defaults like `nextval(..)`).
#[must_use]
pub fn parse_default(dialect: Dialect, raw: &str) -> (Option<DatabaseValue>, bool) {
    let mut text = raw.trim();
    if text.is_empty() {
        return (None, false);
    }

    let lowered = text.to_ascii_lowercase();
    if lowered.contains("nextval(") || lowered.contains("auto_increment") {
        return (None, true);
    }

    // Postgres suffixes literals with a cast.
    if dialect == Dialect::Postgres {
        if let Some(index) = text.find("::") {
            text = text[..index].trim_end();
        }
    }

    // SQL Server wraps defaults in parentheses, sometimes twice.
    if dialect == Dialect::Mssql {
        while text.starts_with('(') && text.ends_with(')') && text.len() >= 2 {
            text = text[1..text.len() - 1].trim();
        }
    }

    let upper = text.to_ascii_uppercase();
    match upper.as_str() {
        "NULL" => return (Some(DatabaseValue::Null), false),
        "TRUE" => return (Some(DatabaseValue::Bool(true)), false),
        "FALSE" => return (Some(DatabaseValue::Bool(false)), false),
        "CURRENT_TIMESTAMP" | "CURRENT_TIMESTAMP()" | "NOW()" | "GETDATE()" | "GETUTCDATE()" => {
            return (Some(DatabaseValue::Now), false);
        }
        _ => {}
    }

    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        let inner = text[1..text.len() - 1].replace("''", "'");
        return (Some(DatabaseValue::String(inner)), false);
    }

    if let Ok(number) = text.parse::<i64>() {
        return (Some(DatabaseValue::Number(number)), false);
    }
    if let Ok(real) = text.parse::<f64>() {
        return (Some(DatabaseValue::Real(real)), false);
    }

    (Some(DatabaseValue::String(text.to_string())), false)
}

fn text_value(row: &Row, key: &str) -> Option<String> {
    row.get(key)
        .as_ref()
        .and_then(|v| v.as_str().map(ToString::to_string))
}

fn integer_value(row: &Row, key: &str) -> Option<i64> {
    let value = row.get(key)?;
    value
        .as_i64()
        .or_else(|| value.as_u64().and_then(|v| i64::try_from(v).ok()))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

fn flag_value(row: &Row, key: &str) -> bool {
    row.get(key).is_some_and(|value| {
        value.as_bool().unwrap_or(false)
            || value.as_i64().is_some_and(|v| v != 0)
            || value.as_u64().is_some_and(|v| v != 0)
            || value
                .as_str()
                .is_some_and(|s| matches!(s.to_ascii_uppercase().as_str(), "YES" | "TRUE" | "1"))
    })
}

/// Fold raw column-metadata rows into canonical form, keyed by column name.
#[must_use]
pub fn normalize_columns(dialect: Dialect, rows: &[Row]) -> BTreeMap<String, ColumnInfo> {
    let mut columns = BTreeMap::new();

    for (index, row) in rows.iter().enumerate() {
        let fallback_position = u32::try_from(index + 1).unwrap_or(u32::MAX);

        let info = match dialect {
            Dialect::Sqlite => normalize_sqlite_column(row, fallback_position),
            Dialect::MySql => normalize_mysql_column(row, fallback_position),
            Dialect::Postgres | Dialect::Mssql => {
                normalize_information_schema_column(dialect, row, fallback_position)
            }
        };

        if let Some(info) = info {
            columns.insert(info.name.clone(), info);
        }
    }

    columns
}

// PRAGMA table_info: cid, name, type, notnull, dflt_value, pk
fn normalize_sqlite_column(row: &Row, fallback_position: u32) -> Option<ColumnInfo> {
    let name = text_value(row, "name")?;
    let data_type = parse_data_type(&text_value(row, "type").unwrap_or_default());
    let is_primary_key = flag_value(row, "pk");
    let (default_value, _) = text_value(row, "dflt_value")
        .map_or((None, false), |raw| parse_default(Dialect::Sqlite, &raw));

    // INTEGER PRIMARY KEY columns alias the rowid.
    let auto_increment =
        is_primary_key && matches!(data_type, DataType::Int | DataType::BigInt);

    Some(ColumnInfo {
        name,
        data_type,
        nullable: !flag_value(row, "notnull"),
        is_primary_key,
        auto_increment,
        default_value,
        ordinal_position: integer_value(row, "cid")
            .and_then(|cid| u32::try_from(cid + 1).ok())
            .unwrap_or(fallback_position),
    })
}

// information_schema.columns with MySQL's uppercase field names.
fn normalize_mysql_column(row: &Row, fallback_position: u32) -> Option<ColumnInfo> {
    let name = text_value(row, "COLUMN_NAME")?;
    let raw_type = text_value(row, "COLUMN_TYPE")
        .or_else(|| text_value(row, "DATA_TYPE"))
        .unwrap_or_default();
    let extra = text_value(row, "EXTRA").unwrap_or_default();
    let (default_value, sequence_default) = text_value(row, "COLUMN_DEFAULT")
        .map_or((None, false), |raw| parse_default(Dialect::MySql, &raw));

    Some(ColumnInfo {
        name,
        data_type: parse_data_type(&raw_type),
        nullable: flag_value(row, "IS_NULLABLE"),
        is_primary_key: text_value(row, "COLUMN_KEY").as_deref() == Some("PRI"),
        auto_increment: extra.to_ascii_lowercase().contains("auto_increment") || sequence_default,
        default_value,
        ordinal_position: integer_value(row, "ORDINAL_POSITION")
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(fallback_position),
    })
}

fn normalize_information_schema_column(
    dialect: Dialect,
    row: &Row,
    fallback_position: u32,
) -> Option<ColumnInfo> {
    let name = text_value(row, "column_name")?;
    let (default_value, auto_increment) = text_value(row, "column_default")
        .map_or((None, false), |raw| parse_default(dialect, &raw));

    let data_type = parse_data_type(&text_value(row, "data_type").unwrap_or_default());
    let data_type = if auto_increment {
        match data_type {
            DataType::BigInt => DataType::BigSerial,
            DataType::Int | DataType::SmallInt => DataType::Serial,
            other => other,
        }
    } else {
        data_type
    };

    Some(ColumnInfo {
        name,
        data_type,
        nullable: flag_value(row, "is_nullable"),
        is_primary_key: flag_value(row, "is_primary_key"),
        auto_increment,
        default_value,
        ordinal_position: integer_value(row, "ordinal_position")
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(fallback_position),
    })
}

/// Fold raw foreign-key rows into canonical form. `table` is the table the
/// query was issued for and backfills fields the raw shape omits.
#[must_use]
pub fn normalize_foreign_keys(
    dialect: Dialect,
    table: &TableRef,
    rows: &[Row],
) -> Vec<ForeignKeyInfo> {
    rows.iter()
        .filter_map(|row| match dialect {
            Dialect::Sqlite => normalize_sqlite_foreign_key(table, row),
            Dialect::MySql => normalize_catalog_foreign_key(table, row, true),
            Dialect::Postgres | Dialect::Mssql => {
                normalize_catalog_foreign_key(table, row, false)
            }
        })
        .collect()
}

// PRAGMA foreign_key_list: id, seq, table, from, to, on_update, on_delete.
// SQLite does not name inline constraints, so one is synthesized.
fn normalize_sqlite_foreign_key(table: &TableRef, row: &Row) -> Option<ForeignKeyInfo> {
    let column = text_value(row, "from")?;
    let id = integer_value(row, "id").unwrap_or(0);

    Some(ForeignKeyInfo {
        name: format!("{}_{column}_fk{id}", table.name),
        table: table.name.clone(),
        column,
        referenced_table: text_value(row, "table")?,
        referenced_column: text_value(row, "to").unwrap_or_else(|| "id".to_string()),
        on_update: text_value(row, "on_update"),
        on_delete: text_value(row, "on_delete"),
    })
}

fn normalize_catalog_foreign_key(
    table: &TableRef,
    row: &Row,
    uppercase: bool,
) -> Option<ForeignKeyInfo> {
    let key = |lower: &str, upper: &str| if uppercase { upper.to_string() } else { lower.to_string() };

    Some(ForeignKeyInfo {
        name: text_value(row, &key("constraint_name", "CONSTRAINT_NAME"))?,
        table: text_value(row, &key("table_name", "TABLE_NAME"))
            .unwrap_or_else(|| table.name.clone()),
        column: text_value(row, &key("column_name", "COLUMN_NAME"))?,
        referenced_table: text_value(row, &key("referenced_table_name", "REFERENCED_TABLE_NAME"))?,
        referenced_column: text_value(
            row,
            &key("referenced_column_name", "REFERENCED_COLUMN_NAME"),
        )?,
        on_update: text_value(row, &key("update_rule", "UPDATE_RULE")),
        on_delete: text_value(row, &key("delete_rule", "DELETE_RULE")),
    })
}

impl Dispatcher {
    /// Canonical column metadata for `table`, keyed by column name.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the table has no columns (it does not exist)
    /// * `Unsupported` if the dialect defines no describe query
    pub async fn describe_table(
        &self,
        table: &TableRef,
    ) -> Result<BTreeMap<String, ColumnInfo>, DatabaseError> {
        let sql = self.require("describe_table", self.generator.describe_table(table))?;
        let rows = self
            .run(&sql, &self.options(QueryKind::Describe))
            .await?
            .rows();

        let columns = normalize_columns(self.dialect, &rows);
        if columns.is_empty() {
            return Err(DatabaseError::NotFound(format!("table '{table}'")));
        }
        Ok(columns)
    }

    /// Column metadata sorted by ordinal position, for workarounds that must
    /// reproduce the table's declared column order.
    pub(crate) async fn describe_table_ordered(
        &self,
        table: &TableRef,
    ) -> Result<Vec<ColumnInfo>, DatabaseError> {
        let mut columns: Vec<ColumnInfo> =
            self.describe_table(table).await?.into_values().collect();
        columns.sort_by_key(|c| c.ordinal_position);
        Ok(columns)
    }

    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no describe query
    pub async fn table_exists(&self, table: &TableRef) -> Result<bool, DatabaseError> {
        let sql = self.require("describe_table", self.generator.describe_table(table))?;
        let rows = self
            .run(&sql, &self.options(QueryKind::Describe))
            .await?
            .rows();
        Ok(!rows.is_empty())
    }

    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no describe query
    pub async fn column_exists(
        &self,
        table: &TableRef,
        column_name: &str,
    ) -> Result<bool, DatabaseError> {
        let sql = self.require("describe_table", self.generator.describe_table(table))?;
        let rows = self
            .run(&sql, &self.options(QueryKind::Describe))
            .await?
            .rows();
        Ok(normalize_columns(self.dialect, &rows).contains_key(column_name))
    }

    /// Table names visible in `schema` (the engine default when `None`).
    ///
    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no listing query
    pub async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<String>, DatabaseError> {
        let sql = self.require("list_tables", self.generator.list_tables(schema))?;
        let rows = self
            .run(&sql, &self.options(QueryKind::ShowTables))
            .await?
            .rows();

        Ok(rows
            .iter()
            .filter_map(|row| {
                row.columns
                    .first()
                    .and_then(|(_, value)| value.as_str().map(ToString::to_string))
            })
            .collect())
    }

    /// Foreign keys declared by `table`.
    ///
    /// Engines without a queryable foreign-key catalog report none rather
    /// than failing.
    ///
    /// # Errors
    ///
    /// * `DatabaseError::Database` if the catalog query fails
    pub async fn foreign_keys_for_table(
        &self,
        table: &TableRef,
    ) -> Result<Vec<ForeignKeyInfo>, DatabaseError> {
        if !self.dialect.supports(Capability::ForeignKeyCatalog) {
            return Ok(vec![]);
        }
        let Some(sql) = self.generator.foreign_keys(table) else {
            return Ok(vec![]);
        };
        let rows = self
            .run(&sql, &self.options(QueryKind::ForeignKeys))
            .await?
            .rows();
        Ok(normalize_foreign_keys(self.dialect, table, &rows))
    }

    /// Foreign keys in other tables referencing `table`.
    ///
    /// # Errors
    ///
    /// * `DatabaseError::Database` if the catalog query fails
    pub async fn foreign_key_references_for_table(
        &self,
        table: &TableRef,
    ) -> Result<Vec<ForeignKeyInfo>, DatabaseError> {
        if !self.dialect.supports(Capability::ForeignKeyCatalog) {
            return Ok(vec![]);
        }
        let Some(sql) = self.generator.foreign_key_references(table) else {
            return Ok(vec![]);
        };
        let rows = self
            .run(&sql, &self.options(QueryKind::ForeignKeys))
            .await?
            .rows();
        Ok(normalize_foreign_keys(self.dialect, table, &rows))
    }

    /// Columns and declared foreign keys for `table` in one structure.
    ///
    /// # Errors
    ///
    /// * `NotFound` if the table does not exist
    pub async fn get_table_info(&self, table: &TableRef) -> Result<TableInfo, DatabaseError> {
        let columns = self.describe_table(table).await?;
        let foreign_keys = self
            .foreign_keys_for_table(table)
            .await?
            .into_iter()
            .map(|fk| (fk.column.clone(), fk))
            .collect();

        Ok(TableInfo {
            name: table.name.clone(),
            columns,
            foreign_keys,
        })
    }
}
