//! Schema descriptors and introspection shapes.
//!
//! Descriptors are fully resolved before they reach the SQL generator: no
//! deferred type inference, no optional fields left implicit. Introspection
//! results use one canonical shape regardless of the dialect that produced
//! the raw rows.

use std::collections::BTreeMap;
use std::fmt;

use crate::{DatabaseError, DatabaseValue};
use crate::query::Predicate;

/// Identity for all table-targeted operations. Two refs are equal iff both
/// name and schema match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub name: String,
    pub schema: Option<String>,
}

impl TableRef {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }
}

impl From<&str> for TableRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TableRef {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Text,
    VarChar(u16),
    Char(u16),
    SmallInt,
    Int,
    BigInt,
    Serial,
    BigSerial,
    Real,
    Double,
    Decimal(u8, u8),
    Bool,
    Date,
    Time,
    DateTime,
    Timestamp,
    Blob,
    Json,
    Uuid,
    /// Named enumerated type. On engines with named enum types the type is
    /// created before the first table that uses it and dropped after the last.
    Enum {
        name: String,
        variants: Vec<String>,
    },
    Custom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferentialAction {
    Cascade,
    Restrict,
    SetNull,
    SetDefault,
    NoAction,
}

impl ReferentialAction {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Cascade => "CASCADE",
            Self::Restrict => "RESTRICT",
            Self::SetNull => "SET NULL",
            Self::SetDefault => "SET DEFAULT",
            Self::NoAction => "NO ACTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnReference {
    pub table: TableRef,
    pub column: String,
    pub on_update: Option<ReferentialAction>,
    pub on_delete: Option<ReferentialAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub default: Option<DatabaseValue>,
    pub references: Option<ColumnReference>,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            auto_increment: false,
            default: None,
            references: None,
        }
    }

    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    #[must_use]
    pub const fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<DatabaseValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn references(mut self, reference: ColumnReference) -> Self {
        self.references = Some(reference);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateTableOptions {
    pub if_not_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DropTableOptions {
    pub if_exists: bool,
    pub cascade: bool,
}

/// Index descriptor. The default name is a deterministic function of table
/// and field names so repeated calls are idempotent-detectable.
#[derive(Debug, Clone)]
pub struct Index {
    pub table: TableRef,
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub unique: bool,
    pub using: Option<String>,
    pub filter: Option<Predicate>,
}

impl Index {
    #[must_use]
    pub fn new(table: impl Into<TableRef>, columns: &[&str]) -> Self {
        Self {
            table: table.into(),
            name: None,
            columns: columns.iter().map(ToString::to_string).collect(),
            unique: false,
            using: None,
            filter: None,
        }
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub const fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    #[must_use]
    pub fn using(mut self, method: impl Into<String>) -> Self {
        self.using = Some(method.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    #[must_use]
    pub fn resolved_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| default_index_name(&self.table, &self.columns))
    }
}

#[must_use]
pub fn default_index_name(table: &TableRef, columns: &[String]) -> String {
    format!("{}_{}", table.name, columns.join("_"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    Check,
    Default,
    PrimaryKey,
    ForeignKey,
}

impl ConstraintKind {
    const fn name_suffix(self) -> &'static str {
        match self {
            Self::Unique => "uk",
            Self::Check => "ck",
            Self::Default => "df",
            Self::PrimaryKey => "pk",
            Self::ForeignKey => "fk",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintReference {
    pub table: TableRef,
    pub column: String,
}

/// The constraint kind is mandatory by construction; the remaining structural
/// invariants are checked by [`Constraint::validate`] before any SQL is
/// generated.
#[derive(Debug, Clone)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    pub name: Option<String>,
    pub references: Option<ConstraintReference>,
    pub on_update: Option<ReferentialAction>,
    pub on_delete: Option<ReferentialAction>,
    pub check: Option<Predicate>,
    pub default: Option<DatabaseValue>,
}

impl Constraint {
    #[must_use]
    pub const fn new(kind: ConstraintKind) -> Self {
        Self {
            kind,
            columns: vec![],
            name: None,
            references: None,
            on_update: None,
            on_delete: None,
            check: None,
            default: None,
        }
    }

    #[must_use]
    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn references(mut self, table: impl Into<TableRef>, column: impl Into<String>) -> Self {
        self.references = Some(ConstraintReference {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    #[must_use]
    pub const fn on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = Some(action);
        self
    }

    #[must_use]
    pub const fn on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = Some(action);
        self
    }

    #[must_use]
    pub fn check(mut self, predicate: Predicate) -> Self {
        self.check = Some(predicate);
        self
    }

    #[must_use]
    pub fn default(mut self, value: impl Into<DatabaseValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Structural validation, raised before any SQL is generated.
    ///
    /// # Errors
    ///
    /// * `InvalidArgument` if a required field for the constraint kind is
    ///   absent.
    pub fn validate(&self) -> Result<(), DatabaseError> {
        if self.columns.is_empty() && self.kind != ConstraintKind::Check {
            return Err(DatabaseError::InvalidArgument(
                "constraint requires at least one column".to_string(),
            ));
        }
        match self.kind {
            ConstraintKind::ForeignKey if self.references.is_none() => {
                Err(DatabaseError::InvalidArgument(
                    "foreign key constraint requires references".to_string(),
                ))
            }
            ConstraintKind::Check if self.check.is_none() => Err(DatabaseError::InvalidArgument(
                "check constraint requires a predicate".to_string(),
            )),
            ConstraintKind::Default if self.default.is_none() => {
                Err(DatabaseError::InvalidArgument(
                    "default constraint requires a default value".to_string(),
                ))
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn resolved_name(&self, table: &TableRef) -> String {
        self.name.clone().unwrap_or_else(|| {
            format!(
                "{}_{}_{}",
                table.name,
                self.columns.join("_"),
                self.kind.name_suffix()
            )
        })
    }
}

/// Canonical column metadata produced by introspection.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub auto_increment: bool,
    pub default_value: Option<DatabaseValue>,
    /// 1-based position of the column in the table.
    pub ordinal_position: u32,
}

impl ColumnInfo {
    /// Rebuild a creatable column definition from introspected metadata.
    #[must_use]
    pub fn to_column(&self) -> Column {
        Column {
            name: self.name.clone(),
            data_type: self.data_type.clone(),
            nullable: self.nullable,
            primary_key: self.is_primary_key,
            auto_increment: self.auto_increment,
            default: self.default_value.clone(),
            references: None,
        }
    }
}

/// Canonical foreign-key metadata, identical across dialects even though each
/// dialect's raw result uses different field casing and shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyInfo {
    pub name: String,
    /// Table owning the constraint.
    pub table: String,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub on_update: Option<String>,
    pub on_delete: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub name: String,
    pub columns: BTreeMap<String, ColumnInfo>,
    pub foreign_keys: BTreeMap<String, ForeignKeyInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerTiming {
    Before,
    After,
    InsteadOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub struct TriggerSpec {
    pub table: TableRef,
    pub name: String,
    pub timing: TriggerTiming,
    pub events: Vec<TriggerEvent>,
    /// Name of the stored function the trigger invokes.
    pub function: String,
}

#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub returns: String,
    pub language: String,
    pub body: String,
}
