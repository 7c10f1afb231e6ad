//! Dialect identifiers and the static capability table.
//!
//! Strategy selection is data-driven: each engine declares the features it
//! supports natively and the dispatcher picks a workaround whenever a flag is
//! absent. Adding an engine is a data change here, not a code change at the
//! call sites.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    MySql,
    Sqlite,
    Mssql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::MySql => write!(f, "mysql"),
            Self::Sqlite => write!(f, "sqlite"),
            Self::Mssql => write!(f, "mssql"),
        }
    }
}

/// Per-engine feature flags consulted before every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// `CREATE SCHEMA` / multiple namespaces per database.
    Schemas,
    /// Named enumerated types with their own create/drop lifecycle.
    NamedEnumTypes,
    /// `ALTER TABLE .. DROP COLUMN`.
    ColumnDrop,
    /// Dropping a column still carrying a default or foreign-key constraint
    /// without dropping the constraint first.
    ConstrainedColumnDrop,
    /// Native `ALTER TABLE .. RENAME COLUMN`.
    ColumnRename,
    /// Adding constraints to an existing table via `ALTER TABLE .. ADD`.
    AddConstraints,
    /// `CHECK` constraints.
    CheckConstraints,
    /// Named `DEFAULT` constraints as standalone objects.
    DefaultConstraints,
    /// `SET CONSTRAINTS ALL DEFERRED` inside a transaction.
    DeferredConstraints,
    /// A session-level switch that disables foreign-key enforcement.
    DisableForeignKeys,
    /// Foreign-key metadata is queryable from a catalog.
    ForeignKeyCatalog,
    /// Per-transaction isolation levels.
    IsolationLevels,
    /// An explicit autocommit session flag.
    Autocommit,
    /// `TRUNCATE TABLE`.
    Truncate,
    /// Stored functions and trigger DDL.
    ProceduralFunctions,
}

const CAPABILITIES: &[(Dialect, &[Capability])] = &[
    (
        Dialect::Postgres,
        &[
            Capability::Schemas,
            Capability::NamedEnumTypes,
            Capability::ColumnDrop,
            Capability::ConstrainedColumnDrop,
            Capability::ColumnRename,
            Capability::AddConstraints,
            Capability::CheckConstraints,
            Capability::DeferredConstraints,
            Capability::ForeignKeyCatalog,
            Capability::IsolationLevels,
            Capability::Truncate,
            Capability::ProceduralFunctions,
        ],
    ),
    (
        Dialect::MySql,
        &[
            Capability::Schemas,
            Capability::ColumnDrop,
            Capability::ColumnRename,
            Capability::AddConstraints,
            Capability::DisableForeignKeys,
            Capability::ForeignKeyCatalog,
            Capability::IsolationLevels,
            Capability::Autocommit,
            Capability::Truncate,
        ],
    ),
    (
        Dialect::Sqlite,
        &[
            Capability::DisableForeignKeys,
            Capability::ForeignKeyCatalog,
        ],
    ),
    (
        Dialect::Mssql,
        &[
            Capability::Schemas,
            Capability::ColumnDrop,
            Capability::ColumnRename,
            Capability::AddConstraints,
            Capability::CheckConstraints,
            Capability::DefaultConstraints,
            Capability::ForeignKeyCatalog,
            Capability::IsolationLevels,
            Capability::Autocommit,
            Capability::Truncate,
        ],
    ),
];

impl Dialect {
    #[must_use]
    pub fn supports(self, capability: Capability) -> bool {
        CAPABILITIES
            .iter()
            .find(|(dialect, _)| *dialect == self)
            .is_some_and(|(_, capabilities)| capabilities.contains(&capability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_cannot_drop_columns() {
        assert!(!Dialect::Sqlite.supports(Capability::ColumnDrop));
        assert!(!Dialect::Sqlite.supports(Capability::ColumnRename));
        assert!(Dialect::Sqlite.supports(Capability::DisableForeignKeys));
    }

    #[test]
    fn only_postgres_has_named_enum_types() {
        assert!(Dialect::Postgres.supports(Capability::NamedEnumTypes));
        assert!(!Dialect::MySql.supports(Capability::NamedEnumTypes));
        assert!(!Dialect::Sqlite.supports(Capability::NamedEnumTypes));
        assert!(!Dialect::Mssql.supports(Capability::NamedEnumTypes));
    }

    #[test]
    fn mssql_column_drop_requires_constraint_cleanup() {
        assert!(Dialect::Mssql.supports(Capability::ColumnDrop));
        assert!(!Dialect::Mssql.supports(Capability::ConstrainedColumnDrop));
    }

    #[test]
    fn every_dialect_has_an_entry() {
        for dialect in [
            Dialect::Postgres,
            Dialect::MySql,
            Dialect::Sqlite,
            Dialect::Mssql,
        ] {
            assert!(CAPABILITIES.iter().any(|(d, _)| *d == dialect));
        }
    }
}
