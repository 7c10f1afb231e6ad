//! Transaction and savepoint sequencing.
//!
//! A [`TransactionHandle`] is a finite-state value: `Active` until a commit or
//! rollback succeeds, then terminally `Committed` or `RolledBack`. A handle
//! with a parent is a savepoint sharing the root's connection; root-only
//! operations (autocommit, isolation level) are successful SQL-free no-ops on
//! savepoint handles.
//!
//! Starting a root transaction emits statements in the mandated order:
//! autocommit off, isolation level, begin, optional constraint deferral.
//! Callers must serialize all statements on a given handle; independent
//! handles may proceed fully in parallel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::dialect::{Capability, Dialect};
use crate::executor::{ExecuteOptions, Executor, QueryKind};
use crate::generator::SqlGenerator;
use crate::DatabaseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone)]
pub struct TransactionHandle {
    pub id: u64,
    /// Immediate parent; `Some` marks this handle as a savepoint.
    pub parent: Option<u64>,
    /// Root transaction id, used to address the underlying connection. Equal
    /// to `id` for a root handle.
    pub root: u64,
    pub isolation: Option<IsolationLevel>,
    pub state: TransactionState,
    pub name: Option<String>,
}

impl TransactionHandle {
    #[must_use]
    pub const fn is_savepoint(&self) -> bool {
        self.parent.is_some()
    }

    fn ensure_active(&self) -> Result<(), DatabaseError> {
        match self.state {
            TransactionState::Active => Ok(()),
            TransactionState::Committed => Err(DatabaseError::TransactionState(
                "transaction already committed".to_string(),
            )),
            TransactionState::RolledBack => Err(DatabaseError::TransactionState(
                "transaction already rolled back".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    pub defer_constraints: bool,
}

/// Savepoint names are spliced into SQL and cannot be parameterized.
///
/// # Errors
///
/// * `InvalidArgument` if the name is empty or contains anything outside
///   `[A-Za-z0-9_]` or starts with a digit.
pub fn validate_savepoint_name(name: &str) -> Result<(), DatabaseError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(DatabaseError::InvalidArgument(format!(
            "invalid savepoint name '{name}'"
        )))
    }
}

/// Sequences transaction-control statements for one dialect.
#[derive(Debug, Clone)]
pub struct TransactionController {
    dialect: Dialect,
    generator: Arc<dyn SqlGenerator>,
    executor: Arc<dyn Executor>,
    next_id: Arc<AtomicU64>,
}

impl TransactionController {
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
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    async fn run(&self, sql: Option<String>, transaction: u64) -> Result<(), DatabaseError> {
        if let Some(sql) = sql {
            log::trace!("transaction {transaction}: {sql}");
            self.executor
                .execute(
                    &sql,
                    &ExecuteOptions::new(QueryKind::Raw).transaction(transaction),
                )
                .await?;
        }
        Ok(())
    }

    /// Start a root transaction.
    ///
    /// Emission order: autocommit off, isolation level, begin, then optional
    /// constraint deferral. Optional statements the dialect does not define
    /// are skipped silently.
    ///
    /// # Errors
    ///
    /// * `Unsupported` if the dialect defines no begin statement
    /// * `DatabaseError::Database` if any emitted statement fails
    pub async fn begin(
        &self,
        options: &TransactionOptions,
    ) -> Result<TransactionHandle, DatabaseError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut autocommit_disabled = false;
        if self.dialect.supports(Capability::Autocommit) {
            if let Some(sql) = self.generator.set_autocommit(false) {
                self.run(Some(sql), id).await?;
                autocommit_disabled = true;
            }
        }

        match self.emit_begin(options, id).await {
            Ok(()) => Ok(TransactionHandle {
                id,
                parent: None,
                root: id,
                isolation: options.isolation,
                state: TransactionState::Active,
                name: None,
            }),
            Err(err) => {
                // No handle comes back on failure, so the session flag must
                // be restored here; the original error wins over a failed
                // restore.
                if autocommit_disabled {
                    if let Err(restore) =
                        self.run(self.generator.set_autocommit(true), id).await
                    {
                        log::warn!("failed to restore autocommit after begin failure: {restore}");
                    }
                }
                Err(err)
            }
        }
    }

    async fn emit_begin(
        &self,
        options: &TransactionOptions,
        id: u64,
    ) -> Result<(), DatabaseError> {
        if let Some(level) = options.isolation {
            if self.dialect.supports(Capability::IsolationLevels) {
                self.run(self.generator.set_isolation_level(level), id)
                    .await?;
            } else {
                log::debug!("{} has no isolation levels, skipping", self.dialect);
            }
        }

        let begin = self
            .generator
            .begin_transaction()
            .ok_or_else(|| DatabaseError::Unsupported {
                dialect: self.dialect,
                operation: "begin_transaction".to_string(),
            })?;
        self.run(Some(begin), id).await?;

        if options.defer_constraints && self.dialect.supports(Capability::DeferredConstraints) {
            self.run(self.generator.defer_constraints(), id).await?;
        }
        Ok(())
    }

    /// Open a savepoint nested inside `parent` (root or another savepoint).
    ///
    /// # Errors
    ///
    /// * `TransactionState` if `parent` is terminal
    /// * `InvalidArgument` if the savepoint name is not a bare identifier
    /// * `Unsupported` if the dialect defines no savepoint statement
    pub async fn begin_savepoint(
        &self,
        parent: &TransactionHandle,
        name: &str,
    ) -> Result<TransactionHandle, DatabaseError> {
        parent.ensure_active()?;
        validate_savepoint_name(name)?;

        let sql = self
            .generator
            .create_savepoint(name)
            .ok_or_else(|| DatabaseError::Unsupported {
                dialect: self.dialect,
                operation: "create_savepoint".to_string(),
            })?;
        self.run(Some(sql), parent.root).await?;

        Ok(TransactionHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            parent: Some(parent.id),
            root: parent.root,
            isolation: parent.isolation,
            state: TransactionState::Active,
            name: Some(name.to_string()),
        })
    }

    /// Root-only. Succeeds without emitting SQL on a savepoint handle.
    ///
    /// # Errors
    ///
    /// * `TransactionState` if the handle is terminal
    pub async fn set_autocommit(
        &self,
        handle: &TransactionHandle,
        enabled: bool,
    ) -> Result<(), DatabaseError> {
        handle.ensure_active()?;
        if handle.is_savepoint() {
            log::trace!("set_autocommit on savepoint is a no-op");
            return Ok(());
        }
        if self.dialect.supports(Capability::Autocommit) {
            self.run(self.generator.set_autocommit(enabled), handle.root)
                .await?;
        }
        Ok(())
    }

    /// Root-only. Succeeds without emitting SQL on a savepoint handle.
    ///
    /// # Errors
    ///
    /// * `TransactionState` if the handle is terminal
    pub async fn set_isolation_level(
        &self,
        handle: &TransactionHandle,
        level: IsolationLevel,
    ) -> Result<(), DatabaseError> {
        handle.ensure_active()?;
        if handle.is_savepoint() {
            log::trace!("set_isolation_level on savepoint is a no-op");
            return Ok(());
        }
        if self.dialect.supports(Capability::IsolationLevels) {
            self.run(self.generator.set_isolation_level(level), handle.root)
                .await?;
        }
        Ok(())
    }

    /// Commit the transaction or release the savepoint.
    ///
    /// The handle's state is updated only after the statement succeeds; on
    /// failure the handle stays `Active` so the caller can inspect it and
    /// decide recovery.
    ///
    /// # Errors
    ///
    /// * `TransactionState` if the handle is terminal
    /// * `DatabaseError::Database` if the statement fails
    pub async fn commit(&self, handle: &mut TransactionHandle) -> Result<(), DatabaseError> {
        handle.ensure_active()?;

        if handle.is_savepoint() {
            let name = handle.name.clone().ok_or_else(|| {
                DatabaseError::TransactionState("savepoint handle without a name".to_string())
            })?;
            let sql = self.generator.release_savepoint(&name).ok_or_else(|| {
                DatabaseError::Unsupported {
                    dialect: self.dialect,
                    operation: "release_savepoint".to_string(),
                }
            })?;
            self.run(Some(sql), handle.root).await?;
        } else {
            let sql = self
                .generator
                .commit()
                .ok_or_else(|| DatabaseError::Unsupported {
                    dialect: self.dialect,
                    operation: "commit".to_string(),
                })?;
            self.run(Some(sql), handle.root).await?;
        }

        handle.state = TransactionState::Committed;
        Ok(())
    }

    /// Roll back the transaction or roll back to the savepoint.
    ///
    /// Rolling back a savepoint never emits a root-level rollback. State is
    /// updated only after the statement succeeds.
    ///
    /// # Errors
    ///
    /// * `TransactionState` if the handle is terminal
    /// * `DatabaseError::Database` if the statement fails
    pub async fn rollback(&self, handle: &mut TransactionHandle) -> Result<(), DatabaseError> {
        handle.ensure_active()?;

        if handle.is_savepoint() {
            let name = handle.name.clone().ok_or_else(|| {
                DatabaseError::TransactionState("savepoint handle without a name".to_string())
            })?;
            let sql = self
                .generator
                .rollback_to_savepoint(&name)
                .ok_or_else(|| DatabaseError::Unsupported {
                    dialect: self.dialect,
                    operation: "rollback_to_savepoint".to_string(),
                })?;
            self.run(Some(sql), handle.root).await?;
        } else {
            let sql = self
                .generator
                .rollback()
                .ok_or_else(|| DatabaseError::Unsupported {
                    dialect: self.dialect,
                    operation: "rollback".to_string(),
                })?;
            self.run(Some(sql), handle.root).await?;
        }

        handle.state = TransactionState::RolledBack;
        Ok(())
    }
}
