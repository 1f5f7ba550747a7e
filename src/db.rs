// ABOUTME: Backend-agnostic database handle used by the backup engine
// ABOUTME: Dispatches reads, transactional writes and deadline checks to SQLite or PostgreSQL

use crate::catalog::TableSchema;
use crate::convert::SqlValue;
use crate::dialect::Dialect;
use crate::error::BackupError;
use crate::{postgres, sqlite};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// An open connection to one of the supported backends
pub enum Database {
    Sqlite(rusqlite::Connection),
    Postgres(tokio_postgres::Client),
}

impl Database {
    /// Open a connection for the given dialect
    ///
    /// SQLite files are opened read-only when `read_only` is set (exports). PostgreSQL
    /// connections ignore the flag. Any failure is reported as a connection error.
    pub async fn connect(url: &str, dialect: Dialect, read_only: bool) -> Result<Self> {
        let db = match dialect {
            Dialect::Sqlite => sqlite::open_sqlite(url, read_only).map(Database::Sqlite),
            Dialect::Postgres => postgres::connect(url).await.map(Database::Postgres),
        };
        db.with_context(|| BackupError::Connection(dialect))
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Database::Sqlite(_) => Dialect::Sqlite,
            Database::Postgres(_) => Dialect::Postgres,
        }
    }

    pub async fn count_rows(&self, table: &TableSchema) -> Result<u64> {
        match self {
            Database::Sqlite(conn) => sqlite::reader::get_table_row_count(conn, table),
            Database::Postgres(client) => {
                postgres::reader::get_table_row_count(client, table).await
            }
        }
    }

    pub async fn fetch_page(
        &self,
        table: &TableSchema,
        limit: usize,
        offset: u64,
    ) -> Result<Vec<Vec<SqlValue>>> {
        match self {
            Database::Sqlite(conn) => sqlite::reader::read_table_page(conn, table, limit, offset),
            Database::Postgres(client) => {
                postgres::reader::read_table_page(client, table, limit, offset).await
            }
        }
    }

    /// Run a single statement outside any transaction, returning the affected row count
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        match self {
            Database::Sqlite(conn) => {
                let changed = conn
                    .execute(sql, rusqlite::params_from_iter(params.iter()))
                    .with_context(|| format!("Failed to execute: {}", sql))?;
                Ok(changed as u64)
            }
            Database::Postgres(client) => client
                .execute(sql, &pg_params(params))
                .await
                .with_context(|| format!("Failed to execute: {}", sql)),
        }
    }

    /// Start a transaction; it rolls back when dropped without [`DbTransaction::commit`]
    pub async fn begin(&mut self) -> Result<DbTransaction<'_>> {
        match self {
            Database::Sqlite(conn) => conn
                .transaction()
                .map(DbTransaction::Sqlite)
                .context("Failed to begin SQLite transaction"),
            Database::Postgres(client) => client
                .transaction()
                .await
                .map(|tx| DbTransaction::Postgres {
                    tx,
                    statements: HashMap::new(),
                })
                .context("Failed to begin PostgreSQL transaction"),
        }
    }

    /// Borrow the SQLite connection, if this is one
    pub fn as_sqlite(&self) -> Option<&rusqlite::Connection> {
        match self {
            Database::Sqlite(conn) => Some(conn),
            Database::Postgres(_) => None,
        }
    }
}

/// A write transaction on either backend
///
/// Statements are prepared once per transaction and reused for every row.
pub enum DbTransaction<'a> {
    Sqlite(rusqlite::Transaction<'a>),
    Postgres {
        tx: tokio_postgres::Transaction<'a>,
        statements: HashMap<String, tokio_postgres::Statement>,
    },
}

impl DbTransaction<'_> {
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        match self {
            DbTransaction::Sqlite(tx) => {
                let mut stmt = tx
                    .prepare_cached(sql)
                    .with_context(|| format!("Failed to prepare: {}", sql))?;
                let changed = stmt
                    .execute(rusqlite::params_from_iter(params.iter()))
                    .context("Failed to execute statement")?;
                Ok(changed as u64)
            }
            DbTransaction::Postgres { tx, statements } => {
                let stmt = match statements.get(sql) {
                    Some(stmt) => stmt.clone(),
                    None => {
                        let stmt = tx
                            .prepare(sql)
                            .await
                            .with_context(|| format!("Failed to prepare: {}", sql))?;
                        statements.insert(sql.to_string(), stmt.clone());
                        stmt
                    }
                };
                tx.execute(&stmt, &pg_params(params))
                    .await
                    .context("Failed to execute statement")
            }
        }
    }

    pub async fn commit(self) -> Result<()> {
        match self {
            DbTransaction::Sqlite(tx) => tx.commit().context("Failed to commit transaction"),
            DbTransaction::Postgres { tx, .. } => {
                tx.commit().await.context("Failed to commit transaction")
            }
        }
    }

    pub async fn rollback(self) -> Result<()> {
        match self {
            DbTransaction::Sqlite(tx) => tx.rollback().context("Failed to roll back transaction"),
            DbTransaction::Postgres { tx, .. } => tx
                .rollback()
                .await
                .context("Failed to roll back transaction"),
        }
    }
}

fn pg_params(params: &[SqlValue]) -> Vec<&(dyn tokio_postgres::types::ToSql + Sync)> {
    params
        .iter()
        .map(|p| p as &(dyn tokio_postgres::types::ToSql + Sync))
        .collect()
}

/// Overall time limit for an export or import
///
/// Checked before each step and enforced while a step awaits the database, so a caller
/// cancelling through a timeout sees [`BackupError::DeadlineExceeded`] naming the step.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// A deadline `timeout` from now; `None`, or one too far out to represent, never expires
    pub fn after(timeout: Option<Duration>) -> Self {
        Self {
            at: timeout.and_then(|t| Instant::now().checked_add(t)),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fail immediately if the deadline has passed
    pub fn check(&self, step: &str) -> Result<()> {
        if self.is_expired() {
            return Err(BackupError::DeadlineExceeded {
                step: step.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Run one step, failing if the deadline passes first
    pub async fn run<T, F>(&self, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check(step)?;
        match self.at {
            None => fut.await,
            Some(at) => tokio::time::timeout_at(at, fut).await.map_err(|_| {
                anyhow::Error::from(BackupError::DeadlineExceeded {
                    step: step.to_string(),
                })
            })?,
        }
    }
}
