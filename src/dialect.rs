// ABOUTME: Per-backend SQL syntax: placeholders, upsert clauses, sequence synchronization
// ABOUTME: Builds the descriptor-driven SELECT and INSERT statements used by export and import

use crate::catalog::{ColumnKind, TableSchema};
use crate::error::BackupError;
use crate::utils::{quote_ident, quote_ident_list};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    /// Infer the dialect from a connection URL or SQLite file path
    ///
    /// ```
    /// # use schema_backup::dialect::Dialect;
    /// assert_eq!(Dialect::from_url("postgresql://u@h/db"), Some(Dialect::Postgres));
    /// assert_eq!(Dialect::from_url("sqlite:///tmp/app.db"), Some(Dialect::Sqlite));
    /// assert_eq!(Dialect::from_url("backup.sqlite3"), Some(Dialect::Sqlite));
    /// assert_eq!(Dialect::from_url("mysql://h/db"), None);
    /// ```
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        let lower = url.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Dialect::Postgres)
        } else if lower.starts_with("sqlite:") {
            Some(Dialect::Sqlite)
        } else if !lower.contains("://")
            && [".db", ".sqlite", ".sqlite3"]
                .iter()
                .any(|ext| lower.ends_with(ext))
        {
            Some(Dialect::Sqlite)
        } else {
            None
        }
    }

    /// `n` positional placeholders: `$1..$n` for PostgreSQL, `?` for SQLite
    pub fn placeholders(&self, n: usize) -> Vec<String> {
        match self {
            Dialect::Postgres => (1..=n).map(|i| format!("${}", i)).collect(),
            Dialect::Sqlite => vec!["?".to_string(); n],
        }
    }

    /// Conflict clause appended to an INSERT
    ///
    /// - no conflict key: empty (plain insert)
    /// - every insert column is part of the key: `ON CONFLICT (..) DO NOTHING`
    /// - otherwise: `ON CONFLICT (..) DO UPDATE SET col = excluded.col, ...`
    ///
    /// SQLite (3.24+) and PostgreSQL share this syntax today; the match keeps room for a
    /// dialect that does not.
    pub fn upsert_clause(&self, conflict_key: &[&str], insert_columns: &[&str]) -> String {
        if conflict_key.is_empty() {
            return String::new();
        }

        let updates: Vec<String> = insert_columns
            .iter()
            .filter(|col| !conflict_key.contains(*col))
            .map(|col| {
                let quoted = quote_ident(col);
                format!("{} = excluded.{}", quoted, quoted)
            })
            .collect();

        match self {
            Dialect::Sqlite | Dialect::Postgres => {
                if updates.is_empty() {
                    format!("ON CONFLICT ({}) DO NOTHING", quote_ident_list(conflict_key))
                } else {
                    format!(
                        "ON CONFLICT ({}) DO UPDATE SET {}",
                        quote_ident_list(conflict_key),
                        updates.join(", ")
                    )
                }
            }
        }
    }

    /// Whether explicit-id inserts leave a sequence object that must be advanced afterwards
    ///
    /// SQLite's `AUTOINCREMENT` bookkeeping (`sqlite_sequence`) already follows the largest
    /// rowid inserted, so only PostgreSQL needs the post-commit step.
    pub fn needs_sequence_sync(&self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Statement advancing a column's sequence to at least an observed maximum
    ///
    /// Parameters, in order: quoted table name (text), column name (text), observed maximum
    /// (bigint). The sequence never moves backwards past rows already in the table, and
    /// never below 1. Returns `None` for dialects without sequence objects.
    pub fn sequence_sync_sql(&self, table: &str, column: &str) -> Option<String> {
        match self {
            Dialect::Sqlite => None,
            Dialect::Postgres => Some(format!(
                "SELECT setval(pg_get_serial_sequence($1, $2), \
                 GREATEST($3::bigint, (SELECT COALESCE(MAX({col}), 0)::bigint FROM {table}), 1))",
                col = quote_ident(column),
                table = quote_ident(table),
            )),
        }
    }

    /// Row count for one table
    pub fn count_sql(&self, table: &TableSchema) -> String {
        format!("SELECT COUNT(*) FROM {}", quote_ident(&table.name))
    }

    /// Paginated, deterministically ordered scan of one table
    ///
    /// Parameters, in order: limit, offset. PostgreSQL columns of an opaque kind are read
    /// through their text representation.
    pub fn select_page_sql(&self, table: &TableSchema) -> String {
        let params = self.placeholders(2);
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|col| match (self, &col.kind) {
                (Dialect::Postgres, ColumnKind::Opaque(_)) => {
                    let quoted = quote_ident(&col.name);
                    format!("{}::text AS {}", quoted, quoted)
                }
                _ => quote_ident(&col.name),
            })
            .collect();
        format!(
            "SELECT {} FROM {} ORDER BY {} LIMIT {} OFFSET {}",
            columns.join(", "),
            quote_ident(&table.name),
            quote_ident_list(&table.order_columns()),
            params[0],
            params[1]
        )
    }

    /// INSERT for every descriptor column, with the table's conflict clause
    ///
    /// PostgreSQL opaque columns whose kind spells a plain type name are bound as text and
    /// cast server-side, e.g. `CAST($2::text AS uuid)`.
    pub fn insert_sql(&self, table: &TableSchema) -> String {
        let columns = table.column_names();
        let conflict = self.upsert_clause(&table.conflict_key().unwrap_or_default(), &columns);

        let values: Vec<String> = self
            .placeholders(columns.len())
            .into_iter()
            .zip(&table.columns)
            .map(|(param, col)| match (self, &col.kind) {
                (Dialect::Postgres, ColumnKind::Opaque(name)) if is_plain_type_name(name) => {
                    format!("CAST({}::text AS {})", param, name)
                }
                _ => param,
            })
            .collect();

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&table.name),
            quote_ident_list(&columns),
            values.join(", ")
        );
        if !conflict.is_empty() {
            sql.push(' ');
            sql.push_str(&conflict);
        }
        sql
    }
}

/// Type names safe to splice into a cast: words, digits, spaces, precision and array suffixes
fn is_plain_type_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || " _(),[]".contains(c))
}

/// `LIMIT` and `OFFSET` values for a page query
///
/// Fails when `limit` does not fit a signed 64-bit integer. Offsets past that range are
/// clamped, since no table holds that many rows.
pub fn page_params(limit: usize, offset: u64) -> Result<(i64, i64), BackupError> {
    let limit = i64::try_from(limit).map_err(|_| BackupError::InvalidBatchSize(limit))?;
    Ok((limit, i64::try_from(offset).unwrap_or(i64::MAX)))
}

impl FromStr for Dialect {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            other => Err(BackupError::UnsupportedDialect(other.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
