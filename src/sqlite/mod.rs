// ABOUTME: SQLite backend for backup export and restore
// ABOUTME: Provides file path validation and read-only or read-write connections

pub mod converter;
pub mod reader;

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Strip an optional `sqlite://` / `sqlite:` scheme from a connection string
///
/// ```
/// # use schema_backup::sqlite::sqlite_path_from_url;
/// assert_eq!(sqlite_path_from_url("sqlite:///var/lib/app.db"), "/var/lib/app.db");
/// assert_eq!(sqlite_path_from_url("sqlite:app.db"), "app.db");
/// assert_eq!(sqlite_path_from_url("./app.db"), "./app.db");
/// ```
pub fn sqlite_path_from_url(url: &str) -> &str {
    let url = url.trim();
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

/// Validate a SQLite file path
///
/// - Canonicalizes the path, resolving symlinks and relative components (which also
///   requires the file to exist: restores never create schema)
/// - Verifies it is a regular file
/// - Checks the extension is .db, .sqlite, or .sqlite3
pub fn validate_sqlite_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        bail!("SQLite file path cannot be empty");
    }

    let canonical = PathBuf::from(path).canonicalize().with_context(|| {
        format!(
            "Failed to resolve SQLite file path '{}'. \
             File may not exist or may not be readable.",
            path
        )
    })?;

    if !canonical.is_file() {
        bail!("Path '{}' is not a regular file (may be a directory)", path);
    }

    match canonical.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ["db", "sqlite", "sqlite3"].contains(&ext) => {}
        Some(ext) => bail!(
            "Invalid SQLite file extension '{}'. \
             Must be .db, .sqlite, or .sqlite3",
            ext
        ),
        None => bail!(
            "SQLite file '{}' has no extension. \
             Must be .db, .sqlite, or .sqlite3",
            path
        ),
    }

    tracing::debug!("Validated SQLite path: {}", canonical.display());

    Ok(canonical)
}

/// Open a SQLite database file
///
/// Exports open the file read-only so a backup can never modify its source; restores
/// open it read-write. Either way the file must already exist.
pub fn open_sqlite(url: &str, read_only: bool) -> Result<rusqlite::Connection> {
    let canonical = validate_sqlite_path(sqlite_path_from_url(url))?;

    tracing::info!(
        "Opening SQLite database {} ({})",
        canonical.display(),
        if read_only { "read-only" } else { "read-write" }
    );

    let flags = if read_only {
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
    } else {
        rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
    };

    let conn = rusqlite::Connection::open_with_flags(&canonical, flags)
        .with_context(|| format!("Failed to open SQLite database: {}", canonical.display()))?;

    let _version: String = conn
        .query_row("SELECT sqlite_version()", [], |row| row.get(0))
        .context("Failed to query SQLite version (database may be corrupted)")?;

    Ok(conn)
}
