// ABOUTME: Backup service facade tying catalog, database and record stream together
// ABOUTME: Exposes export, import and their option and summary types

pub mod export;
pub mod import;
pub mod inspect;
pub mod progress;
pub mod record;

pub use inspect::{inspect_stream, CountMismatch, StreamReport};
pub use progress::{ExportProgress, NoProgress, ProgressBarReporter};
pub use record::{MetaRecord, Record, BACKUP_FORMAT_VERSION};

use crate::catalog::Catalog;
use crate::config::ServiceConfig;
use crate::db::Database;
use crate::filters::TableFilter;
use anyhow::Result;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::time::Duration;

/// Page size used when none (or zero) is requested
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub tables: TableFilter,
    /// Rows per page; `0` selects [`DEFAULT_BATCH_SIZE`]
    pub batch_size: usize,
    pub timeout: Option<Duration>,
}

impl ExportOptions {
    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub tables: TableFilter,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub tables: Vec<String>,
    /// Rows written per table
    pub rows: BTreeMap<String, u64>,
    pub schema_hash: String,
}

impl ExportSummary {
    pub fn total_rows(&self) -> u64 {
        self.rows.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSummary {
    /// Rows written per table in the import scope
    pub rows: BTreeMap<String, u64>,
    /// Row records outside the import scope
    pub skipped: u64,
    pub meta: MetaRecord,
    pub sequences_synced: usize,
}

impl ImportSummary {
    pub fn total_rows(&self) -> u64 {
        self.rows.values().sum()
    }
}

/// Export and restore engine bound to one catalog and one database
///
/// The catalog's schema hash is computed once here. Operations take `&mut self`, so a
/// service runs one export or import at a time.
pub struct Service {
    catalog: Catalog,
    schema_hash: String,
    db: Database,
}

impl Service {
    pub fn new(catalog: Catalog, db: Database) -> Self {
        let schema_hash = catalog.schema_hash();
        Self {
            catalog,
            schema_hash,
            db,
        }
    }

    /// Connect to the configured database and build a service
    ///
    /// `read_only` opens SQLite files without write access; use it for exports.
    pub async fn connect(catalog: Catalog, config: &ServiceConfig, read_only: bool) -> Result<Self> {
        let db = Database::connect(&config.url, config.dialect, read_only).await?;
        Ok(Self::new(catalog, db))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn schema_hash(&self) -> &str {
        &self.schema_hash
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Write a backup of the selected tables to `sink`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use anyhow::Result;
    /// # use schema_backup::backup::{ExportOptions, NoProgress, Service};
    /// # async fn example(service: &mut Service) -> Result<()> {
    /// let mut buf = Vec::new();
    /// let summary = service
    ///     .export(&mut buf, &ExportOptions::default(), &mut NoProgress)
    ///     .await?;
    /// println!("exported {} rows", summary.total_rows());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn export<W: Write>(
        &mut self,
        sink: W,
        options: &ExportOptions,
        progress: &mut dyn ExportProgress,
    ) -> Result<ExportSummary> {
        export::export_tables(
            &self.db,
            &self.catalog,
            &self.schema_hash,
            sink,
            options,
            progress,
        )
        .await
    }

    /// Restore a backup stream into the selected tables, all or nothing
    pub async fn import<R: BufRead>(
        &mut self,
        source: R,
        options: &ImportOptions,
    ) -> Result<ImportSummary> {
        import::import_stream(&mut self.db, &self.catalog, source, options).await
    }
}
