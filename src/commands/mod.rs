// ABOUTME: Command implementations behind the schema-backup CLI
// ABOUTME: Exports export, import, inspect and schema_hash commands plus shared argument merging

pub mod export;
pub mod import;
pub mod inspect;
pub mod schema_hash;

pub use export::export;
pub use import::import;
pub use inspect::inspect;
pub use schema_hash::schema_hash;

use crate::backup::DEFAULT_BATCH_SIZE;
use crate::catalog::Catalog;
use crate::config::{ConfigFile, ServiceConfig};
use crate::error::BackupError;
use crate::filters::TableFilter;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::time::Duration;

/// Flags shared by `export` and `import`; anything unset falls back to the config file
#[derive(Debug, Clone, Default)]
pub struct CommonArgs {
    pub config: Option<String>,
    pub catalog: Option<String>,
    pub database: Option<String>,
    pub dialect: Option<String>,
    pub tables: Vec<String>,
    pub timeout_secs: Option<u64>,
}

/// Fully resolved settings for one export or import run
#[derive(Debug)]
pub struct Settings {
    pub catalog: Catalog,
    pub service: ServiceConfig,
    pub tables: TableFilter,
    pub batch_size: usize,
    pub timeout: Option<Duration>,
}

impl CommonArgs {
    /// Merge flags over the config file, load the catalog and validate the table list
    ///
    /// Everything here happens before a database connection is attempted, so an unknown
    /// table or dialect never reaches the server.
    pub fn resolve(self, batch_size: Option<usize>) -> Result<Settings> {
        let file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };

        let service = ServiceConfig::resolve(
            self.database.as_deref().or(file.database.url.as_deref()),
            self.dialect.as_deref().or(file.database.dialect.as_deref()),
        )?;

        let catalog_path = self
            .catalog
            .or_else(|| file.backup.catalog.clone())
            .ok_or_else(|| {
                BackupError::InvalidCatalog(
                    "no catalog file given (use --catalog or [backup] catalog)".to_string(),
                )
            })?;
        let catalog = Catalog::load(&catalog_path)?;

        let tables = if self.tables.is_empty() {
            TableFilter::new(&file.backup.tables)
        } else {
            TableFilter::new(&self.tables)
        };
        tables
            .resolve(&catalog)
            .context("Failed to resolve the requested tables")?;

        Ok(Settings {
            catalog,
            service,
            tables,
            batch_size: batch_size
                .or(file.backup.batch_size)
                .unwrap_or(DEFAULT_BATCH_SIZE),
            timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .or_else(|| file.backup.timeout()),
        })
    }
}

/// Open a stream source; `-` reads standard input
pub fn open_input(path: &str) -> Result<Box<dyn BufRead>> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(io::stdin())));
    }
    let file = File::open(path)
        .with_context(|| format!("Failed to open backup file {}", path))
        .context(BackupError::Stream("open"))?;
    Ok(Box::new(BufReader::new(file)))
}
