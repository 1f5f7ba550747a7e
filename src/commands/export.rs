// ABOUTME: Export command: writes a backup stream to a file or standard output
// ABOUTME: File output goes through a temp file so a failed export never leaves a partial backup

use super::CommonArgs;
use crate::backup::{ExportOptions, ExportProgress, NoProgress, ProgressBarReporter, Service};
use crate::error::BackupError;
use anyhow::{Context, Result};
use std::io;
use std::path::Path;

/// Export the selected tables
///
/// # Arguments
///
/// * `args` - Catalog, connection and table flags
/// * `batch_size` - Rows per page (config file or default when `None`)
/// * `output` - Destination path, or `-` for standard output
/// * `show_progress` - Render per-table progress bars on stderr
pub async fn export(
    args: CommonArgs,
    batch_size: Option<usize>,
    output: &str,
    show_progress: bool,
) -> Result<()> {
    let settings = args.resolve(batch_size)?;
    let mut service = Service::connect(settings.catalog, &settings.service, true).await?;

    let options = ExportOptions {
        tables: settings.tables,
        batch_size: settings.batch_size,
        timeout: settings.timeout,
    };

    let mut progress: Box<dyn ExportProgress> = if show_progress {
        Box::new(ProgressBarReporter::new())
    } else {
        Box::new(NoProgress)
    };

    let summary = if output == "-" {
        service
            .export(io::stdout().lock(), &options, progress.as_mut())
            .await?
    } else {
        let path = Path::new(output);
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file in {}", parent.display()))
            .context(BackupError::Stream("open"))?;

        let summary = service
            .export(tmp.as_file_mut(), &options, progress.as_mut())
            .await?;

        tmp.persist(path)
            .with_context(|| format!("Failed to persist backup at {}", path.display()))
            .context(BackupError::Stream("write"))?;
        summary
    };

    for (table, rows) in &summary.rows {
        tracing::info!("  {}: {} rows", table, rows);
    }
    tracing::info!(
        "Backup of {} rows written to {} (schema hash {})",
        summary.total_rows(),
        if output == "-" { "stdout" } else { output },
        summary.schema_hash
    );

    Ok(())
}
