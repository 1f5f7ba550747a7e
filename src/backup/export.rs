// ABOUTME: Streams catalog tables out of a database as NDJSON backup records
// ABOUTME: Counts rows, writes the meta record, then pages through each table in key order

use super::progress::ExportProgress;
use super::record::{self, MetaRecord};
use super::{ExportOptions, ExportSummary};
use crate::catalog::Catalog;
use crate::convert::encode_row;
use crate::db::{Database, Deadline};
use crate::dialect::page_params;
use crate::error::BackupError;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use tracing::{debug, info};

/// Export the selected tables into `sink`
///
/// The table list is resolved before any database access. On error the partially written
/// stream is incomplete and must be discarded by the caller.
pub async fn export_tables<W: Write>(
    db: &Database,
    catalog: &Catalog,
    schema_hash: &str,
    sink: W,
    options: &ExportOptions,
    progress: &mut dyn ExportProgress,
) -> Result<ExportSummary> {
    let tables = options.tables.resolve(catalog)?;
    let batch_size = options.effective_batch_size();
    page_params(batch_size, 0)?;
    let deadline = Deadline::after(options.timeout);

    info!(
        "Exporting {} table(s) from {} database (batch size {})",
        tables.len(),
        db.dialect(),
        batch_size
    );

    let mut row_counts = BTreeMap::new();
    for table in &tables {
        let step = format!("counting rows in '{}'", table.name);
        let count = deadline
            .run(&step, async {
                db.count_rows(table).await.with_context(|| BackupError::Extraction {
                    table: table.name.clone(),
                })
            })
            .await?;
        debug!("Table '{}' has {} rows", table.name, count);
        row_counts.insert(table.name.clone(), count);
    }

    let meta = MetaRecord::new(schema_hash, row_counts);
    let mut out = BufWriter::new(sink);
    record::write_meta(&mut out, &meta)?;

    let mut rows = BTreeMap::new();
    for table in &tables {
        let total = meta.row_counts.get(&table.name).copied().unwrap_or(0);
        info!("Exporting table '{}' ({} rows)", table.name, total);
        progress.start_table(&table.name, total);

        let step = format!("reading rows from '{}'", table.name);
        let mut exported: u64 = 0;
        loop {
            let page = deadline
                .run(&step, async {
                    db.fetch_page(table, batch_size, exported)
                        .await
                        .with_context(|| BackupError::Extraction {
                            table: table.name.clone(),
                        })
                })
                .await?;
            let page_len = page.len();

            for values in page {
                let payload = encode_row(table, values).with_context(|| BackupError::Extraction {
                    table: table.name.clone(),
                })?;
                record::write_row(&mut out, &table.name, &payload)?;
            }

            debug!(
                "Wrote {} rows from '{}' at offset {}",
                page_len, table.name, exported
            );
            exported += page_len as u64;
            if page_len > 0 {
                progress.increment(&table.name, page_len as u64);
            }
            if page_len < batch_size {
                break;
            }
        }

        progress.finish_table(&table.name, exported);
        info!("Exported {} rows from '{}'", exported, table.name);
        rows.insert(table.name.clone(), exported);
    }

    out.flush().context(BackupError::Stream("flush"))?;

    let summary = ExportSummary {
        tables: meta.tables,
        rows,
        schema_hash: meta.schema_hash,
    };
    info!(
        "Export complete: {} rows across {} table(s)",
        summary.total_rows(),
        summary.tables.len()
    );

    Ok(summary)
}
