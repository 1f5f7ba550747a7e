// ABOUTME: Restores an NDJSON backup stream into a database inside one transaction
// ABOUTME: Decodes row records, upserts them by conflict key, then advances identity sequences

use super::record::{self, MetaRecord, Record};
use super::{ImportOptions, ImportSummary};
use crate::catalog::{Catalog, TableSchema};
use crate::convert::{decode_row, SqlValue};
use crate::db::{Database, DbTransaction, Deadline};
use crate::dialect::Dialect;
use crate::error::BackupError;
use crate::utils::quote_ident;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;
use tracing::{debug, info, warn};

/// A table in the import scope with its prepared statement text
struct ScopedTable<'c> {
    schema: &'c TableSchema,
    insert_sql: String,
    insert_step: String,
    /// Indexes of `auto_increment` columns within the row
    increment_columns: Vec<usize>,
}

#[derive(Default)]
struct ImportState {
    meta: Option<MetaRecord>,
    rows: BTreeMap<String, u64>,
    skipped: u64,
    /// Largest value seen per (table, auto_increment column)
    max_ids: BTreeMap<(String, String), i64>,
}

/// Import a backup stream into the tables selected by `options`
///
/// All row writes share one transaction: any malformed line, decode or insert failure, or a
/// stream without a meta record rolls back everything. Sequence synchronization runs after
/// the commit and its failure leaves the imported rows in place.
pub async fn import_stream<R: BufRead>(
    db: &mut Database,
    catalog: &Catalog,
    source: R,
    options: &ImportOptions,
) -> Result<ImportSummary> {
    let tables = options.tables.resolve(catalog)?;
    let dialect = db.dialect();
    let deadline = Deadline::after(options.timeout);

    let scope: HashMap<String, ScopedTable<'_>> = tables
        .into_iter()
        .map(|schema| {
            let insert_sql = dialect.insert_sql(schema);
            debug!("Insert statement for '{}': {}", schema.name, insert_sql);
            let scoped = ScopedTable {
                schema,
                insert_step: format!("inserting into '{}'", schema.name),
                increment_columns: schema.increment_columns().collect(),
                insert_sql,
            };
            (schema.name.to_lowercase(), scoped)
        })
        .collect();

    info!(
        "Importing into {} table(s) of {} database",
        scope.len(),
        dialect
    );

    let mut state = ImportState {
        rows: scope
            .values()
            .map(|t| (t.schema.name.clone(), 0))
            .collect(),
        ..ImportState::default()
    };

    let mut tx = deadline.run("beginning transaction", db.begin()).await?;

    if let Err(e) = consume(&mut tx, source, &scope, &deadline, &mut state).await {
        rollback(tx).await;
        return Err(e);
    }

    let Some(meta) = state.meta.take() else {
        rollback(tx).await;
        return Err(BackupError::MissingMeta.into());
    };

    deadline.run("committing", tx.commit()).await?;
    info!(
        "Committed {} rows ({} records skipped)",
        state.rows.values().sum::<u64>(),
        state.skipped
    );

    let sequences_synced = sync_sequences(db, dialect, &state.max_ids, &deadline).await?;

    Ok(ImportSummary {
        rows: state.rows,
        skipped: state.skipped,
        meta,
        sequences_synced,
    })
}

async fn consume<R: BufRead>(
    tx: &mut DbTransaction<'_>,
    source: R,
    scope: &HashMap<String, ScopedTable<'_>>,
    deadline: &Deadline,
    state: &mut ImportState,
) -> Result<()> {
    for (idx, line) in source.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.context(BackupError::Stream("read"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let record = record::parse_record(line)
            .with_context(|| BackupError::MalformedRecord { line: line_no })?;

        match record {
            Record::Meta(meta) => {
                meta.check_version()?;
                if state.meta.is_some() {
                    warn!("Ignoring additional meta record on line {}", line_no);
                } else {
                    debug!(
                        "Stream exported at {} with schema hash {}",
                        meta.exported_at, meta.schema_hash
                    );
                    state.meta = Some(meta);
                }
            }
            Record::Row { table, payload } => {
                let Some(target) = scope.get(&table.to_lowercase()) else {
                    debug!("Skipping record for '{}' on line {}", table, line_no);
                    state.skipped += 1;
                    continue;
                };

                let values = decode_row(target.schema, &payload)
                    .with_context(|| format!("Failed to decode record on line {}", line_no))?;
                track_increments(target, &values, state);

                deadline
                    .run(&target.insert_step, async {
                        tx.execute(&target.insert_sql, &values).await.with_context(|| {
                            BackupError::Insert {
                                table: target.schema.name.clone(),
                            }
                        })
                    })
                    .await
                    .with_context(|| format!("Failed to import record on line {}", line_no))?;

                *state.rows.entry(target.schema.name.clone()).or_insert(0) += 1;
            }
        }
    }

    Ok(())
}

fn track_increments(target: &ScopedTable<'_>, values: &[SqlValue], state: &mut ImportState) {
    for &idx in &target.increment_columns {
        let Some(value) = values.get(idx).and_then(SqlValue::as_sequence_value) else {
            continue;
        };
        let key = (
            target.schema.name.clone(),
            target.schema.columns[idx].name.clone(),
        );
        let max = state.max_ids.entry(key).or_insert(value);
        if value > *max {
            *max = value;
        }
    }
}

async fn rollback(tx: DbTransaction<'_>) {
    match tx.rollback().await {
        Ok(()) => info!("Import rolled back"),
        Err(e) => warn!("Failed to roll back import transaction: {:#}", e),
    }
}

/// Advance identity sequences past the largest imported values
async fn sync_sequences(
    db: &Database,
    dialect: Dialect,
    max_ids: &BTreeMap<(String, String), i64>,
    deadline: &Deadline,
) -> Result<usize> {
    if !dialect.needs_sequence_sync() {
        return Ok(0);
    }

    let mut synced = 0;
    for ((table, column), max) in max_ids {
        let Some(sql) = dialect.sequence_sync_sql(table, column) else {
            continue;
        };
        let params = [
            SqlValue::Text(quote_ident(table)),
            SqlValue::Text(column.clone()),
            SqlValue::Int(*max),
        ];

        // Rows are already committed here, so a deadline miss is a sequence-sync failure too
        let step = format!("synchronizing sequence for {}.{}", table, column);
        deadline
            .run(&step, db.execute(&sql, &params))
            .await
            .with_context(|| BackupError::SequenceSync {
                table: table.clone(),
                column: column.clone(),
            })?;

        debug!("Sequence for {}.{} advanced to at least {}", table, column, max);
        synced += 1;
    }

    Ok(synced)
}
