// ABOUTME: Offline inspection of a backup stream without touching a database
// ABOUTME: Tallies row records per table and compares them against the meta record

use super::record::{self, MetaRecord, Record};
use crate::catalog::Catalog;
use crate::error::BackupError;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::io::BufRead;

/// What a backup stream contains
#[derive(Debug, Clone, Default)]
pub struct StreamReport {
    /// First meta record in the stream
    pub meta: Option<MetaRecord>,
    pub meta_records: usize,
    /// Row records per table tag, as written in the stream
    pub rows: BTreeMap<String, u64>,
}

/// A table whose row-record tally differs from the meta record's count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMismatch {
    pub table: String,
    pub declared: u64,
    pub found: u64,
}

impl StreamReport {
    pub fn total_rows(&self) -> u64 {
        self.rows.values().sum()
    }

    /// Tables where the meta record's `row_counts` and the stream disagree
    ///
    /// Tables missing from either side count as zero there.
    pub fn count_mismatches(&self) -> Vec<CountMismatch> {
        let Some(meta) = &self.meta else {
            return Vec::new();
        };

        let names: BTreeSet<&String> = meta.row_counts.keys().chain(self.rows.keys()).collect();
        names
            .into_iter()
            .filter_map(|name| {
                let declared = meta.row_counts.get(name).copied().unwrap_or(0);
                let found = self.rows.get(name).copied().unwrap_or(0);
                (declared != found).then(|| CountMismatch {
                    table: name.clone(),
                    declared,
                    found,
                })
            })
            .collect()
    }

    /// Whether the stream was exported from a catalog with the same structure
    ///
    /// `None` when the stream has no meta record. Imports do not enforce this.
    pub fn schema_hash_matches(&self, catalog: &Catalog) -> Option<bool> {
        self.meta
            .as_ref()
            .map(|meta| meta.schema_hash == catalog.schema_hash())
    }
}

/// Read a whole stream and summarize it
///
/// Fails on the first malformed line. Unknown table tags and unsupported versions are
/// reported rather than rejected.
pub fn inspect_stream<R: BufRead>(source: R) -> Result<StreamReport> {
    let mut report = StreamReport::default();

    for (idx, line) in source.lines().enumerate() {
        let line = line.context(BackupError::Stream("read"))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match record::parse_record(line)
            .with_context(|| BackupError::MalformedRecord { line: idx + 1 })?
        {
            Record::Meta(meta) => {
                report.meta_records += 1;
                report.meta.get_or_insert(meta);
            }
            Record::Row { table, .. } => {
                *report.rows.entry(table).or_insert(0) += 1;
            }
        }
    }

    Ok(report)
}
