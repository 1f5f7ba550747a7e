// ABOUTME: Inspect command: summarizes a backup stream without a database
// ABOUTME: Prints the meta record, row tallies and any count or schema-hash mismatch

use super::open_input;
use crate::backup::{inspect_stream, BACKUP_FORMAT_VERSION};
use crate::catalog::Catalog;
use anyhow::Result;

/// Print a report for the stream at `input` (`-` for stdin)
///
/// With a catalog, the stream's schema hash is compared against it. The comparison is
/// informational; imports do not enforce it.
pub fn inspect(input: &str, catalog: Option<&str>) -> Result<()> {
    let catalog = catalog.map(Catalog::load).transpose()?;
    let report = inspect_stream(open_input(input)?)?;

    match &report.meta {
        Some(meta) => {
            println!("Format version: {}", meta.version);
            if meta.version != BACKUP_FORMAT_VERSION {
                println!(
                    "  WARNING: this build only imports version {}",
                    BACKUP_FORMAT_VERSION
                );
            }
            println!("Exported at:    {}", meta.exported_at.to_rfc3339());
            println!("Schema hash:    {}", meta.schema_hash);
            println!("Tables:         {}", meta.tables.join(", "));
        }
        None => println!("No meta record found: this stream cannot be imported"),
    }
    if report.meta_records > 1 {
        println!("Meta records:   {}", report.meta_records);
    }

    println!("Row records:    {}", report.total_rows());
    for (table, rows) in &report.rows {
        println!("  {:<24} {}", table, rows);
    }

    for mismatch in report.count_mismatches() {
        println!(
            "Count mismatch for '{}': meta declares {}, stream holds {}",
            mismatch.table, mismatch.declared, mismatch.found
        );
    }

    if let Some(catalog) = &catalog {
        match report.schema_hash_matches(catalog) {
            Some(true) => println!("Schema hash matches catalog"),
            Some(false) => println!(
                "Schema hash differs from catalog ({})",
                catalog.schema_hash()
            ),
            None => {}
        }
    }

    Ok(())
}
