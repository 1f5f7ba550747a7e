// ABOUTME: Schema-hash command: prints the structural hash of a catalog file

use crate::catalog::Catalog;
use anyhow::Result;

pub fn schema_hash(catalog: &str) -> Result<()> {
    let catalog = Catalog::load(catalog)?;
    println!("{}", catalog.schema_hash());
    Ok(())
}
