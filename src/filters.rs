// ABOUTME: Resolves caller-supplied table lists against the catalog
// ABOUTME: Produces a sorted, de-duplicated table scope or a configuration error

use crate::catalog::{Catalog, TableSchema};
use crate::error::BackupError;
use anyhow::Result;
use std::collections::BTreeSet;

/// Requested table scope for one export or import
///
/// An empty request means "every table in the catalog". Names are trimmed, lowercased and
/// may be comma-separated, so `["Words, learned_words"]` and
/// `["words", "LEARNED_WORDS"]` select the same scope.
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    requested: Vec<String>,
}

impl TableFilter {
    pub fn new<S: AsRef<str>>(tables: &[S]) -> Self {
        Self {
            requested: tables.iter().map(|t| t.as_ref().to_string()).collect(),
        }
    }

    /// Creates an empty filter (every catalog table)
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_all(&self) -> bool {
        self.requested.is_empty()
    }

    /// Resolve the filter against a catalog, returning tables sorted by name
    ///
    /// Fails with [`BackupError::UnknownTable`] for a name the catalog does not know and
    /// [`BackupError::NoTablesSelected`] when nothing is left, e.g. all-blank input. Performs
    /// no I/O.
    pub fn resolve<'c>(&self, catalog: &'c Catalog) -> Result<Vec<&'c TableSchema>> {
        let tables: Vec<&TableSchema> = if self.is_all() {
            catalog.tables().collect()
        } else {
            let mut names = BTreeSet::new();
            for entry in &self.requested {
                for name in entry.split(',') {
                    let name = name.trim().to_lowercase();
                    if !name.is_empty() {
                        names.insert(name);
                    }
                }
            }

            let mut resolved = Vec::with_capacity(names.len());
            for name in names {
                let table = catalog
                    .get(&name)
                    .ok_or_else(|| BackupError::UnknownTable(name.clone()))?;
                resolved.push(table);
            }
            resolved
        };

        if tables.is_empty() {
            return Err(BackupError::NoTablesSelected.into());
        }

        tracing::debug!(
            "Resolved table scope: {:?}",
            tables.iter().map(|t| t.name.as_str()).collect::<Vec<_>>()
        );

        Ok(tables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnKind, ColumnSchema};
    use crate::error::{classify, kind_of, ErrorKind};

    fn catalog() -> Catalog {
        let table = |name: &str| {
            TableSchema::new(name, vec![ColumnSchema::new("id", ColumnKind::Int { bits: 64 })])
                .with_primary_key(&["id"])
        };
        Catalog::new(vec![table("words"), table("learned_words"), table("users")]).unwrap()
    }

    fn names(tables: &[&TableSchema]) -> Vec<String> {
        tables.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn empty_filter_selects_every_table_sorted() {
        let catalog = catalog();
        let tables = TableFilter::all().resolve(&catalog).unwrap();
        assert_eq!(names(&tables), vec!["learned_words", "users", "words"]);
    }

    #[test]
    fn names_are_normalized_and_deduplicated() {
        let catalog = catalog();
        let filter = TableFilter::new(&[" Words ", "words", "USERS"]);
        let tables = filter.resolve(&catalog).unwrap();
        assert_eq!(names(&tables), vec!["users", "words"]);
    }

    #[test]
    fn comma_separated_entries_are_split() {
        let catalog = catalog();
        let filter = TableFilter::new(&["words,learned_words"]);
        let tables = filter.resolve(&catalog).unwrap();
        assert_eq!(names(&tables), vec!["learned_words", "words"]);
    }

    #[test]
    fn unknown_table_is_a_configuration_error() {
        let catalog = catalog();
        let err = TableFilter::new(&["bogus"]).resolve(&catalog).unwrap_err();
        assert_eq!(kind_of(&err), Some(ErrorKind::Configuration));
        assert!(matches!(
            classify(&err),
            Some(BackupError::UnknownTable(name)) if name == "bogus"
        ));
    }

    #[test]
    fn blank_input_resolves_to_nothing() {
        let catalog = catalog();
        let err = TableFilter::new(&["  ", ","]).resolve(&catalog).unwrap_err();
        assert!(matches!(classify(&err), Some(BackupError::NoTablesSelected)));
    }

    #[test]
    fn empty_catalog_selects_nothing() {
        let catalog = Catalog::default();
        let err = TableFilter::all().resolve(&catalog).unwrap_err();
        assert!(matches!(classify(&err), Some(BackupError::NoTablesSelected)));
    }
}
