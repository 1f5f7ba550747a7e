// ABOUTME: SQLite table reads for export
// ABOUTME: Row counts and ordered LIMIT/OFFSET pages converted to SqlValue rows

use super::converter::sqlite_value_to_native;
use crate::catalog::TableSchema;
use crate::convert::SqlValue;
use crate::dialect::{page_params, Dialect};
use anyhow::{Context, Result};
use rusqlite::Connection;

/// Get the row count for a catalog table
pub fn get_table_row_count(conn: &Connection, table: &TableSchema) -> Result<u64> {
    let query = Dialect::Sqlite.count_sql(table);

    let count: i64 = conn
        .query_row(&query, [], |row| row.get(0))
        .with_context(|| format!("Failed to count rows in table '{}'", table.name))?;

    Ok(count as u64)
}

/// Read one page of a table, ordered by primary key (or every column)
///
/// Values come back in the table's declared column order.
pub fn read_table_page(
    conn: &Connection,
    table: &TableSchema,
    limit: usize,
    offset: u64,
) -> Result<Vec<Vec<SqlValue>>> {
    let query = Dialect::Sqlite.select_page_sql(table);
    let (limit, offset) = page_params(limit, offset)?;
    let width = table.columns.len();

    let mut stmt = conn
        .prepare_cached(&query)
        .with_context(|| format!("Failed to prepare page query for table '{}'", table.name))?;

    let rows = stmt
        .query_map(rusqlite::params![limit, offset], |row| {
            (0..width)
                .map(|idx| row.get::<_, rusqlite::types::Value>(idx).map(sqlite_value_to_native))
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .with_context(|| format!("Failed to query rows from table '{}'", table.name))?
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to collect rows from table '{}'", table.name))?;

    tracing::debug!(
        "Read {} rows from table '{}' at offset {}",
        rows.len(),
        table.name,
        offset
    );

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ColumnKind, ColumnSchema};

    fn setup() -> (Connection, TableSchema) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE words (id INTEGER PRIMARY KEY, text TEXT NOT NULL, lemma TEXT);
             INSERT INTO words VALUES (3, 'cherry', NULL);
             INSERT INTO words VALUES (1, 'apple', 'apple');
             INSERT INTO words VALUES (2, 'banana', NULL);",
        )
        .unwrap();

        let table = TableSchema::new(
            "words",
            vec![
                ColumnSchema::new("id", ColumnKind::Int { bits: 64 }),
                ColumnSchema::new("text", ColumnKind::Text),
                ColumnSchema::new("lemma", ColumnKind::Text),
            ],
        )
        .with_primary_key(&["id"]);

        (conn, table)
    }

    #[test]
    fn test_get_table_row_count() {
        let (conn, table) = setup();
        assert_eq!(get_table_row_count(&conn, &table).unwrap(), 3);
    }

    #[test]
    fn test_pages_are_ordered_and_bounded() {
        let (conn, table) = setup();

        let first = read_table_page(&conn, &table, 2, 0).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0][0], SqlValue::Int(1));
        assert_eq!(first[1][0], SqlValue::Int(2));

        let second = read_table_page(&conn, &table, 2, 2).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(
            second[0],
            vec![
                SqlValue::Int(3),
                SqlValue::Text("cherry".into()),
                SqlValue::Null
            ]
        );
    }

    #[test]
    fn test_missing_table_fails() {
        let conn = Connection::open_in_memory().unwrap();
        let table = TableSchema::new("ghost", vec![ColumnSchema::new("id", ColumnKind::Text)]);
        assert!(get_table_row_count(&conn, &table).is_err());
        assert!(read_table_page(&conn, &table, 10, 0).is_err());
    }
}
