// ABOUTME: PostgreSQL table reads for export
// ABOUTME: Row counts and ordered pages, with each cell decoded by its wire type

use crate::catalog::TableSchema;
use crate::convert::SqlValue;
use crate::dialect::{page_params, Dialect};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{Client, Row};

/// Get the row count for a catalog table
pub async fn get_table_row_count(client: &Client, table: &TableSchema) -> Result<u64> {
    let query = Dialect::Postgres.count_sql(table);

    let row = client
        .query_one(&query, &[])
        .await
        .with_context(|| format!("Failed to count rows in table '{}'", table.name))?;
    let count: i64 = row.get(0);

    Ok(count as u64)
}

/// Read one page of a table, ordered by primary key (or every column)
pub async fn read_table_page(
    client: &Client,
    table: &TableSchema,
    limit: usize,
    offset: u64,
) -> Result<Vec<Vec<SqlValue>>> {
    let query = Dialect::Postgres.select_page_sql(table);
    let (limit, offset) = page_params(limit, offset)?;

    let rows = client
        .query(&query, &[&limit, &offset])
        .await
        .with_context(|| format!("Failed to query rows from table '{}'", table.name))?;

    tracing::debug!(
        "Read {} rows from table '{}' at offset {}",
        rows.len(),
        table.name,
        offset
    );

    rows.iter()
        .map(|row| {
            row_values(row)
                .with_context(|| format!("Failed to read row from table '{}'", table.name))
        })
        .collect()
}

/// Convert every cell of a row into the shared value model
pub fn row_values(row: &Row) -> Result<Vec<SqlValue>> {
    (0..row.len()).map(|idx| cell(row, idx)).collect()
}

fn cell(row: &Row, idx: usize) -> Result<SqlValue> {
    let column = &row.columns()[idx];
    let value = match *column.type_() {
        Type::BOOL => get(row, idx, SqlValue::Bool),
        Type::INT2 => get(row, idx, |v: i16| SqlValue::Int(v.into())),
        Type::INT4 => get(row, idx, |v: i32| SqlValue::Int(v.into())),
        Type::INT8 => get(row, idx, SqlValue::Int),
        Type::OID => get(row, idx, |v: u32| SqlValue::UInt(v.into())),
        Type::FLOAT4 => get(row, idx, |v: f32| SqlValue::Float(v.into())),
        Type::FLOAT8 => get(row, idx, SqlValue::Float),
        Type::BYTEA => get(row, idx, SqlValue::Bytes),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>, _>(row, idx, SqlValue::Timestamp),
        Type::TIMESTAMP => get(row, idx, |v: NaiveDateTime| SqlValue::Timestamp(v.and_utc())),
        Type::DATE => get(row, idx, |v: NaiveDate| {
            SqlValue::Timestamp(v.and_time(chrono::NaiveTime::MIN).and_utc())
        }),
        Type::JSON | Type::JSONB => get(row, idx, SqlValue::Json),
        _ => get(row, idx, SqlValue::Text),
    };

    value.with_context(|| {
        format!(
            "Failed to decode column '{}' of type {}",
            column.name(),
            column.type_()
        )
    })
}

fn get<'a, T, F>(row: &'a Row, idx: usize, wrap: F) -> Result<SqlValue, tokio_postgres::Error>
where
    T: FromSql<'a>,
    F: FnOnce(T) -> SqlValue,
{
    Ok(row
        .try_get::<_, Option<T>>(idx)?
        .map(wrap)
        .unwrap_or(SqlValue::Null))
}
