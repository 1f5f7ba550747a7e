// ABOUTME: Conversion between rusqlite values and the shared SqlValue model
// ABOUTME: Reads SQLite storage classes and binds SqlValue parameters into statements

use crate::convert::{format_timestamp, SqlValue};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::ToSql;

/// Map a SQLite storage-class value to the shared model
///
/// SQLite has only five storage classes, so booleans, timestamps and JSON come back as
/// integers or text; the kind-driven encoder interprets them.
pub fn sqlite_value_to_native(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Int(i),
        Value::Real(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Bytes(b),
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self {
            SqlValue::Null => ToSqlOutput::Owned(Value::Null),
            SqlValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            SqlValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            SqlValue::UInt(u) => {
                // SQLite integers are signed 64-bit
                let i = i64::try_from(*u)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                ToSqlOutput::Owned(Value::Integer(i))
            }
            SqlValue::Float(f) => ToSqlOutput::Owned(Value::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            SqlValue::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            SqlValue::Json(v) => ToSqlOutput::Owned(Value::Text(v.to_string())),
            SqlValue::Timestamp(ts) => ToSqlOutput::Owned(Value::Text(format_timestamp(ts))),
        };
        Ok(output)
    }
}
