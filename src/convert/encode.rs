// ABOUTME: Native to JSON-safe conversion keyed by column kind
// ABOUTME: Normalizes backend-specific representations (SQLite text timestamps, 0/1 booleans) on export

use super::{format_timestamp, parse_timestamp_lenient, ConvertError, SqlValue};
use crate::catalog::{ColumnKind, TableSchema};
use crate::error::BackupError;
use base64::Engine;
use chrono::{TimeZone, Utc};
use serde_json::{Map, Value as JsonValue};

/// Convert one native value to its JSON-safe form
///
/// Rules by kind:
/// - bool, integers, floats → JSON booleans / numbers (non-finite floats as `"NaN"`,
///   `"inf"`, `"-inf"`)
/// - timestamp → RFC3339 UTC string with nanoseconds
/// - bytes → standard base64 string
/// - json → the JSON value itself
/// - text → string
/// - opaque → passed through in its natural JSON shape; binary values are rejected since
///   they could not be told apart from text on import
///
/// NULL is always JSON null.
pub fn encode_value(kind: &ColumnKind, value: SqlValue) -> Result<JsonValue, ConvertError> {
    if value.is_null() {
        return Ok(JsonValue::Null);
    }

    match kind {
        ColumnKind::Bool => match value {
            SqlValue::Bool(b) => Ok(JsonValue::Bool(b)),
            SqlValue::Int(i) => Ok(JsonValue::Bool(i != 0)),
            SqlValue::UInt(u) => Ok(JsonValue::Bool(u != 0)),
            other => Err(mismatch(kind, &other)),
        },

        ColumnKind::Int { .. } | ColumnKind::Uint { .. } => match value {
            SqlValue::Int(i) => Ok(JsonValue::from(i)),
            SqlValue::UInt(u) => Ok(JsonValue::from(u)),
            SqlValue::Bool(b) => Ok(JsonValue::from(b as i64)),
            SqlValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                // SQLite hands back REAL for integral values written through a float
                // binding; keep them integers in the stream.
                if f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    Ok(JsonValue::from(f as i64))
                } else {
                    Err(ConvertError::Overflow {
                        value: f.to_string(),
                        kind: kind.to_string(),
                    })
                }
            }
            other => Err(mismatch(kind, &other)),
        },

        ColumnKind::Float { .. } => match value {
            SqlValue::Float(f) => Ok(float_to_json(f)),
            SqlValue::Int(i) => Ok(float_to_json(i as f64)),
            SqlValue::UInt(u) => Ok(float_to_json(u as f64)),
            other => Err(mismatch(kind, &other)),
        },

        ColumnKind::Timestamp => match value {
            SqlValue::Timestamp(ts) => Ok(JsonValue::String(format_timestamp(&ts))),
            SqlValue::Text(raw) => parse_timestamp_lenient(&raw)
                .map(|ts| JsonValue::String(format_timestamp(&ts)))
                .ok_or(ConvertError::InvalidTimestamp(raw)),
            SqlValue::Int(secs) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .map(|ts| JsonValue::String(format_timestamp(&ts)))
                .ok_or_else(|| ConvertError::InvalidTimestamp(secs.to_string())),
            other => Err(mismatch(kind, &other)),
        },

        ColumnKind::Bytes => match value {
            SqlValue::Bytes(b) => Ok(JsonValue::String(encode_base64(&b))),
            SqlValue::Text(s) => Ok(JsonValue::String(encode_base64(s.as_bytes()))),
            other => Err(mismatch(kind, &other)),
        },

        ColumnKind::Json => match value {
            SqlValue::Json(v) => Ok(v),
            SqlValue::Text(raw) => {
                serde_json::from_str(&raw).map_err(|e| ConvertError::InvalidJson(e.to_string()))
            }
            SqlValue::Bytes(raw) => {
                serde_json::from_slice(&raw).map_err(|e| ConvertError::InvalidJson(e.to_string()))
            }
            other => Err(mismatch(kind, &other)),
        },

        ColumnKind::Text => match value {
            SqlValue::Text(s) => Ok(JsonValue::String(s)),
            // SQLite columns are loosely typed; numbers stored in a text column keep their
            // textual form.
            SqlValue::Int(i) => Ok(JsonValue::String(i.to_string())),
            SqlValue::UInt(u) => Ok(JsonValue::String(u.to_string())),
            SqlValue::Float(f) => Ok(JsonValue::String(f.to_string())),
            other => Err(mismatch(kind, &other)),
        },

        ColumnKind::Opaque(_) => passthrough(kind, value),
    }
}

/// Encode a row whose values are in the table's declared column order
pub fn encode_row(
    table: &TableSchema,
    values: Vec<SqlValue>,
) -> Result<Map<String, JsonValue>, BackupError> {
    let mut payload = Map::with_capacity(table.columns.len());

    for (column, value) in table.columns.iter().zip(values) {
        let json = encode_value(&column.kind, value)
            .map_err(|e| BackupError::field(&table.name, &column.name, e))?;
        payload.insert(column.name.clone(), json);
    }

    Ok(payload)
}

fn passthrough(kind: &ColumnKind, value: SqlValue) -> Result<JsonValue, ConvertError> {
    Ok(match value {
        SqlValue::Null => JsonValue::Null,
        SqlValue::Bool(b) => JsonValue::Bool(b),
        SqlValue::Int(i) => JsonValue::from(i),
        SqlValue::UInt(u) => JsonValue::from(u),
        SqlValue::Float(f) => float_to_json(f),
        SqlValue::Text(s) => JsonValue::String(s),
        SqlValue::Json(v) => v,
        SqlValue::Timestamp(ts) => JsonValue::String(format_timestamp(&ts)),
        // Declare such columns as `bytes`
        other @ SqlValue::Bytes(_) => return Err(mismatch(kind, &other)),
    })
}

fn float_to_json(f: f64) -> JsonValue {
    // JSON has no NaN/Infinity literals
    serde_json::Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(f.to_string()))
}

fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn mismatch(kind: &ColumnKind, value: &SqlValue) -> ConvertError {
    ConvertError::TypeMismatch {
        expected: kind.to_string(),
        found: value.type_name(),
    }
}
