// ABOUTME: JSON-safe to native conversion keyed by column kind
// ABOUTME: Validates integer shape, sign and declared width before values reach the database

use super::{parse_rfc3339, ConvertError, SqlValue};
use crate::catalog::{ColumnKind, TableSchema};
use crate::error::BackupError;
use base64::Engine;
use serde_json::{Map, Value as JsonValue};

/// Convert one JSON-safe value back to a native value for the declared kind
///
/// Integers must be integer-shaped (a float with no fractional part is accepted), fit the
/// declared width, and be non-negative for unsigned kinds. Floats may arrive as the strings
/// `"NaN"`, `"inf"` and `"-inf"`. JSON null always decodes to NULL; substituting defaults
/// for non-nullable columns is [`decode_row`]'s job.
pub fn decode_value(kind: &ColumnKind, value: &JsonValue) -> Result<SqlValue, ConvertError> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    match kind {
        ColumnKind::Bool => match value {
            JsonValue::Bool(b) => Ok(SqlValue::Bool(*b)),
            other => Err(mismatch(kind, other)),
        },

        ColumnKind::Int { bits } => decode_signed(kind, *bits, value),
        ColumnKind::Uint { bits } => decode_unsigned(kind, *bits, value),

        ColumnKind::Float { bits } => {
            let f = match value {
                JsonValue::Number(n) => n.as_f64().ok_or_else(|| mismatch(kind, value))?,
                JsonValue::String(s) => match s.parse::<f64>() {
                    Ok(f) if !f.is_finite() => f,
                    _ => return Err(mismatch(kind, value)),
                },
                other => return Err(mismatch(kind, other)),
            };
            if *bits == 32 && f.is_finite() && f.abs() > f32::MAX as f64 {
                return Err(ConvertError::Overflow {
                    value: f.to_string(),
                    kind: kind.to_string(),
                });
            }
            Ok(SqlValue::Float(f))
        }

        ColumnKind::Timestamp => match value {
            JsonValue::String(s) => parse_rfc3339(s)
                .map(SqlValue::Timestamp)
                .ok_or_else(|| ConvertError::InvalidTimestamp(s.clone())),
            other => Err(mismatch(kind, other)),
        },

        ColumnKind::Bytes => match value {
            JsonValue::String(s) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .map(SqlValue::Bytes)
                .map_err(|e| ConvertError::InvalidBase64(e.to_string())),
            other => Err(mismatch(kind, other)),
        },

        ColumnKind::Json => Ok(SqlValue::Json(value.clone())),

        ColumnKind::Text => match value {
            JsonValue::String(s) => Ok(SqlValue::Text(s.clone())),
            other => Err(mismatch(kind, other)),
        },

        ColumnKind::Opaque(_) => Ok(match value {
            JsonValue::Bool(b) => SqlValue::Bool(*b),
            JsonValue::String(s) => SqlValue::Text(s.clone()),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    SqlValue::UInt(u)
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            other => SqlValue::Json(other.clone()),
        }),
    }
}

/// Zero value substituted when a non-nullable column arrives as null
///
/// Timestamps, blobs and opaque kinds have no sensible zero and return `None`.
pub fn zero_default(kind: &ColumnKind) -> Option<SqlValue> {
    match kind {
        ColumnKind::Text => Some(SqlValue::Text(String::new())),
        ColumnKind::Int { .. } => Some(SqlValue::Int(0)),
        ColumnKind::Uint { .. } => Some(SqlValue::UInt(0)),
        ColumnKind::Float { .. } => Some(SqlValue::Float(0.0)),
        ColumnKind::Bool => Some(SqlValue::Bool(false)),
        ColumnKind::Json => Some(SqlValue::Json(JsonValue::Array(Vec::new()))),
        ColumnKind::Timestamp | ColumnKind::Bytes | ColumnKind::Opaque(_) => None,
    }
}

/// Decode a row payload into values ordered like the table's columns
///
/// Payload keys that are not columns are ignored, and missing columns count as null.
pub fn decode_row(
    table: &TableSchema,
    payload: &Map<String, JsonValue>,
) -> Result<Vec<SqlValue>, BackupError> {
    let mut values = Vec::with_capacity(table.columns.len());

    for column in &table.columns {
        let raw = payload.get(&column.name).unwrap_or(&JsonValue::Null);

        let value = if raw.is_null() {
            if column.nullable {
                SqlValue::Null
            } else {
                let default = zero_default(&column.kind).ok_or_else(|| {
                    BackupError::field(
                        &table.name,
                        &column.name,
                        ConvertError::NullNotAllowed(column.kind.to_string()),
                    )
                })?;
                tracing::debug!(
                    "Null in non-nullable column {}.{}, using {:?}",
                    table.name,
                    column.name,
                    default
                );
                default
            }
        } else {
            decode_value(&column.kind, raw)
                .map_err(|e| BackupError::field(&table.name, &column.name, e))?
        };

        values.push(value);
    }

    Ok(values)
}

fn decode_signed(kind: &ColumnKind, bits: u8, value: &JsonValue) -> Result<SqlValue, ConvertError> {
    let JsonValue::Number(n) = value else {
        return Err(mismatch(kind, value));
    };

    let v = if let Some(i) = n.as_i64() {
        i
    } else if n.is_u64() {
        return Err(overflow(kind, n));
    } else {
        let f = n.as_f64().unwrap_or(f64::NAN);
        if !f.is_finite() || f.fract() != 0.0 {
            return Err(ConvertError::NotInteger(n.to_string()));
        }
        if f < i64::MIN as f64 || f >= i64::MAX as f64 {
            return Err(overflow(kind, n));
        }
        f as i64
    };

    let (min, max) = signed_bounds(bits);
    if v < min || v > max {
        return Err(overflow(kind, n));
    }
    Ok(SqlValue::Int(v))
}

fn decode_unsigned(
    kind: &ColumnKind,
    bits: u8,
    value: &JsonValue,
) -> Result<SqlValue, ConvertError> {
    let JsonValue::Number(n) = value else {
        return Err(mismatch(kind, value));
    };

    let v = if let Some(u) = n.as_u64() {
        u
    } else if n.is_i64() {
        return Err(negative(kind, n));
    } else {
        let f = n.as_f64().unwrap_or(f64::NAN);
        if !f.is_finite() || f.fract() != 0.0 {
            return Err(ConvertError::NotInteger(n.to_string()));
        }
        if f < 0.0 {
            return Err(negative(kind, n));
        }
        if f >= u64::MAX as f64 {
            return Err(overflow(kind, n));
        }
        f as u64
    };

    if v > unsigned_max(bits) {
        return Err(overflow(kind, n));
    }
    Ok(SqlValue::UInt(v))
}

fn signed_bounds(bits: u8) -> (i64, i64) {
    if bits >= 64 {
        (i64::MIN, i64::MAX)
    } else {
        let half = 1i64 << (bits - 1);
        (-half, half - 1)
    }
}

fn unsigned_max(bits: u8) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn overflow(kind: &ColumnKind, n: &serde_json::Number) -> ConvertError {
    ConvertError::Overflow {
        value: n.to_string(),
        kind: kind.to_string(),
    }
}

fn negative(kind: &ColumnKind, n: &serde_json::Number) -> ConvertError {
    ConvertError::Negative {
        value: n.to_string(),
        kind: kind.to_string(),
    }
}

fn mismatch(kind: &ColumnKind, value: &JsonValue) -> ConvertError {
    let found = match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    };
    ConvertError::TypeMismatch {
        expected: kind.to_string(),
        found,
    }
}
