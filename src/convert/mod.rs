// ABOUTME: Native value model shared by both database backends and the backup stream
// ABOUTME: Kind-driven encode (native to JSON-safe) and decode (JSON-safe to native) live in submodules

pub mod decode;
pub mod encode;

pub use decode::{decode_row, decode_value, zero_default};
pub use encode::{encode_row, encode_value};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

/// A column value as read from, or bound into, a database statement
///
/// Both backends convert their driver-specific values into this model when reading, and
/// bind it back when writing. The conversion layer never needs to know which backend a
/// value came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Integer value for sequence tracking, saturating unsigned values at `i64::MAX`
    pub fn as_sequence_value(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::UInt(u) => Some(i64::try_from(*u).unwrap_or(i64::MAX)),
            _ => None,
        }
    }

    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "boolean",
            SqlValue::Int(_) | SqlValue::UInt(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "blob",
            SqlValue::Json(_) => "json",
            SqlValue::Timestamp(_) => "timestamp",
        }
    }
}

/// Why a single value could not be converted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("expected {expected} value, found {found}")]
    TypeMismatch {
        expected: String,
        found: &'static str,
    },

    #[error("value {0} is not an integer")]
    NotInteger(String),

    #[error("negative value {value} cannot be stored in {kind} column")]
    Negative { value: String, kind: String },

    #[error("value {value} overflows {kind} column")]
    Overflow { value: String, kind: String },

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid base64 data: {0}")]
    InvalidBase64(String),

    #[error("invalid JSON text: {0}")]
    InvalidJson(String),

    #[error("null value in non-nullable {0} column has no default")]
    NullNotAllowed(String),
}

/// Format a timestamp as RFC3339 in UTC with nanosecond precision
///
/// ```
/// # use schema_backup::convert::format_timestamp;
/// # use chrono::{TimeZone, Utc};
/// let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
/// assert_eq!(format_timestamp(&ts), "2024-03-01T12:30:00.000000000Z");
/// ```
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parse a strict RFC3339 timestamp, normalizing it to UTC
pub fn parse_rfc3339(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

/// Parse the timestamp spellings found in SQLite text columns
///
/// Accepts RFC3339 as well as SQLite's own `YYYY-MM-DD HH:MM:SS[.fff]` layout (as written
/// by `CURRENT_TIMESTAMP` and `datetime()`), which carries no zone and is read as UTC.
/// A bare `YYYY-MM-DD` date (`CURRENT_DATE`, `date()`) is midnight UTC.
pub fn parse_timestamp_lenient(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Some(ts) = parse_rfc3339(raw) {
        return Some(ts);
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}
