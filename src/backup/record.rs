// ABOUTME: NDJSON record format of the backup stream
// ABOUTME: Meta and row record types with line-level parsing and writing

use crate::catalog::RESERVED_TABLE_NAME;
use crate::error::BackupError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::io::Write;

/// The only stream format version this build reads and writes
pub const BACKUP_FORMAT_VERSION: u32 = 1;

/// Stream header describing what an export contains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRecord {
    pub version: u32,
    #[serde(with = "rfc3339_nanos")]
    pub exported_at: DateTime<Utc>,
    pub schema_hash: String,
    pub tables: Vec<String>,
    pub row_counts: BTreeMap<String, u64>,
}

impl MetaRecord {
    pub fn new(schema_hash: &str, row_counts: BTreeMap<String, u64>) -> Self {
        Self {
            version: BACKUP_FORMAT_VERSION,
            exported_at: Utc::now(),
            schema_hash: schema_hash.to_string(),
            tables: row_counts.keys().cloned().collect(),
            row_counts,
        }
    }

    /// Fail unless this build can read the declared format version
    pub fn check_version(&self) -> Result<(), BackupError> {
        if self.version != BACKUP_FORMAT_VERSION {
            return Err(BackupError::UnsupportedVersion {
                found: self.version,
                expected: BACKUP_FORMAT_VERSION,
            });
        }
        Ok(())
    }
}

/// One parsed line of a backup stream
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Meta(MetaRecord),
    Row {
        table: String,
        payload: Map<String, JsonValue>,
    },
}

#[derive(Serialize)]
struct MetaEnvelope<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    #[serde(flatten)]
    meta: &'a MetaRecord,
}

#[derive(Serialize)]
struct RowEnvelope<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    payload: &'a Map<String, JsonValue>,
}

/// Parse one non-blank stream line
pub fn parse_record(line: &str) -> Result<Record> {
    let value: JsonValue = serde_json::from_str(line).context("Line is not valid JSON")?;

    let record_type = value
        .get("type")
        .and_then(JsonValue::as_str)
        .context("Record has no string \"type\" field")?;

    if record_type.eq_ignore_ascii_case(RESERVED_TABLE_NAME) {
        let meta = MetaRecord::deserialize(&value).context("Invalid meta record")?;
        return Ok(Record::Meta(meta));
    }

    let payload = match value.get("payload") {
        Some(JsonValue::Object(payload)) => payload.clone(),
        Some(_) => anyhow::bail!("Row record payload for '{}' is not an object", record_type),
        None => anyhow::bail!("Row record for '{}' has no payload", record_type),
    };

    Ok(Record::Row {
        table: record_type.to_string(),
        payload,
    })
}

pub fn write_meta<W: Write>(out: &mut W, meta: &MetaRecord) -> Result<()> {
    let envelope = MetaEnvelope {
        record_type: RESERVED_TABLE_NAME,
        meta,
    };
    write_line(out, &envelope)
}

pub fn write_row<W: Write>(out: &mut W, table: &str, payload: &Map<String, JsonValue>) -> Result<()> {
    let envelope = RowEnvelope {
        record_type: table,
        payload,
    };
    write_line(out, &envelope)
}

fn write_line<W: Write, T: Serialize>(out: &mut W, record: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, record).context(BackupError::Stream("write"))?;
    out.write_all(b"\n").context(BackupError::Stream("write"))?;
    Ok(())
}

mod rfc3339_nanos {
    use crate::convert::{format_timestamp, parse_rfc3339};
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_rfc3339(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid RFC3339 timestamp '{}'", raw)))
    }
}
