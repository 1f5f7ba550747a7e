// ABOUTME: Binds SqlValue parameters into PostgreSQL statements
// ABOUTME: Narrows integers, floats and timestamps to the column's declared wire type

use crate::convert::{format_timestamp, SqlValue};
use base64::Engine;
use bytes::BytesMut;
use std::error::Error;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};

type BoxError = Box<dyn Error + Sync + Send>;

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if let Some(text) = self.as_text_for(ty) {
            return text.to_sql_checked(ty, out);
        }

        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) => b.to_sql_checked(ty, out),
            SqlValue::Int(i) => int_to_sql(*i, ty, out),
            SqlValue::UInt(u) => int_to_sql(i64::try_from(*u)?, ty, out),
            SqlValue::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql_checked(ty, out),
                _ => f.to_sql_checked(ty, out),
            },
            SqlValue::Text(s) => s.to_sql_checked(ty, out),
            SqlValue::Bytes(b) => b.to_sql_checked(ty, out),
            SqlValue::Json(v) => v.to_sql_checked(ty, out),
            SqlValue::Timestamp(ts) => match *ty {
                Type::TIMESTAMP => ts.naive_utc().to_sql_checked(ty, out),
                Type::DATE => ts.date_naive().to_sql_checked(ty, out),
                _ => ts.to_sql_checked(ty, out),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl SqlValue {
    /// Text rendering of a non-text value bound into a text-typed parameter
    fn as_text_for(&self, ty: &Type) -> Option<String> {
        if !<String as ToSql>::accepts(ty) {
            return None;
        }
        match self {
            SqlValue::Null | SqlValue::Text(_) => None,
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::UInt(u) => Some(u.to_string()),
            SqlValue::Float(f) => Some(f.to_string()),
            SqlValue::Bytes(b) => Some(base64::engine::general_purpose::STANDARD.encode(b)),
            SqlValue::Json(serde_json::Value::String(s)) => Some(s.clone()),
            SqlValue::Json(v) => Some(v.to_string()),
            SqlValue::Timestamp(ts) => Some(format_timestamp(ts)),
        }
    }
}

fn int_to_sql(value: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(value)?.to_sql_checked(ty, out),
        Type::INT4 => i32::try_from(value)?.to_sql_checked(ty, out),
        Type::OID => u32::try_from(value)?.to_sql_checked(ty, out),
        Type::FLOAT4 => (value as f32).to_sql_checked(ty, out),
        Type::FLOAT8 => (value as f64).to_sql_checked(ty, out),
        _ => value.to_sql_checked(ty, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn encode(value: SqlValue, ty: &Type) -> Result<Vec<u8>, BoxError> {
        let mut buf = BytesMut::new();
        value.to_sql_checked(ty, &mut buf)?;
        Ok(buf.to_vec())
    }

    #[test]
    fn test_integers_narrow_to_column_width() {
        assert_eq!(encode(SqlValue::Int(7), &Type::INT2).unwrap(), vec![0, 7]);
        assert_eq!(encode(SqlValue::Int(7), &Type::INT4).unwrap().len(), 4);
        assert_eq!(encode(SqlValue::UInt(7), &Type::INT8).unwrap().len(), 8);
        assert!(encode(SqlValue::Int(70_000), &Type::INT2).is_err());
        assert!(encode(SqlValue::UInt(u64::MAX), &Type::INT8).is_err());
    }

    #[test]
    fn test_floats_follow_column_precision() {
        assert_eq!(encode(SqlValue::Float(1.5), &Type::FLOAT4).unwrap().len(), 4);
        assert_eq!(encode(SqlValue::Float(1.5), &Type::FLOAT8).unwrap().len(), 8);
    }

    #[test]
    fn test_text_parameters_accept_any_scalar() {
        assert_eq!(encode(SqlValue::Bool(true), &Type::TEXT).unwrap(), b"true");
        assert_eq!(encode(SqlValue::Int(42), &Type::VARCHAR).unwrap(), b"42");
        assert_eq!(
            encode(SqlValue::Json(serde_json::json!("abc")), &Type::TEXT).unwrap(),
            b"abc"
        );
        assert_eq!(
            encode(SqlValue::Text("plain".into()), &Type::TEXT).unwrap(),
            b"plain"
        );
    }

    #[test]
    fn test_mismatched_types_are_rejected() {
        assert!(encode(SqlValue::Bool(true), &Type::INT4).is_err());
        assert!(encode(SqlValue::Bytes(vec![1]), &Type::INT4).is_err());
        assert!(encode(SqlValue::Text("x".into()), &Type::BOOL).is_err());
    }

    #[test]
    fn test_null_binds_as_sql_null() {
        let mut buf = BytesMut::new();
        let is_null = SqlValue::Null.to_sql_checked(&Type::INT4, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
    }

    #[test]
    fn test_timestamps_match_zone_handling() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(encode(SqlValue::Timestamp(ts), &Type::TIMESTAMPTZ).unwrap().len(), 8);
        assert_eq!(encode(SqlValue::Timestamp(ts), &Type::TIMESTAMP).unwrap().len(), 8);
        assert_eq!(encode(SqlValue::Timestamp(ts), &Type::DATE).unwrap().len(), 4);
    }
}
