//! Value conversion between raw cells and SQL storage.

use crate::schema::SemanticType;
use crate::source::RawValue;
use chrono::{SecondsFormat, TimeZone, Utc};
use itertools::Itertools;
use rusqlite::types::{Value, ValueRef};
use serde_json::json;
use uuid::Uuid;

/// Seconds between 1601-01-01 and 1970-01-01.
pub const WINDOWS_EPOCH_OFFSET: i64 = 11_644_473_600;

/// SQLite column affinity of a semantic type.
pub fn sql_type(semantic_type: SemanticType) -> &'static str {
    match semantic_type {
        SemanticType::Int | SemanticType::UserAccountControl => "INTEGER",
        SemanticType::Text | SemanticType::Timestamp | SemanticType::GUID | SemanticType::SID => "TEXT",
        SemanticType::Binary
        | SemanticType::SecurityDescriptor
        | SemanticType::NTSecDesc
        | SemanticType::Ancestors => "BLOB",
        SemanticType::UnknownType => "",
    }
}

/// Windows-epoch seconds as UNIX seconds, `None` on overflow.
pub fn win_to_epoch(seconds: i64) -> Option<i64> {
    seconds.checked_sub(WINDOWS_EPOCH_OFFSET)
}

/// RFC 3339 rendering of a Windows-epoch timestamp, `None` when out of range.
pub fn format_timestamp(windows_seconds: i64) -> Option<String> {
    Utc.timestamp_opt(win_to_epoch(windows_seconds)?, 0)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Registry form of a 16-byte GUID (first three groups little-endian).
pub fn format_guid(bytes: &[u8]) -> Option<String> {
    let bytes: [u8; 16] = bytes.try_into().ok()?;
    Some(Uuid::from_bytes_le(bytes).to_string())
}

/// `S-1-5-21-...` rendering of a binary SID.
pub fn format_sid(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 8 {
        return None;
    }
    let revision = bytes[0];
    let count = bytes[1] as usize;
    if bytes.len() != 8 + 4 * count {
        return None;
    }
    let authority = bytes[2..8].iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    let subs = bytes[8..]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .join("-");
    if subs.is_empty() {
        Some(format!("S-{}-{}", revision, authority))
    } else {
        Some(format!("S-{}-{}-{}", revision, authority, subs))
    }
}

fn to_json(value: &RawValue) -> serde_json::Value {
    match value {
        RawValue::Null => serde_json::Value::Null,
        RawValue::Bool(b) => json!(b),
        RawValue::Int(i) => json!(i),
        RawValue::Float(f) => json!(f),
        RawValue::Text(s) => json!(s),
        RawValue::Binary(b) => json!(hex::encode(b)),
        RawValue::Multi(values) => serde_json::Value::Array(values.iter().map(to_json).collect()),
    }
}

fn plain(value: &RawValue) -> Value {
    match value {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Integer(i64::from(*b)),
        RawValue::Int(i) => Value::Integer(*i),
        RawValue::Float(f) => Value::Real(*f),
        RawValue::Text(s) => Value::Text(s.clone()),
        RawValue::Binary(b) => Value::Blob(b.clone()),
        RawValue::Multi(_) => Value::Text(to_json(value).to_string()),
    }
}

/// Storage value of a raw cell in a column of `semantic_type`.
///
/// Values that do not fit the type's rendering are stored as they came.
pub fn to_sql(value: &RawValue, semantic_type: SemanticType) -> Value {
    let rendered = match (semantic_type, value) {
        (SemanticType::Timestamp, RawValue::Int(seconds)) => format_timestamp(*seconds),
        (SemanticType::GUID, RawValue::Binary(bytes)) => format_guid(bytes),
        (SemanticType::SID, RawValue::Binary(bytes)) => format_sid(bytes),
        _ => None,
    };
    match rendered {
        Some(text) => Value::Text(text),
        None => plain(value),
    }
}

pub fn from_sql(value: ValueRef<'_>) -> RawValue {
    match value {
        ValueRef::Null => RawValue::Null,
        ValueRef::Integer(i) => RawValue::Int(i),
        ValueRef::Real(f) => RawValue::Float(f),
        ValueRef::Text(t) => RawValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => RawValue::Binary(b.to_vec()),
    }
}
