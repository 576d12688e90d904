//! Value formatting
//!
//! Raw values arrive as CSV strings (bulk exports) or loosely typed JSON
//! (REST endpoints). They are coerced into the JSON type their field schema
//! declares, and records are cut down to the selected fields.

use crate::error::{Result, SyncError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};
use tap_common::{FieldSchema, Stream};

/// One emitted record
pub type Record = Map<String, Value>;

/// Parse the timestamp shapes Marketo and Singer state use, as UTC
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical string form of a timestamp, e.g. `2024-01-01T00:00:00+00:00`
pub fn to_iso(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn is_null_equivalent(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.is_empty() || s == "null",
        _ => false,
    }
}

fn display(raw: &Value) -> String {
    match raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce one raw value to the type its schema declares
///
/// Null-equivalents (absent, `null`, `""`, `"null"`) become `Value::Null`
/// whatever the declared type. Otherwise the first match wins: date-time
/// format, then integer, string, number, boolean. Undeclared types pass the
/// value through unchanged.
pub fn format_value(field: &str, raw: Option<&Value>, schema: &FieldSchema) -> Result<Value> {
    let Some(raw) = raw.filter(|v| !is_null_equivalent(v)) else {
        return Ok(Value::Null);
    };

    if schema.is_date_time() {
        return raw
            .as_str()
            .and_then(parse_datetime)
            .map(|dt| Value::String(to_iso(&dt)))
            .ok_or_else(|| SyncError::format(field, display(raw), "date-time"));
    }

    if schema.has_type("integer") {
        let parsed = match raw {
            Value::Number(n) => n.as_i64().or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            }),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        return parsed
            .map(Value::from)
            .ok_or_else(|| SyncError::format(field, display(raw), "integer"));
    }

    if schema.has_type("string") {
        return Ok(Value::String(display(raw)));
    }

    if schema.has_type("number") {
        let parsed = match raw {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        return parsed
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| SyncError::format(field, display(raw), "number"));
    }

    if schema.has_type("boolean") {
        return match raw {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => Ok(Value::Bool(s.to_lowercase() == "true")),
            _ => Err(SyncError::format(field, display(raw), "boolean")),
        };
    }

    Ok(raw.clone())
}

/// Format every selected field of `row`, dropping the rest
pub fn format_values(stream: &Stream, row: &Map<String, Value>) -> Result<Record> {
    let mut record = Record::new();
    for (field, schema) in &stream.schema.properties {
        if !schema.is_selected() {
            continue;
        }
        record.insert(field.clone(), format_value(field, row.get(field), schema)?);
    }
    Ok(record)
}
