//! Type-driven formatting and validation of field values.
//!
//! Both operations dispatch on the declared SQL type of the column with any
//! `(length)` suffix stripped. Formatting runs first, so validation sees the
//! normalized value.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::db::{FieldSpec, TypeFamily, Value};

/// Zero value stored for an empty `datetime`.
pub const ZERO_DATETIME: &str = "0000-00-00 00:00:00";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn pad_time(s: &str) -> String {
    match s.chars().count() {
        0 => "00:00:00".to_string(),
        2 => format!("{}:00:00", s),
        5 => format!("{}:00", s),
        _ => s.to_string(),
    }
}

fn pad_datetime(s: &str) -> String {
    match s.chars().count() {
        0 => ZERO_DATETIME.to_string(),
        10 => format!("{} 00:00:00", s),
        16 => format!("{}:00", s),
        _ => s.to_string(),
    }
}

/// Normalize a raw value for the column described by `spec`.
pub fn format_field_value(spec: &FieldSpec, value: Value) -> Value {
    let family = spec.parsed_type().family();
    match family {
        TypeFamily::Flag | TypeFamily::Numeric => {
            if family == TypeFamily::Flag && value.as_text() == Some("on") {
                return Value::Int(1);
            }
            match value {
                Value::Text(s) if s.is_empty() => Value::Int(0),
                other => other,
            }
        }
        TypeFamily::Text => match value {
            Value::Text(s) => Value::Text(s.trim().to_string()),
            other => other,
        },
        TypeFamily::Time => Value::Text(pad_time(&value.to_string())),
        TypeFamily::DateTime => Value::Text(pad_datetime(&value.to_string())),
        _ => value,
    }
}

/// Whether `value` is acceptable for the column described by `spec`.
pub fn validate_field_value(spec: &FieldSpec, value: &Value) -> bool {
    if value.is_null() && !spec.nullable {
        return false;
    }

    let sql_type = spec.parsed_type();
    match sql_type.family() {
        // Booleans and blank values stand for 1/0.
        TypeFamily::Flag => matches!(value, Value::Bool(_)) || value.is_blank() || value.is_numeric(),
        TypeFamily::Numeric | TypeFamily::Timestamp => value.is_numeric(),
        TypeFamily::Text | TypeFamily::Other => true,
        TypeFamily::Char => value.char_len() <= sql_type.length.unwrap_or(1) as usize,
        TypeFamily::Year => matches!(value.as_i64(), Some(year) if (1..=32767).contains(&year)),
        TypeFamily::Date => {
            if spec.nullable && value.is_empty_key() {
                return true;
            }
            let text = value.to_string();
            text.chars().count() == 10 && NaiveDate::parse_from_str(&text, DATE_FORMAT).is_ok()
        }
        TypeFamily::Time => {
            let padded = pad_time(&value.to_string());
            NaiveTime::parse_from_str(&padded, TIME_FORMAT)
                .map(|t| t.format(TIME_FORMAT).to_string() == padded)
                .unwrap_or(false)
        }
        TypeFamily::DateTime => {
            let text = value.to_string();
            if text.is_empty() && spec.nullable {
                return true;
            }
            let padded = pad_datetime(&text);
            padded == ZERO_DATETIME
                || NaiveDateTime::parse_from_str(&padded, DATETIME_FORMAT)
                    .map(|d| d.format(DATETIME_FORMAT).to_string() == padded)
                    .unwrap_or(false)
        }
    }
}
