//! Conversion between property values and database representations.
//!
//! Two encodings exist for a value headed to the server:
//!
//! - [`encode_param`] produces a value to be bound to a `?` placeholder
//!   (no quoting, no escaping)
//! - [`encode_literal`] produces SQL text to be spliced inline (quoted and
//!   escaped through the connection's escape function)
//!
//! DATETIME values are always rendered as `YYYY-MM-DD HH:MM:SS` in UTC.
//! On the way back, [`from_database_row`] reparses DATETIME text after
//! dropping any trailing timezone annotation, so the offset is lost and
//! sub-second precision is truncated.

use crate::entity::{EntityDescriptor, LogicalType, PropertyDescriptor};
use crate::error::{Error, Result, TypeError};
use crate::row::Row;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Canonical DATETIME layout.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Encode a value for binding as a statement parameter.
#[allow(clippy::result_large_err)]
pub fn encode_param(prop: &PropertyDescriptor, value: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match prop.logical_type {
        LogicalType::Number => Ok(value.clone()),
        LogicalType::Boolean => Ok(Value::Int(i32::from(truthy(value)))),
        LogicalType::Date => Ok(match datetime_text(prop, value)? {
            Some(text) => Value::Text(text),
            None => Value::Null,
        }),
        LogicalType::String | LogicalType::Text => Ok(match value {
            Value::Bytes(b) => Value::Bytes(b.clone()),
            other => Value::Text(plain_text(other)),
        }),
    }
}

/// Encode a value as inline SQL text.
///
/// `escape` renders a string as a quoted literal, normally
/// [`Connection::escape`](crate::Connection::escape).
#[allow(clippy::result_large_err)]
pub fn encode_literal(
    prop: &PropertyDescriptor,
    value: &Value,
    escape: &dyn Fn(&str) -> String,
) -> Result<String> {
    if value.is_null() {
        return Ok("NULL".to_string());
    }
    match prop.logical_type {
        LogicalType::Number => Ok(match value {
            Value::Text(s) if s.trim().parse::<f64>().is_ok() => s.trim().to_string(),
            v if v.is_numeric() => plain_text(v),
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            other => escape(&plain_text(other)),
        }),
        LogicalType::Boolean => Ok(if truthy(value) { "1" } else { "0" }.to_string()),
        LogicalType::Date => Ok(match datetime_text(prop, value)? {
            Some(text) => escape(&text),
            None => "NULL".to_string(),
        }),
        LogicalType::String | LogicalType::Text => Ok(escape(&plain_text(value))),
    }
}

/// Format microseconds since the epoch as a UTC DATETIME string.
#[allow(clippy::result_large_err)]
pub fn format_datetime(micros: i64) -> Result<String> {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .map(|at| at.format(DATETIME_FORMAT).to_string())
        .ok_or_else(|| {
            Error::Type(TypeError {
                expected: "timestamp within calendar range",
                actual: format!("{} microseconds", micros),
                column: None,
            })
        })
}

/// Parse DATETIME text into microseconds since the epoch (UTC).
///
/// Any trailing timezone annotation (`Z`, `+02:00`, ` GMT+0200 (CEST)`,
/// ` UTC`) is dropped before parsing; the wall-clock time is read as UTC.
pub fn parse_datetime(text: &str) -> Option<i64> {
    let bare = strip_tz_annotation(text.trim());

    const LAYOUTS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%a %b %d %Y %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
    ];
    for layout in LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(bare, layout) {
            return Some(naive.and_utc().timestamp() * 1_000_000);
        }
    }
    NaiveDate::parse_from_str(bare, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().timestamp() * 1_000_000)
}

fn strip_tz_annotation(text: &str) -> &str {
    let mut s = text;
    for marker in [" GMT", " UTC"] {
        if let Some(pos) = s.find(marker) {
            s = &s[..pos];
        }
    }
    let s = s.trim_end();
    if let Some(stripped) = s.strip_suffix('Z') {
        return stripped;
    }
    // Numeric offsets only appear after a time component.
    for width in [6, 5, 3] {
        if s.len() <= width + 8 {
            continue;
        }
        let split = s.len() - width;
        let (Some(head), Some(tail)) = (s.get(..split), s.get(split..)) else {
            continue;
        };
        let Some(rest) = tail.strip_prefix(['+', '-']) else {
            continue;
        };
        if rest.bytes().all(|b| b.is_ascii_digit() || b == b':') && head.contains(':') {
            return head;
        }
    }
    s
}

/// Convert a raw row into typed values per the entity's declarations.
///
/// Only `Date` columns are touched: textual timestamps become
/// `Value::Timestamp` truncated to whole seconds. Columns the entity does
/// not declare pass through unchanged.
pub fn from_database_row(entity: &EntityDescriptor, mut row: Row) -> Row {
    let date_columns: Vec<(String, Value)> = row
        .iter()
        .filter(|(name, value)| {
            !value.is_null()
                && entity
                    .get_property(name)
                    .is_some_and(|p| p.logical_type == LogicalType::Date)
        })
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();

    for (name, value) in date_columns {
        let parsed = match &value {
            Value::Text(text) => parse_datetime(text),
            Value::Timestamp(micros) => Some(micros - micros.rem_euclid(1_000_000)),
            _ => None,
        };
        match parsed {
            Some(micros) => {
                row.set_by_name(&name, Value::Timestamp(micros));
            }
            None => {
                tracing::warn!(
                    table = entity.table_name(),
                    column = %name,
                    value = ?value,
                    "unparseable DATETIME value left as-is"
                );
            }
        }
    }
    row
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Text(s) => !s.is_empty(),
        Value::Bytes(b) => !b.is_empty(),
        Value::Float(f) => *f != 0.0 && !f.is_nan(),
        Value::Double(f) => *f != 0.0 && !f.is_nan(),
        Value::Decimal(s) => s.parse::<f64>().map_or(true, |f| f != 0.0),
        other => other.as_bool().unwrap_or(true),
    }
}

#[allow(clippy::result_large_err, clippy::cast_possible_truncation)]
fn datetime_text(prop: &PropertyDescriptor, value: &Value) -> Result<Option<String>> {
    let micros = match value {
        Value::Timestamp(micros) => *micros,
        // Bare numbers are milliseconds since the epoch.
        Value::Int(_) | Value::BigInt(_) | Value::SmallInt(_) | Value::TinyInt(_) => {
            value.as_i64().unwrap_or_default().saturating_mul(1000)
        }
        Value::Float(_) | Value::Double(_) => {
            (value.as_f64().unwrap_or_default() * 1000.0) as i64
        }
        Value::Text(s) if s.is_empty() => return Ok(None),
        Value::Text(s) => parse_datetime(s).ok_or_else(|| {
            Error::Type(TypeError {
                expected: "DATETIME text",
                actual: s.clone(),
                column: Some(prop.name.clone()),
            })
        })?,
        other => {
            return Err(Error::Type(TypeError {
                expected: "date value",
                actual: other.type_name().to_string(),
                column: Some(prop.name.clone()),
            }));
        }
    };
    format_datetime(micros).map(Some)
}

fn plain_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::TinyInt(v) => v.to_string(),
        Value::SmallInt(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::BigInt(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Decimal(s) | Value::Text(s) => s.clone(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Timestamp(micros) => {
            format_datetime(*micros).unwrap_or_else(|_| micros.to_string())
        }
        Value::Json(j) => j.to_string(),
        Value::Array(items) => items.iter().map(plain_text).collect::<Vec<_>>().join(","),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifiers::escape_string;

    fn prop(t: LogicalType) -> PropertyDescriptor {
        PropertyDescriptor::new("field", t)
    }

    fn lit(t: LogicalType, v: Value) -> String {
        encode_literal(&prop(t), &v, &escape_string).unwrap()
    }

    #[test]
    fn test_null_encodings() {
        for t in [LogicalType::String, LogicalType::Number, LogicalType::Date] {
            assert_eq!(lit(t, Value::Null), "NULL");
            assert_eq!(encode_param(&prop(t), &Value::Null).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_number_passthrough() {
        assert_eq!(lit(LogicalType::Number, Value::Int(10)), "10");
        assert_eq!(lit(LogicalType::Number, Value::Text(" 42 ".into())), "42");
        assert_eq!(
            encode_param(&prop(LogicalType::Number), &Value::BigInt(7)).unwrap(),
            Value::BigInt(7)
        );
    }

    #[test]
    fn test_number_non_numeric_text_is_escaped() {
        assert_eq!(lit(LogicalType::Number, Value::Text("1; DROP".into())), "'1; DROP'");
    }

    #[test]
    fn test_boolean_as_one_zero() {
        assert_eq!(lit(LogicalType::Boolean, Value::Bool(true)), "1");
        assert_eq!(lit(LogicalType::Boolean, Value::Bool(false)), "0");
        assert_eq!(
            encode_param(&prop(LogicalType::Boolean), &Value::Text(String::new())).unwrap(),
            Value::Int(0)
        );
        assert_eq!(
            encode_param(&prop(LogicalType::Boolean), &Value::Int(5)).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_date_param_and_literal() {
        // 2023-11-14 22:13:20 UTC
        let at = Value::Timestamp(1_700_000_000_123_456);
        assert_eq!(
            encode_param(&prop(LogicalType::Date), &at).unwrap(),
            Value::Text("2023-11-14 22:13:20".into())
        );
        assert_eq!(lit(LogicalType::Date, at), "'2023-11-14 22:13:20'");
    }

    #[test]
    fn test_date_from_epoch_millis_and_text() {
        assert_eq!(
            encode_param(&prop(LogicalType::Date), &Value::BigInt(0)).unwrap(),
            Value::Text("1970-01-01 00:00:00".into())
        );
        assert_eq!(
            encode_param(
                &prop(LogicalType::Date),
                &Value::Text("2024-02-29T12:30:00+05:00".into())
            )
            .unwrap(),
            Value::Text("2024-02-29 12:30:00".into())
        );
        assert!(encode_param(&prop(LogicalType::Date), &Value::Text("soon".into())).is_err());
    }

    #[test]
    fn test_string_escaped_only_inline() {
        let v = Value::Text("O'Brien".into());
        assert_eq!(lit(LogicalType::String, v.clone()), "'O''Brien'");
        assert_eq!(encode_param(&prop(LogicalType::String), &v).unwrap(), v);
        assert_eq!(
            encode_param(&prop(LogicalType::Text), &Value::Int(3)).unwrap(),
            Value::Text("3".into())
        );
    }

    #[test]
    fn test_strip_tz_annotation_variants() {
        assert_eq!(strip_tz_annotation("2024-01-02 10:00:00Z"), "2024-01-02 10:00:00");
        assert_eq!(strip_tz_annotation("2024-01-02T10:00:00+02:00"), "2024-01-02T10:00:00");
        assert_eq!(strip_tz_annotation("2024-01-02 10:00:00-0500"), "2024-01-02 10:00:00");
        assert_eq!(
            strip_tz_annotation("Tue Jan 02 2024 10:00:00 GMT+0100 (CET)"),
            "Tue Jan 02 2024 10:00:00"
        );
        assert_eq!(strip_tz_annotation("2024-01-02"), "2024-01-02");
    }

    #[test]
    fn test_non_ascii_date_text_is_not_split_mid_char() {
        assert_eq!(strip_tz_annotation("2024-01-02 10:00:00 €€"), "2024-01-02 10:00:00 €€");
        assert!(matches!(
            encode_param(&prop(LogicalType::Date), &Value::Text("xxxxxxxxx€€".into())),
            Err(Error::Type(_))
        ));

        let entity = EntityDescriptor::new("Event")
            .property(PropertyDescriptor::new("at", LogicalType::Date));
        let raw = Value::Text("2024-01-02 10:00:00 €€".into());
        let row = Row::new(vec!["at".into()], vec![raw.clone()]);
        let decoded = from_database_row(&entity, row);
        assert_eq!(decoded.get_by_name("at"), Some(&raw));
    }

    #[test]
    fn test_parse_datetime_drops_offset() {
        let utc = parse_datetime("2024-01-02 10:00:00").unwrap();
        let shifted = parse_datetime("2024-01-02 10:00:00+02:00").unwrap();
        assert_eq!(utc, shifted);
        assert_eq!(
            parse_datetime("Tue Jan 02 2024 10:00:00 GMT+0100 (CET)"),
            Some(utc)
        );
        assert_eq!(parse_datetime("2024-01-02"), parse_datetime("2024-01-02 00:00:00"));
    }

    #[test]
    fn test_date_round_trip_truncates_to_second() {
        let p = prop(LogicalType::Date);
        let entity = EntityDescriptor::new("Event").property(p.clone());
        let original = 1_700_000_000_987_654_i64;

        let encoded = encode_param(&p, &Value::Timestamp(original)).unwrap();
        let row = Row::new(vec!["field".into()], vec![encoded]);
        let decoded = from_database_row(&entity, row);

        assert_eq!(
            decoded.get_by_name("field"),
            Some(&Value::Timestamp(1_700_000_000_000_000))
        );
    }

    #[test]
    fn test_from_database_row_leaves_other_columns() {
        let entity = EntityDescriptor::new("Event")
            .property(PropertyDescriptor::new("at", LogicalType::Date))
            .property(PropertyDescriptor::new("title", LogicalType::String));
        let row = Row::new(
            vec!["at".into(), "title".into(), "extra".into()],
            vec![
                Value::Null,
                Value::Text("2024-01-02 10:00:00".into()),
                Value::Text("2024-01-02 10:00:00".into()),
            ],
        );

        let decoded = from_database_row(&entity, row);
        assert_eq!(decoded.get_by_name("at"), Some(&Value::Null));
        assert_eq!(
            decoded.get_by_name("title"),
            Some(&Value::Text("2024-01-02 10:00:00".into()))
        );
        assert_eq!(
            decoded.get_by_name("extra"),
            Some(&Value::Text("2024-01-02 10:00:00".into()))
        );
    }
}
