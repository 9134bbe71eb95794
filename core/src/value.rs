use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

use crate::error::Result;

/// A fetched row, keyed by column name in select order.
pub type Row = IndexMap<String, Value>;

/// A database value as it crosses the driver boundary.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    /// A wall-clock timestamp. Bound natively where the driver has a timestamp type.
    DateTime(#[serde(serialize_with = "serialize_datetime")] PrimitiveDateTime),
}

fn serialize_datetime<S: Serializer>(dt: &PrimitiveDateTime, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    let text = format_datetime(*dt).map_err(<S::Error as serde::ser::Error>::custom)?;
    serializer.serialize_str(&text)
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, an empty (or whitespace-only) string, or an empty byte string.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            Value::Bytes(b) => b.is_empty(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Bool(b) => Some(*b as i64),
            Value::Float(f) => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Text(s) => Some(!(s.is_empty() || s == "0")),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// The value as a timestamp, parsing text in any shape [`parse_datetime`] accepts.
    pub fn as_datetime(&self) -> Option<PrimitiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            other => other.as_str().and_then(parse_datetime),
        }
    }

    /// Text form of the value, if it has one. Byte strings are decoded lossily.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", *b as i64),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Json(j) => write!(f, "{j}"),
            Value::DateTime(dt) => match format_datetime(*dt) {
                Ok(text) => f.write_str(&text),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS`, the format timestamps are written in.
pub fn format_datetime(dt: PrimitiveDateTime) -> Result<String> {
    Ok(dt.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))?)
}

pub fn format_date(date: Date) -> Result<String> {
    Ok(date.format(format_description!("[year]-[month]-[day]"))?)
}

/// The current UTC wall-clock time, truncated to whole seconds.
pub fn now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    let time = now.time().replace_nanosecond(0).unwrap_or(now.time());
    PrimitiveDateTime::new(now.date(), time)
}

/// The current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub fn now() -> Result<String> {
    format_datetime(now_utc())
}

/// Parse the common textual datetime shapes: RFC 3339, `YYYY-MM-DD HH:MM[:SS[.fff]]`
/// (with a space or `T`), or a bare date at midnight.
pub fn parse_datetime(s: &str) -> Option<PrimitiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339) {
        let utc = dt.to_offset(time::UtcOffset::UTC);
        return Some(PrimitiveDateTime::new(utc.date(), utc.time()));
    }
    let normalized = s.replacen('T', " ", 1);
    let trimmed = match normalized.find('.') {
        Some(dot) => &normalized[..dot],
        None => &normalized,
    };
    PrimitiveDateTime::parse(trimmed, format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .or_else(|_| PrimitiveDateTime::parse(trimmed, format_description!("[year]-[month]-[day] [hour]:[minute]")))
        .ok()
        .or_else(|| {
            Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
                .ok()
                .map(Date::midnight)
        })
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(v: PrimitiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<&Value> for Value {
    fn from(v: &Value) -> Self {
        v.clone()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values() {
        assert!(Value::Null.is_blank());
        assert!(Value::from("   ").is_blank());
        assert!(!Value::from("x").is_blank());
        assert!(!Value::Int(0).is_blank());
    }

    #[test]
    fn test_loose_conversions() {
        assert_eq!(Value::from(" 42 ").as_i64(), Some(42));
        assert_eq!(Value::from("0").as_bool(), Some(false));
        assert_eq!(Value::from("yes").as_bool(), Some(true));
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_parse_datetime_shapes() -> Result<()> {
        let expected = "2024-03-05 14:30:00";
        for input in [
            "2024-03-05 14:30:00",
            "2024-03-05T14:30:00",
            "2024-03-05T14:30",
            "2024-03-05 14:30:00.123456",
            "2024-03-05T14:30:00Z",
        ] {
            let parsed = parse_datetime(input).unwrap();
            assert_eq!(format_datetime(parsed)?, expected, "{input}");
        }
        assert_eq!(format_datetime(parse_datetime("2024-03-05").unwrap())?, "2024-03-05 00:00:00");
        assert!(parse_datetime("next tuesday").is_none());
        Ok(())
    }

    #[test]
    fn test_serializes_untagged() {
        let mut row = Row::new();
        row.insert("id".into(), Value::Int(1));
        row.insert("title".into(), Value::from("Hello"));
        row.insert("deleted_at".into(), Value::Null);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"id":1,"title":"Hello","deleted_at":null}"#);
    }

    #[test]
    fn test_datetime_renders_as_text() -> Result<()> {
        let dt = parse_datetime("2024-03-05 14:30:00").unwrap();
        let value = Value::from(dt);
        assert_eq!(value.to_string(), "2024-03-05 14:30:00");
        assert_eq!(value.to_text().as_deref(), Some("2024-03-05 14:30:00"));
        assert_eq!(serde_json::to_string(&value).unwrap(), r#""2024-03-05 14:30:00""#);
        assert_eq!(now_utc().nanosecond(), 0);
        assert!(!value.is_blank());
        Ok(())
    }
}
