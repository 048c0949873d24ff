//! Dialect-neutral bind values.
//!
//! [`Value`] is what flows through condition arguments, write paths and
//! result sets. Date/time variants are kept typed inside records and only
//! turned into their canonical UTC storage strings by [`Value::normalized`],
//! which the query builder applies to every bound or inlined condition value.

use crate::error::{OrmError, OrmResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage format for datetime/timestamp values.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Storage format for date values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Storage format for time values.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// A single SQL value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(DateTime<Utc>),
}

impl Value {
    /// `Null` or an empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Convert date/time values to their canonical UTC storage strings.
    pub fn normalized(self) -> Value {
        match self {
            Value::DateTime(dt) => Value::Text(dt.format(DATETIME_FORMAT).to_string()),
            Value::Date(d) => Value::Text(d.format(DATE_FORMAT).to_string()),
            Value::Time(t) => Value::Text(t.format(TIME_FORMAT).to_string()),
            other => other,
        }
    }

    /// Stable textual form used for identity-map keys.
    pub fn key_fragment(&self) -> String {
        match self {
            Value::Null => "\u{2400}".to_string(),
            Value::Bool(b) => u8::from(*b).to_string(),
            Value::Int(i) => i.to_string(),
            Value::UInt(u) => u.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::Time(t) => t.format(TIME_FORMAT).to_string(),
            Value::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            other => f.write_str(&other.key_fragment()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $conv:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(<$conv>::from(v))
                }
            }
        )*
    };
}

value_from! {
    bool => Bool as bool,
    i8 => Int as i64,
    i16 => Int as i64,
    i32 => Int as i64,
    i64 => Int as i64,
    u8 => UInt as u64,
    u16 => UInt as u64,
    u32 => UInt as u64,
    u64 => UInt as u64,
    f32 => Float as f64,
    f64 => Float as f64,
    String => Text as String,
    Vec<u8> => Bytes as Vec<u8>,
    NaiveDate => Date as NaiveDate,
    NaiveTime => Time as NaiveTime,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<NaiveDateTime> for Value {
    /// Naive datetimes are taken to be UTC.
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(Utc.from_utc_datetime(&v))
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::DateTime(v.with_timezone(&Utc))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Convert a stored [`Value`] back into a Rust type.
pub trait FromValue: Sized {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self>;
}

fn mismatch(column: &str, expected: &str, value: &Value) -> OrmError {
    OrmError::decode(column, format!("expected {expected}, got {value:?}"))
}

impl FromValue for Value {
    fn from_value(_: &str, value: &Value) -> OrmResult<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            Value::UInt(u) => Ok(*u != 0),
            other => Err(mismatch(column, "bool", other)),
        }
    }
}

macro_rules! from_value_int {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
                    let wide: Option<i128> = match value {
                        Value::Int(i) => Some(i128::from(*i)),
                        Value::UInt(u) => Some(i128::from(*u)),
                        Value::Bool(b) => Some(i128::from(*b)),
                        Value::Text(s) => s.parse().ok(),
                        _ => None,
                    };
                    wide.and_then(|w| <$ty>::try_from(w).ok())
                        .ok_or_else(|| mismatch(column, stringify!($ty), value))
                }
            }
        )*
    };
}

from_value_int!(i8, i16, i32, i64, u8, u16, u32, u64);

impl FromValue for f64 {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            Value::UInt(u) => Ok(*u as f64),
            Value::Text(s) => s.parse().map_err(|_| mismatch(column, "f64", value)),
            other => Err(mismatch(column, "f64", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        f64::from_value(column, value).map(|f| f as f32)
    }
}

impl FromValue for String {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Null | Value::Bytes(_) => Err(mismatch(column, "text", value)),
            other => Ok(other.key_fragment()),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Bytes(b) => Ok(b.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(mismatch(column, "bytes", other)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date_naive()),
            Value::Text(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(mismatch(column, "date", other)),
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::Time(t) => Ok(*t),
            Value::Text(s) => NaiveTime::parse_from_str(s, TIME_FORMAT)
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(mismatch(column, "time", other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            Value::Text(s) => NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
                .map(|naive| Utc.from_utc_datetime(&naive))
                .map_err(|e| OrmError::decode(column, e.to_string())),
            other => Err(mismatch(column, "datetime", other)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        DateTime::<Utc>::from_value(column, value).map(|dt| dt.naive_utc())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(column: &str, value: &Value) -> OrmResult<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(column, value).map(Some)
        }
    }
}

/// A primary-key value: one element per primary-key column.
#[derive(Debug, Clone, PartialEq)]
pub struct Key(pub Vec<Value>);

impl Key {
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    /// A key is missing when any of its parts is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty() || self.0.iter().any(Value::is_empty)
    }

    /// Identity-map key.
    pub fn cache_key(&self) -> String {
        self.0
            .iter()
            .map(Value::key_fragment)
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }
}

impl<T: Into<Value>> From<T> for Key {
    fn from(v: T) -> Self {
        Key(vec![v.into()])
    }
}

impl From<Vec<Value>> for Key {
    fn from(v: Vec<Value>) -> Self {
        Key(v)
    }
}
