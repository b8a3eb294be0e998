//! Typed column values.
//!
//! Dates and timestamps are carried in the storage representation the
//! change-capture subsystem hands over: days (dates) or microseconds
//! (timestamps) relative to 2000-01-01, with the extreme integer values
//! reserved as the `-infinity` / `infinity` sentinels. Calendar
//! decomposition happens only at encode time.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Days value reserved for `-infinity` dates.
pub const DATE_NEG_INFINITY: i32 = i32::MIN;
/// Days value reserved for `infinity` dates.
pub const DATE_INFINITY: i32 = i32::MAX;
/// Microseconds value reserved for `-infinity` timestamps.
pub const TIMESTAMP_NEG_INFINITY: i64 = i64::MIN;
/// Microseconds value reserved for `infinity` timestamps.
pub const TIMESTAMP_INFINITY: i64 = i64::MAX;

/// The storage epoch, 2000-01-01.
pub fn storage_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// One column value. The payload variant must agree with the column's type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Payload of a small-int column.
    Int(i64),
    /// Payload of a big-int column.
    BigInt(i64),
    Float(f64),
    /// Canonical textual form of an arbitrary-precision numeric.
    Decimal(String),
    /// Days since 2000-01-01.
    Date(i32),
    /// Microseconds since 2000-01-01 00:00:00.
    Timestamp(i64),
    /// Microseconds since 2000-01-01 00:00:00 UTC.
    TimestampTz(i64),
    Array(Vec<Value>),
    Composite(Row),
    /// Default textual form of any other type.
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Payload label used in type-mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::Timestamp(_) => "timestamp",
            Value::TimestampTz(_) => "timestamptz",
            Value::Array(_) => "array",
            Value::Composite(_) => "composite",
            Value::Text(_) => "text",
        }
    }

    pub fn decimal(text: impl Into<String>) -> Self {
        Value::Decimal(text.into())
    }

    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    /// A finite date. Dates whose day offset does not fit the storage range
    /// collapse onto the matching infinity sentinel.
    pub fn date(date: NaiveDate) -> Self {
        let days = date.signed_duration_since(storage_epoch()).num_days();
        Value::Date(days.clamp(DATE_NEG_INFINITY as i64, DATE_INFINITY as i64) as i32)
    }

    pub fn timestamp(ts: NaiveDateTime) -> Self {
        Value::Timestamp(micros_since_epoch(ts))
    }

    pub fn timestamptz(ts: DateTime<Utc>) -> Self {
        Value::TimestampTz(micros_since_epoch(ts.naive_utc()))
    }
}

fn micros_since_epoch(ts: NaiveDateTime) -> i64 {
    let epoch = storage_epoch().and_hms_opt(0, 0, 0).unwrap_or(NaiveDateTime::MIN);
    let delta = ts.signed_duration_since(epoch);
    match delta.num_microseconds() {
        Some(micros) => micros,
        None if delta.num_seconds() < 0 => TIMESTAMP_NEG_INFINITY,
        None => TIMESTAMP_INFINITY,
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
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

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// An ordered row of values, one slot per descriptor column (dropped ones included).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<&Value> {
        self.0.get(slot)
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl FromIterator<Value> for Row {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_offsets_from_2000() {
        let d = NaiveDate::from_ymd_opt(2000, 1, 2).unwrap();
        assert_eq!(Value::date(d), Value::Date(1));
        let d = NaiveDate::from_ymd_opt(1999, 12, 31).unwrap();
        assert_eq!(Value::date(d), Value::Date(-1));
    }

    #[test]
    fn test_timestamp_offsets_from_2000() {
        let ts = NaiveDate::from_ymd_opt(2000, 1, 1)
            .unwrap()
            .and_hms_micro_opt(0, 0, 1, 500)
            .unwrap();
        assert_eq!(Value::timestamp(ts), Value::Timestamp(1_000_500));
    }

    #[test]
    fn test_option_conversion_maps_none_to_null() {
        let v: Value = Option::<i32>::None.into();
        assert!(v.is_null());
        let v: Value = Some(7).into();
        assert_eq!(v, Value::Int(7));
    }

    #[test]
    fn test_row_accessors() {
        let row: Row = vec![Value::Int(1), Value::Null].into();
        assert_eq!(row.len(), 2);
        assert_eq!(row.get(1), Some(&Value::Null));
        assert!(row.get(2).is_none());
    }
}
