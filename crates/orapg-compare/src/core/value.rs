//! SQL value types for engine-agnostic row handling.
//!
//! Both engines reduce result rows to [`SqlValue`]s, which render to a
//! deterministic text form. The exporter and the row fingerprinter both
//! operate on that rendering, so a value compares equal across engines iff
//! its rendered text matches.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// SQL value enum covering the scalar types both engines produce.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (smallint, int, bigint).
    Int(i64),

    /// Floating point (real, double precision, binary_double).
    Float(f64),

    /// Arbitrary-precision numeric.
    Decimal(Decimal),

    /// Text data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID value.
    Uuid(Uuid),

    /// Timestamp without timezone.
    Timestamp(NaiveDateTime),

    /// Timestamp with timezone offset.
    TimestampTz(DateTime<FixedOffset>),

    /// Date without time component.
    Date(NaiveDate),

    /// Time without date component.
    Time(NaiveTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Render to the raw text form used for export and fingerprinting.
    ///
    /// NULL renders as an empty string here; the exporter substitutes the
    /// sentinel tokens and applies delimiter escaping on top of this.
    /// Float and decimal renderings drop trailing zeros after the point so
    /// `1.50` and `1.5` compare equal across engines.
    pub fn render(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::Float(v) => trim_fraction(&format!("{}", v)),
            SqlValue::Decimal(v) => trim_fraction(&v.to_string()),
            SqlValue::Text(v) => v.clone(),
            SqlValue::Bytes(v) => hex_encode(v),
            SqlValue::Uuid(v) => v.to_string(),
            SqlValue::Timestamp(v) => v.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            SqlValue::TimestampTz(v) => v.format("%Y-%m-%d %H:%M:%S%.f %:z").to_string(),
            SqlValue::Date(v) => v.format("%Y-%m-%d").to_string(),
            SqlValue::Time(v) => v.format("%H:%M:%S%.f").to_string(),
        }
    }
}

/// Strip trailing zeros (and a bare trailing point) from a decimal rendering.
fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

/// Lowercase hex rendering for binary columns.
fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}
