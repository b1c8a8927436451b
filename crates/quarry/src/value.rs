//! Loosely-typed scalar values accepted by the builder surface.
//!
//! The builder methods take `impl Into<Value>` wherever the caller may
//! supply a string, a number, a boolean, a timestamp, or NULL. Rendering
//! into a SQL literal is dialect-aware and happens exactly once, at the
//! call that accepts the value.

use crate::dialect::Dialect;
use crate::error::{QbError, QbResult};
use chrono::{DateTime, Utc};

/// A scalar value bound into a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL. Special-cased by the WHERE path (`IS NULL`), never a literal.
    Null,
    /// Boolean, rendered as `1`/`0`.
    Bool(bool),
    /// Signed integer literal.
    Int(i64),
    /// Floating-point literal. Non-finite values are rejected at the call site.
    Float(f64),
    /// Text. Numeric-looking strings are coerced to bare literals unless
    /// they carry a leading zero.
    Str(String),
    /// Timestamp, rendered as a quoted `YYYY-MM-DD HH:MM:SS` literal.
    DateTime(DateTime<Utc>),
}

impl Value {
    /// Whether this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(v as i64)
            }
        })*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

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
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = QbError;

    /// Ingest a loosely-typed JSON scalar. Arrays and objects are not
    /// scalar values and are rejected.
    fn try_from(v: serde_json::Value) -> QbResult<Self> {
        match v {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Value::Float(f))
                } else {
                    Err(QbError::invalid_argument(format!(
                        "Number out of range: {n}"
                    )))
                }
            }
            serde_json::Value::String(s) => Ok(Value::Str(s)),
            serde_json::Value::Array(_) => Err(QbError::invalid_argument(
                "Arrays are not valid scalar values",
            )),
            serde_json::Value::Object(_) => Err(QbError::invalid_argument(
                "Nested objects are not valid scalar values",
            )),
        }
    }
}

/// Render a value as a dialect-correct SQL literal.
///
/// NULL renders as the keyword `NULL`; the WHERE path intercepts it before
/// this point and emits `IS NULL` instead.
pub(crate) fn escape_value(dialect: &dyn Dialect, value: &Value) -> QbResult<String> {
    match value {
        Value::Null => Ok("NULL".to_string()),
        Value::Bool(true) => Ok("1".to_string()),
        Value::Bool(false) => Ok("0".to_string()),
        Value::Int(n) => Ok(n.to_string()),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(QbError::invalid_argument(
                    "NaN and infinite values cannot be rendered as SQL literals",
                ));
            }
            Ok(f.to_string())
        }
        Value::Str(s) => Ok(match numeric_literal(s) {
            Some(n) => n.to_string(),
            None => format!("'{}'", dialect.escape_string(s)),
        }),
        Value::DateTime(dt) => Ok(format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S"))),
    }
}

/// Return the trimmed numeric literal if `s` looks like a plain number.
///
/// A leading zero on a multi-digit integer part marks an opaque string
/// (zip codes, phone numbers), not a number.
pub(crate) fn numeric_literal(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let unsigned = t.strip_prefix('-').unwrap_or(t);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(f) = frac_part {
        if f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    if frac_part.is_none() && int_part.len() > 1 && int_part.starts_with('0') {
        return None;
    }
    Some(t)
}
