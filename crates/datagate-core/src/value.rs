use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

/// A single cell value.
///
/// `Int` and `Float` compare equal (and hash alike) when they hold the same
/// integral number, so keys built from mixed numeric sources still join.
/// Timestamps serialize as text and read back as `Text`.
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl Value {
    /// Null, or a float NaN.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            _ => None,
        }
    }

    /// Integer view; floats qualify only when integral.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Float(value) if value.fract() == 0.0 && in_i64_range(*value) => {
                Some(*value as i64)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Timestamp view of the value, parsing text when needed.
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(value) => Some(*value),
            Value::Text(value) => parse_timestamp(value),
            _ => None,
        }
    }

    /// Defaults may only be null, text or a number.
    pub fn is_default_compatible(&self) -> bool {
        matches!(
            self,
            Value::Null | Value::Int(_) | Value::Float(_) | Value::Text(_)
        )
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("null, a boolean, a number or a string")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<Value, E> {
        Ok(Value::Bool(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Value, E> {
        Ok(Value::Int(value))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Value, E> {
        Ok(i64::try_from(value).map_or(Value::Float(value as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Value, E> {
        Ok(Value::Float(value))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Value, E> {
        Ok(Value::Text(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<Value, E> {
        Ok(Value::Text(value))
    }
}

fn in_i64_range(value: f64) -> bool {
    value >= i64::MIN as f64 && value < i64::MAX as f64
}

const TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse the timestamp spellings accepted by datetime rules.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(value) = DateTime::parse_from_rfc3339(text) {
        return Some(value.naive_utc());
    }
    for format in TIMESTAMP_FORMATS {
        if let Ok(value) = NaiveDateTime::parse_from_str(text, format) {
            return Some(value);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Int(_), Value::Float(_)) | (Value::Float(_), Value::Int(_)) => {
                match (self.as_i64(), other.as_i64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Value::Null => 0u8.hash(state),
            Value::Bool(value) => {
                1u8.hash(state);
                value.hash(state);
            }
            Value::Int(_) | Value::Float(_) => match self.as_i64() {
                Some(value) => {
                    2u8.hash(state);
                    value.hash(state);
                }
                None => {
                    3u8.hash(state);
                    let value = self.as_f64().unwrap_or(f64::NAN);
                    if value.is_nan() {
                        u64::MAX.hash(state);
                    } else if value == 0.0 {
                        0u64.hash(state);
                    } else {
                        value.to_bits().hash(state);
                    }
                }
            },
            Value::Timestamp(value) => {
                4u8.hash(state);
                value.hash(state);
            }
            Value::Text(value) => {
                5u8.hash(state);
                value.hash(state);
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Timestamp(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S")),
            Value::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(*value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Value::Text(value.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

impl From<&Value> for serde_json::Value {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Int(value) => serde_json::Value::from(*value),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Timestamp(value) => {
                serde_json::Value::String(value.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
            Value::Text(value) => serde_json::Value::String(value.clone()),
        }
    }
}

/// Primary-key projection of a row, in primary-key field order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Key(Vec<Value>);

impl Key {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn scalar(value: impl Into<Value>) -> Self {
        Self(vec![value.into()])
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

    pub fn has_null(&self) -> bool {
        self.0.iter().any(Value::is_null)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{single}"),
            values => {
                write!(f, "(")?;
                for (idx, value) in values.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn int_and_integral_float_are_the_same_key() {
        let mut keys = HashSet::new();
        keys.insert(Key::new(vec![Value::Int(3), Value::from("a")]));
        assert!(keys.contains(&Key::new(vec![Value::Float(3.0), Value::from("a")])));
        assert_ne!(Value::Int(3), Value::Float(3.5));
    }

    #[test]
    fn nan_counts_as_null() {
        assert!(Value::Float(f64::NAN).is_null());
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
    }

    #[test]
    fn key_display_matches_arity() {
        assert_eq!(Key::scalar("burger").to_string(), "burger");
        assert_eq!(
            Key::new(vec![Value::from("burger"), Value::from("fries")]).to_string(),
            "(burger, fries)"
        );
    }

    #[test]
    fn parses_common_timestamp_spellings() {
        assert!(parse_timestamp("2024-01-02").is_some());
        assert!(parse_timestamp("2024-01-02 10:11:12").is_some());
        assert!(parse_timestamp("2024-01-02T10:11:12Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn json_strings_read_back_as_text() {
        let when = parse_timestamp("2024-05-01T08:00:00").unwrap();
        let json = serde_json::to_string(&Value::Timestamp(when)).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Value::from("2024-05-01T08:00:00"));

        let cells: Vec<Value> = serde_json::from_str(r#"[null, true, 7, 2.5, "x"]"#).unwrap();
        assert_eq!(
            cells,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(7),
                Value::Float(2.5),
                Value::from("x")
            ]
        );
        assert!(serde_json::from_str::<Value>("[1]").is_err());
    }
}
