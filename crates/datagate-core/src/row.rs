use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::predicates::PredicateError;
use crate::value::Value;

/// A row of field values, keyed by field name.
///
/// Every input shape is converted into this type at ingestion, so checker
/// code only ever deals with one row representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(HashMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.0.get_mut(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    /// Field value, or an error naming the missing field.
    pub fn value(&self, field: &str) -> Result<&Value, PredicateError> {
        self.0
            .get(field)
            .ok_or_else(|| PredicateError(format!("field '{field}' is missing")))
    }

    /// Numeric field value.
    pub fn number(&self, field: &str) -> Result<f64, PredicateError> {
        let value = self.value(field)?;
        value
            .as_f64()
            .ok_or_else(|| PredicateError(format!("field '{field}' is not numeric: {value}")))
    }

    /// Text field value.
    pub fn text(&self, field: &str) -> Result<&str, PredicateError> {
        let value = self.value(field)?;
        value
            .as_str()
            .ok_or_else(|| PredicateError(format!("field '{field}' is not text: {value}")))
    }

    /// Ordered copy of the requested fields, null where absent.
    pub fn project(&self, fields: &[String]) -> Vec<Value> {
        fields
            .iter()
            .map(|field| self.0.get(field).cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub fn to_json(&self, fields: &[String]) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        for field in fields {
            let value = self.0.get(field).unwrap_or(&Value::Null);
            object.insert(field.clone(), serde_json::Value::from(value));
        }
        serde_json::Value::Object(object)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(field, value)| (field.into(), value.into()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_report_the_field() {
        let row = Row::from_iter([("Name", Value::from("burger")), ("Cost", Value::Float(2.49))]);
        assert_eq!(row.number("Cost").unwrap(), 2.49);
        assert_eq!(row.text("Name").unwrap(), "burger");
        assert!(row.number("Name").unwrap_err().0.contains("Name"));
        assert!(row.value("Qty").unwrap_err().0.contains("Qty"));
    }

    #[test]
    fn project_fills_missing_fields_with_null() {
        let row = Row::from_iter([("A", 1)]);
        let projected = row.project(&["A".to_string(), "B".to_string()]);
        assert_eq!(projected, vec![Value::Int(1), Value::Null]);
    }
}
