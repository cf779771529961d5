use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::predicates::{RowPredicate, Verdict};
use crate::types::TypeRule;
use crate::value::Value;

/// A named entry of the parameters table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Parameter {
    pub default: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<TypeRule>,
}

impl Parameter {
    /// The default has to satisfy the rule.
    pub fn new(default: Value, rule: Option<TypeRule>) -> Result<Self> {
        if let Some(rule) = &rule {
            rule.validate()?;
            if !rule.valid_data(&coerce_for_rule(&default, rule)) {
                return Err(Error::InvalidValue(format!(
                    "parameter default {default} does not satisfy its type rule"
                )));
            }
        }
        Ok(Self { default, rule })
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match &self.rule {
            Some(rule) => rule.valid_data(&coerce_for_rule(value, rule)),
            None => true,
        }
    }
}

/// Parameter values share one column, so numbers often arrive as text.
/// Numeric rules see the parsed number instead.
pub fn coerce_for_rule(value: &Value, rule: &TypeRule) -> Value {
    if !rule.number_allowed() {
        return value.clone();
    }
    let Some(text) = value.as_str() else {
        return value.clone();
    };
    if rule.strings_allowed().allows(text) {
        return value.clone();
    }
    let trimmed = text.trim();
    if let Ok(number) = trimmed.parse::<i64>() {
        return Value::Int(number);
    }
    match trimmed.parse::<f64>() {
        Ok(number) => Value::Float(number),
        Err(_) => value.clone(),
    }
}

/// Predicate enforcing parameter names and per-parameter value rules.
pub fn parameter_predicate(
    key_field: &str,
    value_field: &str,
    parameters: BTreeMap<String, Parameter>,
) -> RowPredicate {
    let key_field = key_field.to_string();
    let value_field = value_field.to_string();
    RowPredicate::from_fn(move |row| {
        let name = row.get(&key_field).cloned().unwrap_or(Value::Null);
        let Some(parameter) = name.as_str().and_then(|name| parameters.get(name)) else {
            return Verdict::from(format!("{name} is not a valid parameter name"));
        };
        let value = row.get(&value_field).cloned().unwrap_or(Value::Null);
        if parameter.accepts(&value) {
            Verdict::Valid
        } else {
            Verdict::from(format!("{value} is not a valid value for parameter {name}"))
        }
    })
    .error_message()
}

/// Every registered parameter's value, falling back to its default.
pub fn full_parameters<'a, I>(
    parameters: &BTreeMap<String, Parameter>,
    entries: I,
) -> BTreeMap<String, Value>
where
    I: IntoIterator<Item = (&'a Value, &'a Value)>,
{
    let mut resolved: BTreeMap<String, Value> = parameters
        .iter()
        .map(|(name, parameter)| (name.clone(), parameter.default.clone()))
        .collect();
    for (name, value) in entries {
        let Some(name) = name.as_str() else { continue };
        if let Some(parameter) = parameters.get(name) {
            let value = match &parameter.rule {
                Some(rule) => coerce_for_rule(value, rule),
                None => value.clone(),
            };
            resolved.insert(name.to_string(), value);
        }
    }
    resolved
}

#[cfg(test)]
mod tests {
    use crate::predicates::Kwargs;
    use crate::row::Row;
    use super::*;

    fn fraction() -> TypeRule {
        TypeRule::builder()
            .max(1.0)
            .inclusive_max(true)
            .build()
            .unwrap()
    }

    #[test]
    fn numeric_text_is_parsed_before_checking() {
        let parameter = Parameter::new(Value::Float(0.5), Some(fraction())).unwrap();
        assert!(parameter.accepts(&Value::from("0.25")));
        assert!(!parameter.accepts(&Value::from("1.5")));
        assert!(!parameter.accepts(&Value::from("half")));
    }

    #[test]
    fn synthesized_predicate_reports_names_and_values() {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            "Alpha".to_string(),
            Parameter::new(Value::Float(0.5), Some(fraction())).unwrap(),
        );
        let predicate = parameter_predicate("Key", "Value", parameters);

        let unknown = Row::from_iter([("Key", Value::from("Beta")), ("Value", Value::Int(1))]);
        assert_eq!(
            predicate.evaluate(&unknown, &Kwargs::new()).unwrap(),
            Verdict::Invalid(Some("Beta is not a valid parameter name".to_string()))
        );

        let bad = Row::from_iter([("Key", Value::from("Alpha")), ("Value", Value::Int(3))]);
        assert_eq!(
            predicate.evaluate(&bad, &Kwargs::new()).unwrap(),
            Verdict::Invalid(Some("3 is not a valid value for parameter Alpha".to_string()))
        );

        let good = Row::from_iter([("Key", Value::from("Alpha")), ("Value", Value::from("1"))]);
        assert!(predicate.evaluate(&good, &Kwargs::new()).unwrap().is_valid());
    }

    #[test]
    fn full_parameters_fill_defaults() {
        let mut parameters = BTreeMap::new();
        parameters.insert(
            "Alpha".to_string(),
            Parameter::new(Value::Float(0.5), Some(fraction())).unwrap(),
        );
        parameters.insert("Mode".to_string(), Parameter::new(Value::from("fast"), None).unwrap());

        let name = Value::from("Alpha");
        let value = Value::from("0.75");
        let resolved = full_parameters(&parameters, [(&name, &value)]);
        assert_eq!(resolved["Alpha"], Value::Float(0.75));
        assert_eq!(resolved["Mode"], Value::from("fast"));
    }
}
