use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::Value;

/// Strings accepted by a type rule.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StringsAllowed {
    #[default]
    None,
    /// Any string at all (`"*"` in the interchange format).
    Any,
    Only(BTreeSet<String>),
}

impl StringsAllowed {
    pub fn only<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            StringsAllowed::None
        } else {
            StringsAllowed::Only(values)
        }
    }

    pub fn allows(&self, text: &str) -> bool {
        match self {
            StringsAllowed::None => false,
            StringsAllowed::Any => true,
            StringsAllowed::Only(values) => values.contains(text),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, StringsAllowed::None)
    }
}

/// Serialized as `"*"` for the wildcard, or as a (possibly empty) list.
#[derive(Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
enum StringsAllowedRepr {
    Wildcard(String),
    List(Vec<String>),
}

impl Serialize for StringsAllowed {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let repr = match self {
            StringsAllowed::None => StringsAllowedRepr::List(Vec::new()),
            StringsAllowed::Any => StringsAllowedRepr::Wildcard("*".to_string()),
            StringsAllowed::Only(values) => {
                StringsAllowedRepr::List(values.iter().cloned().collect())
            }
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for StringsAllowed {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        match StringsAllowedRepr::deserialize(deserializer)? {
            StringsAllowedRepr::Wildcard(text) if text == "*" => Ok(StringsAllowed::Any),
            StringsAllowedRepr::Wildcard(text) => Err(serde::de::Error::custom(format!(
                "strings_allowed must be \"*\" or a list, got \"{text}\""
            ))),
            StringsAllowedRepr::List(values) => Ok(StringsAllowed::only(values)),
        }
    }
}

impl JsonSchema for StringsAllowed {
    fn schema_name() -> String {
        "StringsAllowed".to_string()
    }

    fn json_schema(generator: &mut schemars::r#gen::SchemaGenerator) -> schemars::schema::Schema {
        StringsAllowedRepr::json_schema(generator)
    }
}

/// Numeric limits may be infinite; JSON has no spelling for that, so
/// infinities travel as the strings `"inf"` and `"-inf"`.
mod limit {
    use schemars::JsonSchema;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize, JsonSchema)]
    #[serde(untagged)]
    pub(super) enum LimitRepr {
        Number(f64),
        Infinite(String),
    }

    pub(super) fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() {
            let text = if *value > 0.0 { "inf" } else { "-inf" };
            LimitRepr::Infinite(text.to_string()).serialize(serializer)
        } else {
            LimitRepr::Number(*value).serialize(serializer)
        }
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match LimitRepr::deserialize(deserializer)? {
            LimitRepr::Number(value) => Ok(value),
            LimitRepr::Infinite(text) => match text.as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!("invalid numeric limit '{other}'"))),
            },
        }
    }
}

/// Domain of legal values for a single field.
///
/// Built through [`TypeRule::builder`], which starts from the usual numeric
/// defaults: numbers in `[0, +inf)`, no strings, not nullable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TypeRule {
    number_allowed: bool,
    inclusive_min: bool,
    inclusive_max: bool,
    #[serde(with = "limit")]
    #[schemars(with = "limit::LimitRepr")]
    min: f64,
    #[serde(with = "limit")]
    #[schemars(with = "limit::LimitRepr")]
    max: f64,
    must_be_int: bool,
    strings_allowed: StringsAllowed,
    nullable: bool,
    datetime: bool,
}

impl Default for TypeRule {
    fn default() -> Self {
        Self {
            number_allowed: true,
            inclusive_min: true,
            inclusive_max: false,
            min: 0.0,
            max: f64::INFINITY,
            must_be_int: false,
            strings_allowed: StringsAllowed::None,
            nullable: false,
            datetime: false,
        }
    }
}

impl TypeRule {
    pub fn builder() -> TypeRuleBuilder {
        TypeRuleBuilder {
            rule: TypeRule::default(),
        }
    }

    /// Rule accepting any timestamp (or text coercible to one).
    pub fn datetime() -> TypeRuleBuilder {
        TypeRule::builder().number_allowed(false).datetime(true)
    }

    /// Rule accepting only the given strings.
    pub fn strings<I, S>(values: I) -> TypeRuleBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeRule::builder()
            .number_allowed(false)
            .strings_allowed(StringsAllowed::only(values))
    }

    /// Rule accepting any string.
    pub fn any_string() -> TypeRuleBuilder {
        TypeRule::builder()
            .number_allowed(false)
            .strings_allowed(StringsAllowed::Any)
    }

    pub fn number_allowed(&self) -> bool {
        self.number_allowed
    }

    pub fn inclusive_min(&self) -> bool {
        self.inclusive_min
    }

    pub fn inclusive_max(&self) -> bool {
        self.inclusive_max
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn must_be_int(&self) -> bool {
        self.must_be_int
    }

    pub fn strings_allowed(&self) -> &StringsAllowed {
        &self.strings_allowed
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_datetime(&self) -> bool {
        self.datetime
    }

    /// Check that the attributes are mutually consistent.
    pub fn validate(&self) -> Result<()> {
        if self.min.is_nan() || self.max.is_nan() {
            return Err(Error::InvalidTypeRule("min and max cannot be NaN".to_string()));
        }
        if self.datetime {
            if self.number_allowed || !self.strings_allowed.is_none() {
                return Err(Error::InvalidTypeRule(
                    "datetime rules cannot also allow numbers or strings".to_string(),
                ));
            }
            return Ok(());
        }
        if self.number_allowed && self.max < self.min {
            return Err(Error::InvalidTypeRule(format!(
                "max ({}) must be at least min ({})",
                self.max, self.min
            )));
        }
        if !self.number_allowed && self.strings_allowed.is_none() {
            return Err(Error::InvalidTypeRule(
                "rule must allow numbers, strings or datetimes".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns true when `value` lies in this rule's domain.
    pub fn valid_data(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.nullable;
        }
        if self.datetime {
            return value.as_timestamp().is_some();
        }
        match value {
            Value::Int(_) | Value::Float(_) => self.valid_number(value),
            Value::Text(text) => self.strings_allowed.allows(text),
            _ => false,
        }
    }

    fn valid_number(&self, value: &Value) -> bool {
        if !self.number_allowed {
            return false;
        }
        let Some(number) = value.as_f64() else {
            return false;
        };
        if number < self.min || number > self.max {
            return false;
        }
        if !self.inclusive_min && number == self.min {
            return false;
        }
        if !self.inclusive_max && number == self.max {
            return false;
        }
        if self.must_be_int && value.as_i64().is_none() {
            return false;
        }
        true
    }
}

/// Builder for [`TypeRule`]; `build` validates the result.
#[derive(Debug, Clone)]
pub struct TypeRuleBuilder {
    rule: TypeRule,
}

impl TypeRuleBuilder {
    pub fn number_allowed(mut self, allowed: bool) -> Self {
        self.rule.number_allowed = allowed;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.rule.min = min;
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.rule.max = max;
        self
    }

    pub fn inclusive_min(mut self, inclusive: bool) -> Self {
        self.rule.inclusive_min = inclusive;
        self
    }

    pub fn inclusive_max(mut self, inclusive: bool) -> Self {
        self.rule.inclusive_max = inclusive;
        self
    }

    pub fn must_be_int(mut self, must_be_int: bool) -> Self {
        self.rule.must_be_int = must_be_int;
        self
    }

    pub fn strings_allowed(mut self, strings: StringsAllowed) -> Self {
        self.rule.strings_allowed = strings;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.rule.nullable = nullable;
        self
    }

    pub fn datetime(mut self, datetime: bool) -> Self {
        self.rule.datetime = datetime;
        self
    }

    pub fn build(self) -> Result<TypeRule> {
        self.rule.validate()?;
        Ok(self.rule)
    }
}
