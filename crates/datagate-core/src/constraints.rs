use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One side of a foreign-key relationship.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    One,
    Many,
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Multiplicity::One => write!(f, "one"),
            Multiplicity::Many => write!(f, "many"),
        }
    }
}

/// Derived cardinality of a foreign key.
///
/// A side is `One` when its mapped fields are exactly that table's (non-empty)
/// primary key, which guarantees uniqueness on that side.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub struct Cardinality {
    pub native: Multiplicity,
    pub foreign: Multiplicity,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-to-{}", self.native, self.foreign)
    }
}

/// A single native field → foreign field pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct FieldMapping {
    pub native_field: String,
    pub foreign_field: String,
}

impl FieldMapping {
    pub fn new(native_field: impl Into<String>, foreign_field: impl Into<String>) -> Self {
        Self {
            native_field: native_field.into(),
            foreign_field: foreign_field.into(),
        }
    }
}

/// Declared referential constraint from a native table to a foreign table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKey {
    pub native_table: String,
    pub foreign_table: String,
    pub mappings: Vec<FieldMapping>,
    pub cardinality: Cardinality,
}

impl ForeignKey {
    pub fn native_fields(&self) -> Vec<&str> {
        self.mappings
            .iter()
            .map(|mapping| mapping.native_field.as_str())
            .collect()
    }

    pub fn foreign_fields(&self) -> Vec<&str> {
        self.mappings
            .iter()
            .map(|mapping| mapping.foreign_field.as_str())
            .collect()
    }

    /// True when both keys link the same tables through the same pairs.
    pub fn same_mapping(
        &self,
        native_table: &str,
        foreign_table: &str,
        mappings: &[FieldMapping],
    ) -> bool {
        if self.native_table != native_table || self.foreign_table != foreign_table {
            return false;
        }
        let mut mine = self.mappings.clone();
        let mut theirs = mappings.to_vec();
        mine.sort();
        theirs.sort();
        mine == theirs
    }
}

/// Multiplicity of one side given its mapped fields and its primary key.
pub fn side_multiplicity(mapped: &[&str], primary_key: &[String]) -> Multiplicity {
    if primary_key.is_empty() || mapped.len() != primary_key.len() {
        return Multiplicity::Many;
    }
    if primary_key
        .iter()
        .all(|field| mapped.contains(&field.as_str()))
    {
        Multiplicity::One
    } else {
        Multiplicity::Many
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|field| field.to_string()).collect()
    }

    #[test]
    fn full_primary_key_is_one() {
        assert_eq!(side_multiplicity(&["Name"], &pk(&["Name"])), Multiplicity::One);
        assert_eq!(
            side_multiplicity(&["B", "A"], &pk(&["A", "B"])),
            Multiplicity::One
        );
    }

    #[test]
    fn partial_or_missing_primary_key_is_many() {
        assert_eq!(side_multiplicity(&["A"], &pk(&["A", "B"])), Multiplicity::Many);
        assert_eq!(side_multiplicity(&["A"], &pk(&[])), Multiplicity::Many);
    }

    #[test]
    fn cardinality_display() {
        let cardinality = Cardinality {
            native: Multiplicity::Many,
            foreign: Multiplicity::One,
        };
        assert_eq!(cardinality.to_string(), "many-to-one");
    }
}
