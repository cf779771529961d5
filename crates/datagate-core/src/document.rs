use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::SCHEMA_VERSION;
use crate::constraints::ForeignKey;
use crate::error::Result;
use crate::parameters::Parameter;
use crate::schema::{Schema, TableDef};
use crate::types::TypeRule;
use crate::validation::validate_document;
use crate::value::Value;

/// Plain-data description of a [`Schema`], sufficient to rebuild it.
///
/// Row predicates are code and are not carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SchemaDocument {
    /// Contract version for this document format.
    pub schema_version: String,
    /// Tables in declaration order.
    pub tables: Vec<TableDocument>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ancillary: Option<AncillaryInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableDocument {
    pub name: String,
    pub layout: TableLayout,
}

/// Serialized form of [`TableDef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableLayout {
    Fixed {
        primary_key: Vec<String>,
        data: Vec<String>,
    },
    Generic,
}

impl From<&TableDef> for TableLayout {
    fn from(def: &TableDef) -> Self {
        match def {
            TableDef::Fixed { primary_key, data } => TableLayout::Fixed {
                primary_key: primary_key.clone(),
                data: data.clone(),
            },
            TableDef::Generic => TableLayout::Generic,
        }
    }
}

impl From<&TableLayout> for TableDef {
    fn from(layout: &TableLayout) -> Self {
        match layout {
            TableLayout::Fixed { primary_key, data } => TableDef::Fixed {
                primary_key: primary_key.clone(),
                data: data.clone(),
            },
            TableLayout::Generic => TableDef::Generic,
        }
    }
}

/// Everything beyond the table layouts, keyed by table then field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AncillaryInfo {
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
    #[serde(default)]
    pub default_values: BTreeMap<String, BTreeMap<String, Value>>,
    #[serde(default)]
    pub data_types: BTreeMap<String, BTreeMap<String, TypeRule>>,
    #[serde(default)]
    pub tooltips: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Parameter>,
}

impl Schema {
    /// Describe this schema as plain data.
    ///
    /// Without ancillary info only the table layouts are included.
    pub fn schema(&self, include_ancillary_info: bool) -> SchemaDocument {
        let tables = self
            .table_names()
            .into_iter()
            .filter_map(|name| {
                let def = self.table_def(name).ok()?;
                Some(TableDocument {
                    name: name.to_string(),
                    layout: TableLayout::from(def),
                })
            })
            .collect();

        let ancillary = include_ancillary_info.then(|| self.ancillary_info());

        SchemaDocument {
            schema_version: SCHEMA_VERSION.to_string(),
            tables,
            ancillary,
        }
    }

    fn ancillary_info(&self) -> AncillaryInfo {
        let mut info = AncillaryInfo {
            foreign_keys: self.foreign_keys().to_vec(),
            parameters: self.parameters().clone(),
            ..AncillaryInfo::default()
        };
        for table in self.table_names() {
            if let Ok(defaults) = self.default_values(table) {
                if !defaults.is_empty() {
                    info.default_values.insert(table.to_string(), defaults.clone());
                }
            }
            if let Ok(rules) = self.data_types(table) {
                if !rules.is_empty() {
                    info.data_types.insert(table.to_string(), rules.clone());
                }
            }
            if let Ok(tooltips) = self.tooltips(table) {
                if !tooltips.is_empty() {
                    info.tooltips.insert(table.to_string(), tooltips.clone());
                }
            }
        }
        info
    }

    /// Rebuild a configurable schema from its document.
    pub fn create_from_full_schema(document: &SchemaDocument) -> Result<Schema> {
        validate_document(document)?;

        let mut schema = Schema::define(
            document
                .tables
                .iter()
                .map(|table| (table.name.clone(), TableDef::from(&table.layout))),
        )?;

        let Some(info) = &document.ancillary else {
            return Ok(schema);
        };

        for fk in &info.foreign_keys {
            schema.add_foreign_key(
                &fk.native_table,
                &fk.foreign_table,
                fk.mappings
                    .iter()
                    .map(|m| (m.native_field.clone(), m.foreign_field.clone())),
            )?;
        }
        for (table, defaults) in &info.default_values {
            for (field, value) in defaults {
                schema.set_default_value(table, field, value.clone())?;
            }
        }
        for (table, rules) in &info.data_types {
            for (field, rule) in rules {
                schema.set_data_type(table, field, Some(rule.clone()))?;
            }
        }
        for (table, tooltips) in &info.tooltips {
            for (field, tooltip) in tooltips {
                schema.set_tooltip(table, field, tooltip.clone())?;
            }
        }
        for (name, parameter) in &info.parameters {
            schema.add_parameter(name.clone(), parameter.default.clone(), parameter.rule.clone())?;
        }
        Ok(schema)
    }
}
