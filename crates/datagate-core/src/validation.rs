use std::collections::{BTreeMap, BTreeSet};

use jsonschema::JSONSchema;
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde::{Deserialize, Serialize};

use crate::document::{SchemaDocument, TableLayout};
use crate::error::{Error, Result};
use crate::schema::PARAMETERS_TABLE;

/// One structural problem found in a schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIssue {
    /// JSON pointer into the offending document.
    pub path: String,
    pub message: String,
}

/// JSON Schema for the schema interchange document.
pub fn document_json_schema() -> RootSchema {
    schema_for!(SchemaDocument)
}

/// Check a raw JSON document against the interchange JSON Schema.
pub fn validate_document_json(document: &serde_json::Value) -> Result<Vec<DocumentIssue>> {
    let json_schema = serde_json::to_value(document_json_schema())?;
    let compiled =
        JSONSchema::compile(&json_schema).map_err(|err| Error::InvalidSchema(err.to_string()))?;

    let mut issues = Vec::new();
    if let Err(errors) = compiled.validate(document) {
        for error in errors {
            let path = error.instance_path.to_string();
            issues.push(DocumentIssue {
                path: if path.is_empty() { "/".to_string() } else { path },
                message: error.to_string(),
            });
        }
    }
    Ok(issues)
}

/// Validate internal consistency of a schema document.
///
/// This checks:
/// - duplicate tables and fields
/// - foreign key tables and fields exist
/// - per-field ancillary entries reference declared fields
/// - parameters come with a parameters table
pub fn validate_document(document: &SchemaDocument) -> Result<()> {
    let mut catalog: BTreeMap<&str, Option<BTreeSet<&str>>> = BTreeMap::new();

    for table in &document.tables {
        if catalog.contains_key(table.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate table name: {}",
                table.name
            )));
        }
        let fields = match &table.layout {
            TableLayout::Fixed { primary_key, data } => {
                let mut fields = BTreeSet::new();
                for field in primary_key.iter().chain(data.iter()) {
                    if !fields.insert(field.as_str()) {
                        return Err(Error::InvalidSchema(format!(
                            "duplicate field name: {}.{}",
                            table.name, field
                        )));
                    }
                }
                Some(fields)
            }
            TableLayout::Generic => None,
        };
        catalog.insert(table.name.as_str(), fields);
    }

    let Some(info) = &document.ancillary else {
        return Ok(());
    };

    let field_exists = |table: &str, field: &str, what: &str| -> Result<()> {
        match catalog.get(table) {
            None => Err(Error::InvalidSchema(format!("{what} references unknown table: {table}"))),
            Some(None) => Err(Error::InvalidSchema(format!(
                "{what} references generic table: {table}"
            ))),
            Some(Some(fields)) if !fields.contains(field) => Err(Error::InvalidSchema(format!(
                "{what} references unknown field: {table}.{field}"
            ))),
            Some(Some(_)) => Ok(()),
        }
    };

    for fk in &info.foreign_keys {
        for mapping in &fk.mappings {
            field_exists(&fk.native_table, &mapping.native_field, "foreign key")?;
            field_exists(&fk.foreign_table, &mapping.foreign_field, "foreign key")?;
        }
    }
    for (table, fields) in &info.default_values {
        for field in fields.keys() {
            field_exists(table, field, "default value")?;
        }
    }
    for (table, fields) in &info.data_types {
        for field in fields.keys() {
            field_exists(table, field, "data type")?;
        }
    }
    for (table, fields) in &info.tooltips {
        for field in fields.keys() {
            field_exists(table, field, "tooltip")?;
        }
    }
    if !info.parameters.is_empty() && !catalog.contains_key(PARAMETERS_TABLE) {
        return Err(Error::InvalidSchema(format!(
            "parameters require a '{PARAMETERS_TABLE}' table"
        )));
    }

    Ok(())
}
