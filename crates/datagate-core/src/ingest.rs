use std::collections::BTreeMap;

use tracing::debug;

use crate::dataset::DataSet;
use crate::error::{Error, Result};
use crate::row::Row;
use crate::schema::Schema;
use crate::value::Value;

/// A row as supplied by a collaborator, before it is resolved against the
/// schema.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    /// Field name to value.
    Named(Row),
    /// Primary-key fields then data fields, in declaration order.
    Positional(Vec<Value>),
}

/// Pre-collapse table contents: duplicate keys are still visible here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawData {
    tables: BTreeMap<String, Vec<RawRow>>,
}

impl RawData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_named(&mut self, table: impl Into<String>, row: Row) {
        self.tables.entry(table.into()).or_default().push(RawRow::Named(row));
    }

    pub fn push_positional<I, V>(&mut self, table: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.tables
            .entry(table.into())
            .or_default()
            .push(RawRow::Positional(values.into_iter().map(Into::into).collect()));
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn rows(&self, table: &str) -> &[RawRow] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Read `{ "table": [ {..} | [..], ... ], ... }`.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let object = json.as_object().ok_or_else(|| {
            Error::Structure("dataset must be a JSON object of tables".to_string())
        })?;

        let mut raw = RawData::new();
        for (table, rows) in object {
            let rows = rows.as_array().ok_or_else(|| {
                Error::Structure(format!("table {table} must be a JSON array of rows"))
            })?;
            let entry = raw.tables.entry(table.clone()).or_default();
            for (index, row) in rows.iter().enumerate() {
                let row = match row {
                    serde_json::Value::Object(fields) => RawRow::Named(
                        fields
                            .iter()
                            .map(|(field, value)| (field.clone(), Value::from(value)))
                            .collect(),
                    ),
                    serde_json::Value::Array(values) => {
                        RawRow::Positional(values.iter().map(Value::from).collect())
                    }
                    other => {
                        return Err(Error::Structure(format!(
                            "row {index} of {table} must be an object or an array, got {other}"
                        )));
                    }
                };
                entry.push(row);
            }
        }
        Ok(raw)
    }

    /// Every table named in the input has to exist in the schema.
    pub fn check_tables(&self, schema: &Schema) -> Result<()> {
        match self.tables.keys().find(|table| !schema.has_table(table)) {
            Some(table) => Err(Error::UnknownTable(table.clone())),
            None => Ok(()),
        }
    }

    /// Rows of one table resolved to named form.
    pub fn named_rows(&self, schema: &Schema, table: &str) -> Result<Vec<Row>> {
        let generic = schema.is_generic(table)?;
        let fields = schema.all_fields(table)?;
        self.rows(table)
            .iter()
            .enumerate()
            .map(|(index, row)| match row {
                RawRow::Named(row) => Ok(row.clone()),
                RawRow::Positional(_) if generic => Err(Error::Structure(format!(
                    "row {index} of generic table {table} must name its fields"
                ))),
                RawRow::Positional(values) if values.len() != fields.len() => {
                    Err(Error::Structure(format!(
                        "row {index} of {table} has {} values, expected {}",
                        values.len(),
                        fields.len()
                    )))
                }
                RawRow::Positional(values) => Ok(fields
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect()),
            })
            .collect()
    }
}

impl DataSet {
    /// Build a container from raw rows. Tables absent from the input are
    /// empty; rows sharing a key collapse to the last one.
    pub fn from_raw(schema: &Schema, raw: &RawData) -> Result<DataSet> {
        raw.check_tables(schema)?;
        let mut data = DataSet::new(schema);
        for table in schema.table_names() {
            let rows = raw.named_rows(schema, table)?;
            let supplied = rows.len();
            for row in rows {
                data.add_row(schema, table, row)?;
            }
            let stored = data.table(table)?.len();
            if stored < supplied {
                debug!(table, supplied, stored, "duplicate keys collapsed");
            }
        }
        Ok(data)
    }
}
