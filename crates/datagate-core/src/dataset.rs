use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::parameters::full_parameters;
use crate::row::Row;
use crate::schema::{PARAMETERS_TABLE, Schema};
use crate::value::{Key, Value};

static NULL: Value = Value::Null;

/// Identity of a row within its table: the primary key for keyed tables,
/// the position for sequence tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RowRef {
    Key(Key),
    Index(usize),
}

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowRef::Key(key) => write!(f, "{key}"),
            RowRef::Index(index) => write!(f, "#{index}"),
        }
    }
}

/// Rows of a primary-keyed table, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyedRows {
    order: Vec<Key>,
    rows: HashMap<Key, Row>,
}

impl KeyedRows {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<&Row> {
        self.rows.get(key)
    }

    pub fn get_mut(&mut self, key: &Key) -> Option<&mut Row> {
        self.rows.get_mut(key)
    }

    pub fn contains_key(&self, key: &Key) -> bool {
        self.rows.contains_key(key)
    }

    /// Insert or replace; a replaced row keeps its original position.
    pub fn insert(&mut self, key: Key, row: Row) -> Option<Row> {
        if let Some(existing) = self.rows.get_mut(&key) {
            return Some(std::mem::replace(existing, row));
        }
        self.order.push(key.clone());
        self.rows.insert(key, row);
        None
    }

    pub fn remove(&mut self, key: &Key) -> Option<Row> {
        let row = self.rows.remove(key)?;
        self.order.retain(|existing| existing != key);
        Some(row)
    }

    /// Re-key rows in place, keeping their positions.
    ///
    /// Returns false and changes nothing when the moves would leave two rows
    /// under one key.
    pub fn rekey(&mut self, moves: &HashMap<Key, Key>) -> bool {
        let target = |key: &Key| moves.get(key).unwrap_or(key).clone();
        let mut seen = HashSet::with_capacity(self.order.len());
        if !self.order.iter().all(|key| seen.insert(target(key))) {
            return false;
        }
        let mut rows = HashMap::with_capacity(self.rows.len());
        for (key, row) in self.rows.drain() {
            rows.insert(target(&key), row);
        }
        self.rows = rows;
        for key in &mut self.order {
            *key = target(key);
        }
        true
    }

    /// Remove a batch of keys in one sweep; returns how many were present.
    pub fn remove_all(&mut self, keys: &HashSet<Key>) -> usize {
        let before = self.rows.len();
        self.rows.retain(|key, _| !keys.contains(key));
        self.order.retain(|key| !keys.contains(key));
        before - self.rows.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Key> {
        self.order.iter()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Row)> {
        self.order
            .iter()
            .filter_map(|key| self.rows.get(key).map(|row| (key, row)))
    }
}

/// One row as seen by a scan: its position, its key (if keyed) and its data.
#[derive(Debug, Clone, Copy)]
pub struct RowEntry<'a> {
    pub index: usize,
    pub key: Option<&'a Key>,
    pub row: &'a Row,
}

impl RowEntry<'_> {
    pub fn row_ref(&self) -> RowRef {
        match self.key {
            Some(key) => RowRef::Key(key.clone()),
            None => RowRef::Index(self.index),
        }
    }
}

/// Storage of one table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRows {
    Keyed(KeyedRows),
    Sequence(Vec<Row>),
}

impl TableRows {
    pub fn len(&self) -> usize {
        match self {
            TableRows::Keyed(rows) => rows.len(),
            TableRows::Sequence(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_keyed(&self) -> Option<&KeyedRows> {
        match self {
            TableRows::Keyed(rows) => Some(rows),
            TableRows::Sequence(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Row]> {
        match self {
            TableRows::Keyed(_) => None,
            TableRows::Sequence(rows) => Some(rows),
        }
    }

    /// Rows in table order.
    pub fn entries(&self) -> Box<dyn Iterator<Item = RowEntry<'_>> + '_> {
        match self {
            TableRows::Keyed(rows) => Box::new(rows.iter().enumerate().map(|(index, (key, row))| {
                RowEntry {
                    index,
                    key: Some(key),
                    row,
                }
            })),
            TableRows::Sequence(rows) => Box::new(
                rows.iter()
                    .enumerate()
                    .map(|(index, row)| RowEntry { index, key: None, row }),
            ),
        }
    }

    pub fn row(&self, row_ref: &RowRef) -> Option<&Row> {
        match (self, row_ref) {
            (TableRows::Keyed(rows), RowRef::Key(key)) => rows.get(key),
            (TableRows::Sequence(rows), RowRef::Index(index)) => rows.get(*index),
            _ => None,
        }
    }

    pub fn row_mut(&mut self, row_ref: &RowRef) -> Option<&mut Row> {
        match (self, row_ref) {
            (TableRows::Keyed(rows), RowRef::Key(key)) => rows.get_mut(key),
            (TableRows::Sequence(rows), RowRef::Index(index)) => rows.get_mut(*index),
            _ => None,
        }
    }

    /// Boolean selector aligned with table order.
    pub fn mask(&self, refs: &[RowRef]) -> Vec<bool> {
        let wanted: HashSet<&RowRef> = refs.iter().collect();
        self.entries()
            .map(|entry| wanted.contains(&entry.row_ref()))
            .collect()
    }

    /// Remove the referenced rows; returns how many were removed.
    pub fn remove_rows(&mut self, refs: &[RowRef]) -> usize {
        match self {
            TableRows::Keyed(rows) => {
                let keys: HashSet<Key> = refs
                    .iter()
                    .filter_map(|row_ref| match row_ref {
                        RowRef::Key(key) => Some(key.clone()),
                        RowRef::Index(_) => None,
                    })
                    .collect();
                rows.remove_all(&keys)
            }
            TableRows::Sequence(rows) => {
                let indices: HashSet<usize> = refs
                    .iter()
                    .filter_map(|row_ref| match row_ref {
                        RowRef::Index(index) => Some(*index),
                        RowRef::Key(_) => None,
                    })
                    .collect();
                let before = rows.len();
                let mut position = 0;
                rows.retain(|_| {
                    let keep = !indices.contains(&position);
                    position += 1;
                    keep
                });
                before - rows.len()
            }
        }
    }
}

/// Where a field's value lives for a given table.
#[derive(Debug, Clone)]
pub enum FieldReader {
    /// Position within the primary key.
    Key(usize),
    /// Name within the row.
    Row(String),
}

impl FieldReader {
    pub fn read<'a>(&self, entry: &RowEntry<'a>) -> &'a Value {
        match self {
            FieldReader::Key(position) => entry
                .key
                .and_then(|key| key.values().get(*position))
                .unwrap_or(&NULL),
            FieldReader::Row(field) => entry.row.get(field).unwrap_or(&NULL),
        }
    }
}

/// In-memory realization of a schema: one collection of rows per table.
///
/// Keyed tables store data fields only; the key carries the primary-key
/// fields. Tables without a primary key store complete rows in order.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    tables: BTreeMap<String, TableRows>,
    frozen: bool,
}

impl DataSet {
    /// Empty tables for every table of the schema. Freezes the schema.
    pub fn new(schema: &Schema) -> Self {
        schema.freeze();
        let tables = schema
            .table_names()
            .into_iter()
            .map(|table| {
                let keyed = schema
                    .primary_key_fields(table)
                    .map(|pk| !pk.is_empty())
                    .unwrap_or(false);
                let rows = if keyed {
                    TableRows::Keyed(KeyedRows::default())
                } else {
                    TableRows::Sequence(Vec::new())
                };
                (table.to_string(), rows)
            })
            .collect();
        Self {
            tables,
            frozen: false,
        }
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn table(&self, table: &str) -> Result<&TableRows> {
        self.tables
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }

    pub fn table_mut(&mut self, table: &str) -> Result<&mut TableRows> {
        if self.frozen {
            return Err(Error::FrozenData);
        }
        self.tables
            .get_mut(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }

    /// Add a complete row (primary-key and data fields by name).
    ///
    /// Missing data fields take their defaults and unknown fields are
    /// dropped; a missing primary-key field is a structural error. A row
    /// whose key already exists replaces the earlier one.
    pub fn add_row(&mut self, schema: &Schema, table: &str, row: Row) -> Result<Option<Row>> {
        let (key, row) = conform_row(schema, table, row)?;
        match (self.table_mut(table)?, key) {
            (TableRows::Keyed(rows), Some(key)) => Ok(rows.insert(key, row)),
            (TableRows::Sequence(rows), None) => {
                rows.push(row);
                Ok(None)
            }
            _ => Err(Error::Structure(format!(
                "row shape does not match the storage of table {table}"
            ))),
        }
    }

    /// Insert a row into a keyed table from its key and data fields.
    pub fn insert(
        &mut self,
        schema: &Schema,
        table: &str,
        key: Key,
        data: Row,
    ) -> Result<Option<Row>> {
        let primary_key = schema.primary_key_fields(table)?;
        if primary_key.is_empty() || primary_key.len() != key.len() {
            return Err(Error::Structure(format!(
                "table {table} expects a key of {} field(s), got {}",
                primary_key.len(),
                key.len()
            )));
        }
        let mut row = data;
        for (field, value) in primary_key.iter().zip(key.into_values()) {
            row.set(field.clone(), value);
        }
        self.add_row(schema, table, row)
    }

    /// Make every table immutable. Further mutation fails with
    /// [`Error::FrozenData`].
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Deep copy that can be mutated again.
    pub fn to_mutable(&self) -> Self {
        Self {
            tables: self.tables.clone(),
            frozen: false,
        }
    }

    /// Resolve where `field` is stored for `table`.
    pub fn field_reader(schema: &Schema, table: &str, field: &str) -> Result<FieldReader> {
        let primary_key = schema.primary_key_fields(table)?;
        if let Some(position) = primary_key.iter().position(|f| f == field) {
            return Ok(FieldReader::Key(position));
        }
        if schema.data_fields(table)?.iter().any(|f| f == field) || schema.is_generic(table)? {
            return Ok(FieldReader::Row(field.to_string()));
        }
        Err(Error::UnknownField {
            table: table.to_string(),
            field: field.to_string(),
        })
    }

    /// The row with its primary-key fields folded back in.
    pub fn full_row(primary_key: &[String], entry: &RowEntry<'_>) -> Row {
        let mut row = entry.row.clone();
        if let Some(key) = entry.key {
            for (field, value) in primary_key.iter().zip(key.values()) {
                row.set(field.clone(), value.clone());
            }
        }
        row
    }

    /// Every registered parameter's value, defaults filled in.
    pub fn parameters(&self, schema: &Schema) -> Result<BTreeMap<String, Value>> {
        if schema.parameters().is_empty() {
            return Ok(BTreeMap::new());
        }
        let value_field = schema
            .data_fields(PARAMETERS_TABLE)?
            .first()
            .cloned()
            .ok_or_else(|| Error::InvalidSchema("parameters table has no data field".to_string()))?;
        let table = self.table(PARAMETERS_TABLE)?;
        let entries: Vec<(&Value, &Value)> = table
            .entries()
            .filter_map(|entry| {
                let name = entry.key.and_then(|key| key.values().first())?;
                Some((name, entry.row.get(&value_field).unwrap_or(&NULL)))
            })
            .collect();
        Ok(full_parameters(schema.parameters(), entries))
    }

    /// Plain JSON rendering: tables to lists of row objects in field order.
    pub fn to_json(&self, schema: &Schema) -> Result<serde_json::Value> {
        let mut object = serde_json::Map::new();
        for (table, rows) in &self.tables {
            let primary_key = schema.primary_key_fields(table)?;
            let generic = schema.is_generic(table)?;
            let fields = schema.all_fields(table)?;
            let rendered = rows
                .entries()
                .map(|entry| {
                    let row = DataSet::full_row(primary_key, &entry);
                    if generic {
                        serde_json::to_value(&row).map_err(Error::from)
                    } else {
                        Ok(row.to_json(&fields))
                    }
                })
                .collect::<Result<Vec<_>>>()?;
            object.insert(table.clone(), serde_json::Value::Array(rendered));
        }
        Ok(serde_json::Value::Object(object))
    }
}

/// Split a named row into its key and stored fields, applying defaults.
pub(crate) fn conform_row(
    schema: &Schema,
    table: &str,
    mut row: Row,
) -> Result<(Option<Key>, Row)> {
    if schema.is_generic(table)? {
        return Ok((None, row));
    }
    let primary_key = schema.primary_key_fields(table)?;
    let data = schema.data_fields(table)?;

    for field in primary_key {
        if !row.contains(field) {
            return Err(Error::Structure(format!(
                "row in {table} is missing primary key field {field}"
            )));
        }
    }

    let unknown: Vec<String> = row
        .fields()
        .filter(|field| {
            !primary_key.iter().any(|f| f == field) && !data.iter().any(|f| f == field)
        })
        .map(str::to_string)
        .collect();
    if !unknown.is_empty() {
        debug!(table, fields = %unknown.join(", "), "dropping undeclared fields");
        for field in &unknown {
            row.remove(field);
        }
    }

    for field in data {
        if !row.contains(field) {
            let default = schema.default_value(table, field).cloned().unwrap_or(Value::Null);
            row.set(field.clone(), default);
        }
    }

    if primary_key.is_empty() {
        return Ok((None, row));
    }
    let key = Key::new(
        primary_key
            .iter()
            .map(|field| row.remove(field).unwrap_or(Value::Null))
            .collect(),
    );
    Ok((Some(key), row))
}
