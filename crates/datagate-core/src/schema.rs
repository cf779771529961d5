use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::constraints::{Cardinality, FieldMapping, ForeignKey, side_multiplicity};
use crate::error::{Error, Result};
use crate::graph::{FkGraphReport, build_fk_graph_report};
use crate::parameters::{Parameter, parameter_predicate};
use crate::predicates::RowPredicate;
use crate::types::TypeRule;
use crate::value::Value;

/// Reserved name of the key/value parameters table.
pub const PARAMETERS_TABLE: &str = "parameters";

/// Name of the predicate synthesized to enforce parameter rules.
pub const PARAMETER_PREDICATE: &str = "Good Name/Value Check";

/// Marker used for generic tables in layouts and the interchange format.
pub const GENERIC_MARKER: &str = "*";

/// Declared layout of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDef {
    /// Ordered primary-key fields (possibly empty) and ordered data fields.
    Fixed {
        primary_key: Vec<String>,
        data: Vec<String>,
    },
    /// Fields are whatever the data brings; excluded from integrity checks.
    Generic,
}

impl TableDef {
    pub fn fixed<P, D>(primary_key: P, data: D) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        TableDef::Fixed {
            primary_key: primary_key.into_iter().map(Into::into).collect(),
            data: data.into_iter().map(Into::into).collect(),
        }
    }

    pub fn generic() -> Self {
        TableDef::Generic
    }
}

/// Lifecycle of a schema. The only transition is `Configurable → Frozen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    Configurable,
    Frozen,
}

#[derive(Debug, Clone)]
struct TableSpec {
    name: String,
    def: TableDef,
    default_values: BTreeMap<String, Value>,
    data_types: BTreeMap<String, TypeRule>,
    tooltips: BTreeMap<String, String>,
    predicates: Vec<(String, RowPredicate)>,
}

impl TableSpec {
    fn primary_key(&self) -> &[String] {
        match &self.def {
            TableDef::Fixed { primary_key, .. } => primary_key,
            TableDef::Generic => &[],
        }
    }

    fn data(&self) -> &[String] {
        match &self.def {
            TableDef::Fixed { data, .. } => data,
            TableDef::Generic => &[],
        }
    }

    fn has_field(&self, field: &str) -> bool {
        self.primary_key().iter().any(|f| f == field) || self.data().iter().any(|f| f == field)
    }

    fn is_generic(&self) -> bool {
        matches!(self.def, TableDef::Generic)
    }
}

/// Registry of tables, keys, types, defaults, predicates and parameters.
///
/// A schema is configurable until the first [`DataSet`](crate::DataSet) is
/// built from it; after that every configuration call fails with
/// [`Error::Frozen`].
#[derive(Debug)]
pub struct Schema {
    tables: Vec<TableSpec>,
    foreign_keys: Vec<ForeignKey>,
    parameters: BTreeMap<String, Parameter>,
    state: Cell<SchemaState>,
}

impl Schema {
    /// Declare the table layouts. Every data field defaults to `0`.
    pub fn define<I, S>(tables: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, TableDef)>,
        S: Into<String>,
    {
        let mut specs: Vec<TableSpec> = Vec::new();
        let mut seen_tables = BTreeSet::new();

        for (name, def) in tables {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(Error::InvalidSchema("table names cannot be empty".to_string()));
            }
            if !seen_tables.insert(name.to_lowercase()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate table name (case-insensitive): {name}"
                )));
            }

            let mut default_values = BTreeMap::new();
            if let TableDef::Fixed { primary_key, data } = &def {
                validate_fields(&name, primary_key, data)?;
                for field in data {
                    default_values.insert(field.clone(), Value::Int(0));
                }
            }

            specs.push(TableSpec {
                name,
                def,
                default_values,
                data_types: BTreeMap::new(),
                tooltips: BTreeMap::new(),
                predicates: Vec::new(),
            });
        }

        Ok(Self {
            tables: specs,
            foreign_keys: Vec::new(),
            parameters: BTreeMap::new(),
            state: Cell::new(SchemaState::Configurable),
        })
    }

    pub fn state(&self) -> SchemaState {
        self.state.get()
    }

    pub fn is_frozen(&self) -> bool {
        self.state.get() == SchemaState::Frozen
    }

    /// Lock the configuration. Called when data is first built from the schema.
    pub fn freeze(&self) {
        if self.state.get() == SchemaState::Configurable {
            debug!(tables = self.tables.len(), "schema frozen");
            self.state.set(SchemaState::Frozen);
        }
    }

    fn ensure_configurable(&self, operation: &'static str) -> Result<()> {
        match self.state.get() {
            SchemaState::Configurable => Ok(()),
            SchemaState::Frozen => Err(Error::Frozen(operation)),
        }
    }

    fn spec(&self, table: &str) -> Result<&TableSpec> {
        self.tables
            .iter()
            .find(|spec| spec.name == table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }

    fn spec_mut(&mut self, table: &str) -> Result<&mut TableSpec> {
        self.tables
            .iter_mut()
            .find(|spec| spec.name == table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }

    fn fixed_spec(&self, table: &str, operation: &str) -> Result<&TableSpec> {
        let spec = self.spec(table)?;
        if spec.is_generic() {
            return Err(Error::InvalidSchema(format!(
                "{operation} is not supported on generic table {table}"
            )));
        }
        Ok(spec)
    }

    fn ensure_field(&self, table: &str, field: &str, operation: &str) -> Result<()> {
        let spec = self.fixed_spec(table, operation)?;
        if !spec.has_field(field) {
            return Err(Error::UnknownField {
                table: table.to_string(),
                field: field.to_string(),
            });
        }
        Ok(())
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|spec| spec.name.as_str()).collect()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.iter().any(|spec| spec.name == table)
    }

    pub fn table_def(&self, table: &str) -> Result<&TableDef> {
        Ok(&self.spec(table)?.def)
    }

    pub fn is_generic(&self, table: &str) -> Result<bool> {
        Ok(self.spec(table)?.is_generic())
    }

    /// Primary-key fields in declaration order (empty for generic tables).
    pub fn primary_key_fields(&self, table: &str) -> Result<&[String]> {
        Ok(self.spec(table)?.primary_key())
    }

    pub fn data_fields(&self, table: &str) -> Result<&[String]> {
        Ok(self.spec(table)?.data())
    }

    /// Primary-key fields followed by data fields.
    pub fn all_fields(&self, table: &str) -> Result<Vec<String>> {
        let spec = self.spec(table)?;
        Ok(spec
            .primary_key()
            .iter()
            .chain(spec.data().iter())
            .cloned()
            .collect())
    }

    pub fn is_primary_key_field(&self, table: &str, field: &str) -> Result<bool> {
        Ok(self.spec(table)?.primary_key().iter().any(|f| f == field))
    }

    /// Register a foreign key from `native` to `foreign`.
    ///
    /// Several keys between the same pair of tables accumulate. A key closing
    /// a cycle in the foreign-key graph is kept, with a warning.
    pub fn add_foreign_key<I, A, B>(
        &mut self,
        native: &str,
        foreign: &str,
        mappings: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        self.ensure_configurable("add_foreign_key")?;
        let mappings: Vec<FieldMapping> = mappings
            .into_iter()
            .map(|(native_field, foreign_field)| FieldMapping::new(native_field, foreign_field))
            .collect();

        let native_spec = self.fixed_spec(native, "add_foreign_key")?;
        let foreign_spec = self.fixed_spec(foreign, "add_foreign_key")?;

        if mappings.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "foreign key {native} -> {foreign} needs at least one field mapping"
            )));
        }

        let mut native_seen = BTreeSet::new();
        let mut foreign_seen = BTreeSet::new();
        for mapping in &mappings {
            if !native_spec.has_field(&mapping.native_field) {
                return Err(Error::UnknownField {
                    table: native.to_string(),
                    field: mapping.native_field.clone(),
                });
            }
            if !foreign_spec.has_field(&mapping.foreign_field) {
                return Err(Error::UnknownField {
                    table: foreign.to_string(),
                    field: mapping.foreign_field.clone(),
                });
            }
            if !native_seen.insert(mapping.native_field.as_str())
                || !foreign_seen.insert(mapping.foreign_field.as_str())
            {
                return Err(Error::InvalidSchema(format!(
                    "foreign key {native} -> {foreign} maps a field more than once"
                )));
            }
        }

        if self
            .foreign_keys
            .iter()
            .any(|fk| fk.same_mapping(native, foreign, &mappings))
        {
            debug!(native, foreign, "foreign key already registered");
            return Ok(());
        }

        let native_fields: Vec<&str> = mappings.iter().map(|m| m.native_field.as_str()).collect();
        let foreign_fields: Vec<&str> = mappings.iter().map(|m| m.foreign_field.as_str()).collect();
        let cardinality = Cardinality {
            native: side_multiplicity(&native_fields, native_spec.primary_key()),
            foreign: side_multiplicity(&foreign_fields, foreign_spec.primary_key()),
        };

        self.foreign_keys.push(ForeignKey {
            native_table: native.to_string(),
            foreign_table: foreign.to_string(),
            mappings,
            cardinality,
        });

        let report = build_fk_graph_report(self);
        if let Some(cycle) = report.cycle {
            warn!(
                native,
                foreign,
                tables = %cycle.join(", "),
                "foreign key closes a circular reference"
            );
        }

        Ok(())
    }

    /// Drop the foreign keys of one native table, or all of them.
    pub fn clear_foreign_keys(&mut self, native: Option<&str>) -> Result<()> {
        self.ensure_configurable("clear_foreign_keys")?;
        match native {
            Some(table) => {
                self.spec(table)?;
                self.foreign_keys.retain(|fk| fk.native_table != table);
            }
            None => self.foreign_keys.clear(),
        }
        Ok(())
    }

    pub fn foreign_keys(&self) -> &[ForeignKey] {
        &self.foreign_keys
    }

    /// Attach, overwrite or (with `None`) remove the type rule of a field.
    pub fn set_data_type(
        &mut self,
        table: &str,
        field: &str,
        rule: Option<TypeRule>,
    ) -> Result<()> {
        self.ensure_configurable("set_data_type")?;
        self.ensure_field(table, field, "set_data_type")?;
        if let Some(rule) = &rule {
            rule.validate()?;
            if table == PARAMETERS_TABLE
                && !self.parameters.is_empty()
                && self.spec(table)?.data().iter().any(|f| f == field)
            {
                return Err(Error::InvalidSchema(
                    "parameter values are typed per parameter, not per column".to_string(),
                ));
            }
        }
        let spec = self.spec_mut(table)?;
        match rule {
            Some(rule) => {
                spec.data_types.insert(field.to_string(), rule);
            }
            None => {
                spec.data_types.remove(field);
            }
        }
        Ok(())
    }

    pub fn data_type(&self, table: &str, field: &str) -> Option<&TypeRule> {
        self.spec(table).ok()?.data_types.get(field)
    }

    pub fn data_types(&self, table: &str) -> Result<&BTreeMap<String, TypeRule>> {
        Ok(&self.spec(table)?.data_types)
    }

    /// Set the default used for missing data and type-failure replacement.
    pub fn set_default_value(
        &mut self,
        table: &str,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        self.ensure_configurable("set_default_value")?;
        self.ensure_field(table, field, "set_default_value")?;
        let value = value.into();
        if !value.is_default_compatible() {
            return Err(Error::InvalidValue(format!(
                "default for {table}.{field} must be null, a string or a number, got {value}"
            )));
        }
        self.spec_mut(table)?
            .default_values
            .insert(field.to_string(), value);
        Ok(())
    }

    pub fn default_value(&self, table: &str, field: &str) -> Option<&Value> {
        self.spec(table).ok()?.default_values.get(field)
    }

    pub fn default_values(&self, table: &str) -> Result<&BTreeMap<String, Value>> {
        Ok(&self.spec(table)?.default_values)
    }

    pub fn set_tooltip(
        &mut self,
        table: &str,
        field: &str,
        tooltip: impl Into<String>,
    ) -> Result<()> {
        self.ensure_configurable("set_tooltip")?;
        self.ensure_field(table, field, "set_tooltip")?;
        let tooltip = tooltip.into();
        let spec = self.spec_mut(table)?;
        if tooltip.is_empty() {
            spec.tooltips.remove(field);
        } else {
            spec.tooltips.insert(field.to_string(), tooltip);
        }
        Ok(())
    }

    pub fn tooltips(&self, table: &str) -> Result<&BTreeMap<String, String>> {
        Ok(&self.spec(table)?.tooltips)
    }

    /// Register a row predicate, or remove one by passing `None`.
    ///
    /// Without a name, the smallest unused integer (as a string) is chosen.
    /// Returns the name the predicate is registered under.
    pub fn add_data_row_predicate(
        &mut self,
        table: &str,
        name: Option<&str>,
        predicate: Option<RowPredicate>,
    ) -> Result<String> {
        self.ensure_configurable("add_data_row_predicate")?;
        self.fixed_spec(table, "add_data_row_predicate")?;

        let Some(predicate) = predicate else {
            let name = name.ok_or_else(|| {
                Error::InvalidSchema("removing a predicate requires its name".to_string())
            })?;
            self.spec_mut(table)?
                .predicates
                .retain(|(existing, _)| existing != name);
            return Ok(name.to_string());
        };

        if table == PARAMETERS_TABLE && name == Some(PARAMETER_PREDICATE) {
            return Err(Error::InvalidSchema(format!(
                "predicate name '{PARAMETER_PREDICATE}' is reserved"
            )));
        }

        let spec = self.spec_mut(table)?;
        let name = match name {
            Some(name) => name.to_string(),
            None => (0usize..)
                .map(|idx| idx.to_string())
                .find(|candidate| spec.predicates.iter().all(|(existing, _)| existing != candidate))
                .unwrap_or_default(),
        };

        match spec.predicates.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = predicate,
            None => spec.predicates.push((name.clone(), predicate)),
        }
        Ok(name)
    }

    /// Registered predicates of a table, plus the parameter check when the
    /// table is the parameters table and parameters exist.
    pub fn row_predicates(&self, table: &str) -> Result<Vec<(String, RowPredicate)>> {
        let spec = self.spec(table)?;
        let mut predicates = spec.predicates.clone();
        if table == PARAMETERS_TABLE && !self.parameters.is_empty() {
            if let ([key_field], [value_field]) = (spec.primary_key(), spec.data()) {
                predicates.push((
                    PARAMETER_PREDICATE.to_string(),
                    parameter_predicate(key_field, value_field, self.parameters.clone()),
                ));
            }
        }
        Ok(predicates)
    }

    fn parameters_layout(&self) -> Result<(&str, &str)> {
        let spec = self.spec(PARAMETERS_TABLE).map_err(|_| {
            Error::InvalidSchema(format!("parameters require a '{PARAMETERS_TABLE}' table"))
        })?;
        match (spec.primary_key(), spec.data()) {
            ([key], [value]) => Ok((key.as_str(), value.as_str())),
            _ => Err(Error::InvalidSchema(format!(
                "the '{PARAMETERS_TABLE}' table needs exactly one primary-key and one data field"
            ))),
        }
    }

    /// Register a named parameter with its default and optional rule.
    pub fn add_parameter(
        &mut self,
        name: impl Into<String>,
        default: impl Into<Value>,
        rule: Option<TypeRule>,
    ) -> Result<()> {
        self.ensure_configurable("add_parameter")?;
        let (_, value_field) = self.parameters_layout()?;
        if self.data_type(PARAMETERS_TABLE, value_field).is_some() {
            return Err(Error::InvalidSchema(format!(
                "remove the data type on {PARAMETERS_TABLE}.{value_field} before adding parameters"
            )));
        }

        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidSchema("parameter names cannot be empty".to_string()));
        }
        let parameter = Parameter::new(default.into(), rule)?;
        self.parameters.insert(name, parameter);
        Ok(())
    }

    pub fn remove_parameter(&mut self, name: &str) -> Result<()> {
        self.ensure_configurable("remove_parameter")?;
        if self.parameters.remove(name).is_none() {
            return Err(Error::InvalidSchema(format!("unknown parameter: {name}")));
        }
        Ok(())
    }

    pub fn parameters(&self) -> &BTreeMap<String, Parameter> {
        &self.parameters
    }

    /// Deep copy into a new configurable schema, optionally keeping only some
    /// tables. Keys, parameters and per-field settings of dropped tables go too.
    pub fn clone_with(&self, table_restrictions: Option<&[&str]>) -> Result<Self> {
        if let Some(restrictions) = table_restrictions {
            for table in restrictions {
                self.spec(table)?;
            }
        }
        let keep = |table: &str| match table_restrictions {
            Some(restrictions) => restrictions.contains(&table),
            None => true,
        };
        Ok(self.restricted(keep))
    }

    fn restricted(&self, keep: impl Fn(&str) -> bool) -> Self {
        let tables = self
            .tables
            .iter()
            .filter(|spec| keep(&spec.name))
            .cloned()
            .collect();
        let foreign_keys = self
            .foreign_keys
            .iter()
            .filter(|fk| keep(&fk.native_table) && keep(&fk.foreign_table))
            .cloned()
            .collect();
        let parameters = if keep(PARAMETERS_TABLE) {
            self.parameters.clone()
        } else {
            BTreeMap::new()
        };
        Self {
            tables,
            foreign_keys,
            parameters,
            state: Cell::new(SchemaState::Configurable),
        }
    }

    /// Dependency order of tables along foreign keys, or the tables caught
    /// in a cycle.
    pub fn foreign_key_graph(&self) -> FkGraphReport {
        build_fk_graph_report(self)
    }
}

/// A copy is always configurable, even when the source is frozen.
impl Clone for Schema {
    fn clone(&self) -> Self {
        self.restricted(|_| true)
    }
}

fn validate_fields(table: &str, primary_key: &[String], data: &[String]) -> Result<()> {
    if primary_key.is_empty() && data.is_empty() {
        return Err(Error::InvalidSchema(format!("table {table} declares no fields")));
    }
    let mut seen = BTreeSet::new();
    for field in primary_key.iter().chain(data.iter()) {
        if field == GENERIC_MARKER {
            return Err(Error::InvalidSchema(format!(
                "table {table} mixes the generic marker '*' with declared fields"
            )));
        }
        if field.trim().is_empty() {
            return Err(Error::InvalidSchema(format!("table {table} has an empty field name")));
        }
        if !seen.insert(field.to_lowercase()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate field name (case-insensitive) in {table}: {field}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::constraints::Multiplicity;
    use super::*;

    fn diet() -> Schema {
        Schema::define([
            ("categories", TableDef::fixed(["Name"], ["MinNutrition", "MaxNutrition"])),
            ("foods", TableDef::fixed(["Name"], ["Cost"])),
            ("nutrition_quantities", TableDef::fixed(["Food", "Category"], ["Quantity"])),
        ])
        .unwrap()
    }

    #[test]
    fn define_rejects_case_insensitive_collisions() {
        let err = Schema::define([
            ("Foods", TableDef::fixed(["Name"], ["Cost"])),
            ("foods", TableDef::fixed(["Name"], ["Cost"])),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));

        let err = Schema::define([("foods", TableDef::fixed(["Name"], ["name"]))]).unwrap_err();
        assert!(err.to_string().contains("duplicate field"));
    }

    #[test]
    fn define_rejects_empty_and_mixed_generic_tables() {
        let empty: [&str; 0] = [];
        assert!(Schema::define([("t", TableDef::fixed(empty, empty))]).is_err());
        assert!(Schema::define([("t", TableDef::fixed(["*"], ["a"]))]).is_err());
        assert!(Schema::define([("t", TableDef::generic())]).is_ok());
    }

    #[test]
    fn data_fields_default_to_zero() {
        let schema = diet();
        assert_eq!(schema.default_value("foods", "Cost"), Some(&Value::Int(0)));
        assert_eq!(schema.default_value("foods", "Name"), None);
    }

    #[test]
    fn foreign_key_cardinality_is_derived() {
        let mut schema = diet();
        schema
            .add_foreign_key("nutrition_quantities", "foods", [("Food", "Name")])
            .unwrap();
        let fk = &schema.foreign_keys()[0];
        assert_eq!(fk.cardinality.native, Multiplicity::Many);
        assert_eq!(fk.cardinality.foreign, Multiplicity::One);
    }

    #[test]
    fn foreign_keys_validate_fields_and_accumulate() {
        let mut schema = diet();
        assert!(matches!(
            schema.add_foreign_key("nutrition_quantities", "foods", [("Nope", "Name")]),
            Err(Error::UnknownField { .. })
        ));
        assert!(matches!(
            schema.add_foreign_key("nutrition_quantities", "drinks", [("Food", "Name")]),
            Err(Error::UnknownTable(_))
        ));

        schema
            .add_foreign_key("nutrition_quantities", "foods", [("Food", "Name")])
            .unwrap();
        schema
            .add_foreign_key("nutrition_quantities", "foods", [("Food", "Name")])
            .unwrap();
        schema
            .add_foreign_key("nutrition_quantities", "foods", [("Category", "Name")])
            .unwrap();
        assert_eq!(schema.foreign_keys().len(), 2);
    }

    #[test]
    fn cycles_are_accepted() {
        let mut schema = Schema::define([
            ("a", TableDef::fixed(["Id"], ["B"])),
            ("b", TableDef::fixed(["Id"], ["A"])),
        ])
        .unwrap();
        schema.add_foreign_key("a", "b", [("B", "Id")]).unwrap();
        schema.add_foreign_key("b", "a", [("A", "Id")]).unwrap();
        assert!(schema.foreign_key_graph().cycle.is_some());
    }

    #[test]
    fn frozen_schema_rejects_configuration() {
        let mut schema = diet();
        schema.freeze();
        assert!(matches!(
            schema.set_default_value("foods", "Cost", 1),
            Err(Error::Frozen("set_default_value"))
        ));
        assert!(
            schema
                .add_foreign_key("nutrition_quantities", "foods", [("Food", "Name")])
                .is_err()
        );
        assert!(schema.set_data_type("foods", "Cost", None).is_err());
    }

    #[test]
    fn default_values_must_be_plain() {
        let mut schema = diet();
        assert!(schema.set_default_value("foods", "Cost", true).is_err());
        schema.set_default_value("foods", "Cost", Value::Null).unwrap();
        schema.set_default_value("foods", "Cost", "n/a").unwrap();
    }

    #[test]
    fn predicates_get_smallest_free_integer_names() {
        let mut schema = diet();
        let first = schema
            .add_data_row_predicate("foods", None, Some(RowPredicate::from_fn(|_| true)))
            .unwrap();
        let named = schema
            .add_data_row_predicate("foods", Some("1"), Some(RowPredicate::from_fn(|_| true)))
            .unwrap();
        let third = schema
            .add_data_row_predicate("foods", None, Some(RowPredicate::from_fn(|_| true)))
            .unwrap();
        assert_eq!((first.as_str(), named.as_str(), third.as_str()), ("0", "1", "2"));

        schema.add_data_row_predicate("foods", Some("0"), None).unwrap();
        let names: Vec<String> = schema
            .row_predicates("foods")
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn parameters_need_the_parameters_table() {
        let mut schema = diet();
        assert!(schema.add_parameter("Alpha", 1, None).is_err());

        let mut schema = Schema::define([(PARAMETERS_TABLE, TableDef::fixed(["Key"], ["Value"]))])
            .unwrap();
        let rule = TypeRule::builder().max(1.0).inclusive_max(true).build().unwrap();
        assert!(schema.add_parameter("Alpha", 2, Some(rule.clone())).is_err());
        schema.add_parameter("Alpha", 0.5, Some(rule)).unwrap();
        let names: Vec<String> = schema
            .row_predicates(PARAMETERS_TABLE)
            .unwrap()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec![PARAMETER_PREDICATE.to_string()]);
        schema.remove_parameter("Alpha").unwrap();
        assert!(schema.remove_parameter("Alpha").is_err());
    }

    #[test]
    fn clone_with_drops_dangling_references() {
        let mut schema = diet();
        schema
            .add_foreign_key("nutrition_quantities", "foods", [("Food", "Name")])
            .unwrap();
        schema
            .add_foreign_key("nutrition_quantities", "categories", [("Category", "Name")])
            .unwrap();
        schema.freeze();

        let clone = schema
            .clone_with(Some(&["foods", "nutrition_quantities"]))
            .unwrap();
        assert!(!clone.is_frozen());
        assert_eq!(clone.table_names(), vec!["foods", "nutrition_quantities"]);
        assert_eq!(clone.foreign_keys().len(), 1);
        assert_eq!(clone.foreign_keys()[0].foreign_table, "foods");
        assert!(schema.clone_with(Some(&["drinks"])).is_err());
    }
}
