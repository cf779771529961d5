use std::collections::HashSet;

use datagate_core::{DataSet, FieldReader, ForeignKey, RowEntry, Schema, Value};
use tracing::debug;

use crate::errors::Result;
use crate::model::{
    CheckOptions, FailedRow, FailureBudget, FailureMap, Failures, ForeignKeyRef, Verbosity,
};

fn readers<'a, I>(schema: &Schema, table: &str, fields: I) -> Result<Vec<FieldReader>>
where
    I: IntoIterator<Item = &'a str>,
{
    fields
        .into_iter()
        .map(|field| DataSet::field_reader(schema, table, field).map_err(Into::into))
        .collect()
}

fn project(readers: &[FieldReader], entry: &RowEntry<'_>) -> Vec<Value> {
    readers.iter().map(|reader| reader.read(entry).clone()).collect()
}

pub(crate) fn failure_key(fk: &ForeignKey, verbosity: Verbosity) -> ForeignKeyRef {
    ForeignKeyRef {
        native_table: fk.native_table.clone(),
        foreign_table: fk.foreign_table.clone(),
        mapping: fk.mappings.clone(),
        cardinality: match verbosity {
            Verbosity::High => Some(fk.cardinality),
            Verbosity::Low => None,
        },
    }
}

/// Native rows whose mapped values match no row of the foreign table.
///
/// A left outer hash join per foreign key: the foreign side is reduced to the
/// distinct projections of its mapped fields, then every native row probes it.
pub fn find_foreign_key_failures(
    schema: &Schema,
    data: &DataSet,
    options: &CheckOptions,
) -> Result<FailureMap<ForeignKeyRef>> {
    let mut failures = FailureMap::default();

    for fk in schema.foreign_keys() {
        let native_rows = data.table(&fk.native_table)?;
        let foreign_rows = data.table(&fk.foreign_table)?;
        let native_readers = readers(schema, &fk.native_table, fk.native_fields())?;
        let foreign_readers = readers(schema, &fk.foreign_table, fk.foreign_fields())?;

        let targets: HashSet<Vec<Value>> = foreign_rows
            .entries()
            .map(|entry| project(&foreign_readers, &entry))
            .collect();

        let mut budget = FailureBudget::new(options.max_failures);
        let mut failed = Vec::new();
        let mut truncated = false;

        for entry in native_rows.entries() {
            if budget.exhausted() {
                truncated = true;
                break;
            }
            if !targets.contains(&project(&native_readers, &entry)) {
                budget.record();
                failed.push(FailedRow {
                    row: entry.row_ref(),
                    message: None,
                });
            }
        }

        if failed.is_empty() {
            continue;
        }
        debug!(
            native = %fk.native_table,
            foreign = %fk.foreign_table,
            failures = failed.len(),
            truncated,
            "foreign key failures"
        );
        let primary_key = schema.primary_key_fields(&fk.native_table)?;
        failures.insert(
            failure_key(fk, options.verbosity),
            Failures::collect(native_rows, primary_key, failed, options.as_table, truncated),
        );
    }

    Ok(failures)
}

#[cfg(test)]
mod tests {
    use datagate_core::{Key, Multiplicity, Row, RowRef, TableDef};

    use crate::model::{FailureView, Selection};
    use super::*;

    #[test]
    fn sequence_tables_can_reference_keyed_tables() {
        let mut schema = Schema::define([
            ("foods", TableDef::fixed(["Name"], ["Cost"])),
            ("orders", TableDef::fixed(Vec::<String>::new(), ["Food", "Qty"])),
        ])
        .unwrap();
        schema.add_foreign_key("orders", "foods", [("Food", "Name")]).unwrap();

        let mut data = DataSet::new(&schema);
        data.insert(&schema, "foods", Key::scalar("burger"), Row::new()).unwrap();
        for food in ["burger", "pizza", "burger"] {
            data.add_row(&schema, "orders", Row::from_iter([("Food", food)])).unwrap();
        }

        let failures = find_foreign_key_failures(&schema, &data, &CheckOptions::default()).unwrap();
        let (key, orphans) = failures.iter().next().unwrap();
        assert_eq!(orphans.refs(), vec![RowRef::Index(1)]);
        let cardinality = key.cardinality.unwrap();
        assert_eq!(cardinality.native, Multiplicity::Many);
        assert_eq!(cardinality.foreign, Multiplicity::One);

        let low = CheckOptions {
            verbosity: Verbosity::Low,
            ..CheckOptions::default()
        };
        let failures = find_foreign_key_failures(&schema, &data, &low).unwrap();
        assert!(failures.keys().all(|key| key.cardinality.is_none()));
    }

    #[test]
    fn mapped_values_compare_across_numeric_representations() {
        let mut schema = Schema::define([
            ("parents", TableDef::fixed(["Id"], ["Label"])),
            ("children", TableDef::fixed(["Id"], ["Parent"])),
        ])
        .unwrap();
        schema.add_foreign_key("children", "parents", [("Parent", "Id")]).unwrap();

        let mut data = DataSet::new(&schema);
        data.insert(&schema, "parents", Key::scalar(1), Row::new()).unwrap();
        data.insert(&schema, "children", Key::scalar(10), Row::from_iter([("Parent", 1.0)]))
            .unwrap();

        let failures = find_foreign_key_failures(&schema, &data, &CheckOptions::default()).unwrap();
        assert!(failures.is_empty());
    }

    #[test]
    fn max_failures_stops_each_key_early() {
        let mut schema = Schema::define([
            ("foods", TableDef::fixed(["Name"], ["Cost"])),
            ("orders", TableDef::fixed(Vec::<String>::new(), ["Food"])),
        ])
        .unwrap();
        schema.add_foreign_key("orders", "foods", [("Food", "Name")]).unwrap();

        let mut data = DataSet::new(&schema);
        data.insert(&schema, "foods", Key::scalar("burger"), Row::new()).unwrap();
        for food in ["burger", "pizza", "sushi"] {
            data.add_row(&schema, "orders", Row::from_iter([("Food", food)])).unwrap();
        }

        let options = CheckOptions {
            as_table: Selection::Mask,
            max_failures: Some(1),
            ..CheckOptions::default()
        };
        let failures = find_foreign_key_failures(&schema, &data, &options).unwrap();
        let orphans = failures.values().next().unwrap();
        assert_eq!(orphans.len(), 1);
        assert!(orphans.truncated);
        assert_eq!(orphans.refs(), vec![RowRef::Index(1)]);
        assert_eq!(orphans.view, FailureView::Mask(vec![false, true, false]));

        let failures = find_foreign_key_failures(&schema, &data, &CheckOptions::default()).unwrap();
        let orphans = failures.values().next().unwrap();
        assert_eq!(orphans.len(), 2);
        assert!(!orphans.truncated);
    }
}
