use datagate_core::{DataSet, Schema, TypeRule, Value};
use tracing::debug;

use crate::errors::Result;
use crate::model::{CheckOptions, FailedRow, FailureBudget, FailureMap, Failures, FieldRef};

/// Domain a field is checked against.
enum Domain<'a> {
    Rule(&'a TypeRule),
    /// Primary-key fields without an explicit rule: anything but null.
    NotNull,
}

impl Domain<'_> {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Domain::Rule(rule) => rule.valid_data(value),
            Domain::NotNull => !value.is_null(),
        }
    }
}

/// Fields with a type rule, plus primary-key fields without one, in
/// declaration order.
fn checked_fields<'a>(schema: &'a Schema, table: &str) -> Result<Vec<(String, Domain<'a>)>> {
    let mut fields = Vec::new();
    for field in schema.all_fields(table)? {
        if let Some(rule) = schema.data_type(table, &field) {
            fields.push((field, Domain::Rule(rule)));
        } else if schema.is_primary_key_field(table, &field)? {
            fields.push((field, Domain::NotNull));
        }
    }
    Ok(fields)
}

/// Rows whose field values fall outside the field's domain.
///
/// Only (table, field) pairs with at least one failure appear in the result.
pub fn find_data_type_failures(
    schema: &Schema,
    data: &DataSet,
    options: &CheckOptions,
) -> Result<FailureMap<FieldRef>> {
    let mut failures = FailureMap::default();

    for table in schema.table_names() {
        if schema.is_generic(table)? {
            continue;
        }
        let rows = data.table(table)?;
        let primary_key = schema.primary_key_fields(table)?;

        for (field, domain) in checked_fields(schema, table)? {
            let reader = DataSet::field_reader(schema, table, &field)?;
            let mut budget = FailureBudget::new(options.max_failures);
            let mut failed = Vec::new();
            let mut truncated = false;

            for entry in rows.entries() {
                if budget.exhausted() {
                    truncated = true;
                    break;
                }
                if !domain.accepts(reader.read(&entry)) {
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
            debug!(table, field = %field, failures = failed.len(), truncated, "data type failures");
            failures.insert(
                FieldRef::new(table, field),
                Failures::collect(rows, primary_key, failed, options.as_table, truncated),
            );
        }
    }

    Ok(failures)
}

#[cfg(test)]
mod tests {
    use datagate_core::{Key, Row, RowRef, TableDef};

    use crate::model::{FailureView, Selection};
    use super::*;

    fn foods() -> (Schema, DataSet) {
        let mut schema = Schema::define([("foods", TableDef::fixed(["Name"], ["Cost"]))]).unwrap();
        schema
            .set_data_type("foods", "Cost", Some(TypeRule::builder().build().unwrap()))
            .unwrap();
        let mut data = DataSet::new(&schema);
        for (name, cost) in [
            (Value::from("burger"), Value::Float(2.49)),
            (Value::from("fries"), Value::Float(-0.01)),
            (Value::Null, Value::Int(0)),
            (Value::from("shake"), Value::Float(f64::INFINITY)),
        ] {
            data.insert(&schema, "foods", Key::new(vec![name]), Row::from_iter([("Cost", cost)]))
                .unwrap();
        }
        (schema, data)
    }

    #[test]
    fn flags_out_of_range_values_and_null_keys() {
        let (schema, data) = foods();
        let failures = find_data_type_failures(&schema, &data, &CheckOptions::default()).unwrap();

        let cost = &failures[&FieldRef::new("foods", "Cost")];
        assert_eq!(
            cost.refs(),
            vec![
                RowRef::Key(Key::scalar("fries")),
                RowRef::Key(Key::scalar("shake"))
            ]
        );
        let FailureView::Table(rows) = &cost.view else {
            panic!("expected table view");
        };
        assert_eq!(rows[0].get("Name"), Some(&Value::from("fries")));

        let name = &failures[&FieldRef::new("foods", "Name")];
        assert_eq!(name.refs(), vec![RowRef::Key(Key::new(vec![Value::Null]))]);
    }

    #[test]
    fn masks_align_with_table_order() {
        let (schema, data) = foods();
        let options = CheckOptions {
            as_table: Selection::Mask,
            ..CheckOptions::default()
        };
        let failures = find_data_type_failures(&schema, &data, &options).unwrap();
        assert_eq!(
            failures[&FieldRef::new("foods", "Cost")].view,
            FailureView::Mask(vec![false, true, false, true])
        );
    }

    #[test]
    fn max_failures_truncates_each_field() {
        let (schema, data) = foods();
        let options = CheckOptions {
            max_failures: Some(1),
            ..CheckOptions::default()
        };
        let failures = find_data_type_failures(&schema, &data, &options).unwrap();
        let cost = &failures[&FieldRef::new("foods", "Cost")];
        assert_eq!(cost.len(), 1);
        assert!(cost.truncated);
        assert_eq!(failures[&FieldRef::new("foods", "Name")].len(), 1);
    }
}
