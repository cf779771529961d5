use std::collections::{BTreeMap, HashMap};

use datagate_core::{DataSet, Key, RowRef, Schema, TableRows, Value};
use tracing::{debug, info};

use crate::errors::{CheckError, Result};
use crate::foreign::find_foreign_key_failures;
use crate::model::{CheckOptions, FieldRef, Selection};
use crate::types::find_data_type_failures;

fn full_scan() -> CheckOptions {
    CheckOptions {
        as_table: Selection::Mask,
        ..CheckOptions::default()
    }
}

/// Explicit replacement values, keyed by field.
pub type Replacements = BTreeMap<FieldRef, Value>;

fn check_replacements(schema: &Schema, replacements: &Replacements) -> Result<()> {
    for (target, value) in replacements {
        let is_key = schema.is_primary_key_field(&target.table, &target.field)?;
        if !is_key && !schema.data_fields(&target.table)?.contains(&target.field) {
            return Err(CheckError::Core(datagate_core::Error::UnknownField {
                table: target.table.clone(),
                field: target.field.clone(),
            }));
        }
        let valid = match schema.data_type(&target.table, &target.field) {
            Some(rule) => rule.valid_data(value),
            None => !is_key || !value.is_null(),
        };
        if !valid {
            return Err(CheckError::Remediation(format!(
                "replacement {value} is not valid for {target}"
            )));
        }
    }
    Ok(())
}

/// Overwrite every cell that fails its type rule.
///
/// Data fields take the explicit replacement or the field default, and
/// either must satisfy the field's rule. Primary key fields are only
/// replaced when a replacement is given, and only when the new keys stay
/// unique. Nothing is modified when a check fails. Returns
/// the number of cells whose value changed.
pub fn replace_data_type_failures(
    schema: &Schema,
    data: &mut DataSet,
    replacements: &Replacements,
) -> Result<usize> {
    check_replacements(schema, replacements)?;
    let failures = find_data_type_failures(schema, data, &full_scan())?;

    let mut cells: Vec<(String, RowRef, String, Value)> = Vec::new();
    let mut key_moves: BTreeMap<String, HashMap<Key, Vec<Value>>> = BTreeMap::new();

    for (target, failed) in failures.iter() {
        let FieldRef { table, field } = target;
        let key_position = schema
            .primary_key_fields(table)?
            .iter()
            .position(|f| f == field);

        let replacement = match (replacements.get(target), key_position) {
            (Some(value), _) => value.clone(),
            (None, Some(_)) => {
                debug!(
                    table = %table,
                    field = %field,
                    "primary key failures need an explicit replacement"
                );
                continue;
            }
            (None, None) => {
                let default = schema.default_value(table, field).cloned().unwrap_or(Value::Null);
                let valid = schema
                    .data_type(table, field)
                    .is_none_or(|rule| rule.valid_data(&default));
                if !valid {
                    return Err(CheckError::Remediation(format!(
                        "default {default} is not valid for {target}; give an explicit replacement"
                    )));
                }
                default
            }
        };

        for row_ref in failed.refs() {
            match (key_position, &row_ref) {
                (Some(position), RowRef::Key(key)) => {
                    let moves = key_moves.entry(table.clone()).or_default();
                    let values = moves
                        .entry(key.clone())
                        .or_insert_with(|| key.values().to_vec());
                    values[position] = replacement.clone();
                }
                _ => cells.push((table.clone(), row_ref, field.clone(), replacement.clone())),
            }
        }
    }

    let mut rekeys: Vec<(String, HashMap<Key, Key>)> = Vec::new();
    for (table, moves) in key_moves {
        let moves: HashMap<Key, Key> = moves
            .into_iter()
            .map(|(old, values)| (old, Key::new(values)))
            .collect();
        let mut trial = match data.table(&table)? {
            TableRows::Keyed(rows) => rows.clone(),
            TableRows::Sequence(_) => continue,
        };
        if !trial.rekey(&moves) {
            return Err(CheckError::Remediation(format!(
                "replacing primary key values in {table} would create duplicate keys"
            )));
        }
        rekeys.push((table, moves));
    }

    let mut changed = 0;
    for (table, row_ref, field, value) in cells {
        if let Some(row) = data.table_mut(&table)?.row_mut(&row_ref) {
            if row.get(&field) != Some(&value) {
                row.set(field, value);
                changed += 1;
            }
        }
    }
    for (table, moves) in rekeys {
        for (old, new) in &moves {
            changed += old
                .values()
                .iter()
                .zip(new.values())
                .filter(|(before, after)| before != after)
                .count();
        }
        if let TableRows::Keyed(rows) = data.table_mut(&table)? {
            rows.rekey(&moves);
        }
    }

    info!(cells = changed, "replaced data type failures");
    Ok(changed)
}

/// Delete native rows that fail their foreign keys.
///
/// With `propagate`, deletion repeats until no failures remain, so rows
/// orphaned by an earlier round are removed too. Returns rows removed per
/// table.
pub fn remove_foreign_key_failures(
    schema: &Schema,
    data: &mut DataSet,
    propagate: bool,
) -> Result<BTreeMap<String, usize>> {
    let mut removed: BTreeMap<String, usize> = BTreeMap::new();
    let mut round = 0;

    loop {
        let failures = find_foreign_key_failures(schema, data, &full_scan())?;
        if failures.is_empty() {
            break;
        }
        round += 1;

        let mut doomed: BTreeMap<String, Vec<RowRef>> = BTreeMap::new();
        for (key, failed) in failures.iter() {
            doomed
                .entry(key.native_table.clone())
                .or_default()
                .extend(failed.refs());
        }

        let mut removed_this_round = 0;
        for (table, refs) in doomed {
            let count = data.table_mut(&table)?.remove_rows(&refs);
            removed_this_round += count;
            *removed.entry(table).or_insert(0) += count;
        }
        debug!(round, rows = removed_this_round, "removed foreign key failures");

        if !propagate || removed_this_round == 0 {
            break;
        }
    }

    removed.retain(|_, count| *count > 0);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use datagate_core::{Row, TableDef, TypeRule};

    use super::*;

    fn priced() -> (Schema, DataSet) {
        let mut schema = Schema::define([("foods", TableDef::fixed(["Name"], ["Cost", "Grade"]))])
            .unwrap();
        schema
            .set_data_type("foods", "Cost", Some(TypeRule::builder().build().unwrap()))
            .unwrap();
        schema
            .set_data_type(
                "foods",
                "Grade",
                Some(TypeRule::strings(["A", "B"]).build().unwrap()),
            )
            .unwrap();
        schema.set_default_value("foods", "Grade", "B").unwrap();
        let mut data = DataSet::new(&schema);
        let rows = [("burger", -1.0, "A"), ("fries", 2.0, "Z"), ("shake", -3.0, "Q")];
        for (name, cost, grade) in rows {
            data.insert(
                &schema,
                "foods",
                Key::scalar(name),
                Row::from_iter([("Cost", Value::from(cost)), ("Grade", Value::from(grade))]),
            )
            .unwrap();
        }
        (schema, data)
    }

    #[test]
    fn defaults_and_replacements_fill_failing_cells() {
        let (schema, mut data) = priced();
        let replacements =
            Replacements::from([(FieldRef::new("foods", "Grade"), Value::from("A"))]);

        let changed = replace_data_type_failures(&schema, &mut data, &replacements).unwrap();
        assert_eq!(changed, 4);

        let foods = data.table("foods").unwrap().as_keyed().unwrap();
        assert_eq!(foods.get(&Key::scalar("burger")).unwrap().get("Cost"), Some(&Value::Int(0)));
        assert_eq!(foods.get(&Key::scalar("fries")).unwrap().get("Grade"), Some(&Value::from("A")));
        assert_eq!(replace_data_type_failures(&schema, &mut data, &replacements).unwrap(), 0);
    }

    #[test]
    fn invalid_replacements_are_refused() {
        let (schema, mut data) = priced();
        let replacements = Replacements::from([(FieldRef::new("foods", "Cost"), Value::Int(-5))]);
        assert!(matches!(
            replace_data_type_failures(&schema, &mut data, &replacements),
            Err(CheckError::Remediation(_))
        ));
        let foods = data.table("foods").unwrap().as_keyed().unwrap();
        let burger = foods.get(&Key::scalar("burger")).unwrap();
        assert_eq!(burger.get("Cost"), Some(&Value::Float(-1.0)));
    }

    #[test]
    fn defaults_that_fail_the_rule_are_refused() {
        let mut schema =
            Schema::define([("foods", TableDef::fixed(["Name"], ["Grade"]))]).unwrap();
        schema
            .set_data_type(
                "foods",
                "Grade",
                Some(TypeRule::strings(["A", "B"]).build().unwrap()),
            )
            .unwrap();
        let mut data = DataSet::new(&schema);
        data.insert(&schema, "foods", Key::scalar("burger"), Row::from_iter([("Grade", "Z")]))
            .unwrap();

        let err = replace_data_type_failures(&schema, &mut data, &Replacements::new())
            .expect_err("default 0 is not a grade");
        assert!(err.to_string().contains("foods.Grade"));
        let foods = data.table("foods").unwrap().as_keyed().unwrap();
        let burger = foods.get(&Key::scalar("burger")).unwrap();
        assert_eq!(burger.get("Grade"), Some(&Value::from("Z")));

        let replacements =
            Replacements::from([(FieldRef::new("foods", "Grade"), Value::from("A"))]);
        assert_eq!(replace_data_type_failures(&schema, &mut data, &replacements).unwrap(), 1);
        let options = CheckOptions::default();
        assert!(find_data_type_failures(&schema, &data, &options).unwrap().is_empty());
    }

    #[test]
    fn primary_keys_are_replaced_only_on_request() {
        let mut schema =
            Schema::define([("codes", TableDef::fixed(["Code"], ["Label"]))]).unwrap();
        schema
            .set_data_type(
                "codes",
                "Code",
                Some(TypeRule::builder().must_be_int(true).build().unwrap()),
            )
            .unwrap();
        let mut data = DataSet::new(&schema);
        for code in [Value::Int(1), Value::Float(2.5), Value::Float(3.5)] {
            data.insert(&schema, "codes", Key::new(vec![code]), Row::new()).unwrap();
        }

        let untouched = replace_data_type_failures(&schema, &mut data, &Replacements::new());
        assert_eq!(untouched.unwrap(), 0);

        let colliding = Replacements::from([(FieldRef::new("codes", "Code"), Value::Int(9))]);
        assert!(matches!(
            replace_data_type_failures(&schema, &mut data, &colliding),
            Err(CheckError::Remediation(_))
        ));
        assert_eq!(data.table("codes").unwrap().len(), 3);
    }

    #[test]
    fn frozen_data_cannot_be_remediated() {
        let (schema, mut data) = priced();
        data.freeze();
        assert!(replace_data_type_failures(&schema, &mut data, &Replacements::new()).is_err());
    }
}
