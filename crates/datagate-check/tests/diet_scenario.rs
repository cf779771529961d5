use datagate_check::{
    CheckOptions, FieldRef, Replacements, find_data_type_failures, find_foreign_key_failures,
    remove_foreign_key_failures, replace_data_type_failures,
};
use datagate_core::{DataSet, Key, RawData, RowRef, Schema, TableDef, TypeRule, Value};

fn diet_schema() -> Schema {
    let mut schema = Schema::define([
        ("categories", TableDef::fixed(["Name"], ["MinNutrition", "MaxNutrition"])),
        ("foods", TableDef::fixed(["Name"], ["Cost"])),
        ("nutrition_quantities", TableDef::fixed(["Food", "Category"], ["Quantity"])),
    ])
    .expect("define diet schema");
    schema
        .add_foreign_key("nutrition_quantities", "foods", [("Food", "Name")])
        .expect("foods fk");
    schema
        .add_foreign_key("nutrition_quantities", "categories", [("Category", "Name")])
        .expect("categories fk");
    schema
}

fn diet_data(schema: &Schema) -> DataSet {
    let mut raw = RawData::new();
    raw.push_positional("categories", [Value::from("calories"), 1800.into(), 2200.into()]);
    raw.push_positional("foods", [Value::from("burger"), 2.49.into()]);
    raw.push_positional(
        "nutrition_quantities",
        [Value::from("burger"), "fries".into(), 410.into()],
    );
    DataSet::from_raw(schema, &raw).expect("load diet data")
}

#[test]
fn missing_category_is_the_only_foreign_key_failure() {
    let schema = diet_schema();
    let data = diet_data(&schema);

    let failures =
        find_foreign_key_failures(&schema, &data, &CheckOptions::default()).expect("fk pass");
    assert_eq!(failures.len(), 1);

    let (key, orphans) = failures.iter().next().expect("one failing key");
    assert_eq!(key.native_table, "nutrition_quantities");
    assert_eq!(key.foreign_table, "categories");
    assert_eq!(
        orphans.refs(),
        vec![RowRef::Key(Key::new(vec!["burger".into(), "fries".into()]))]
    );
}

#[test]
fn removing_orphans_leaves_consistent_data() {
    let schema = diet_schema();
    let mut data = diet_data(&schema);

    let removed = remove_foreign_key_failures(&schema, &mut data, true).expect("remove orphans");
    assert_eq!(removed.get("nutrition_quantities"), Some(&1));
    assert!(find_foreign_key_failures(&schema, &data, &CheckOptions::default())
        .expect("fk pass")
        .is_empty());
}

#[test]
fn untouched_default_replaces_failures_with_zero() {
    let mut schema = diet_schema();
    schema
        .set_data_type(
            "foods",
            "Cost",
            Some(TypeRule::builder().max(100.0).build().expect("cost rule")),
        )
        .expect("set type");

    let mut data = DataSet::new(&schema);
    data.insert(
        &schema,
        "foods",
        Key::scalar("caviar"),
        [("Cost", 250.0)].into_iter().collect(),
    )
    .expect("insert");

    let options = CheckOptions::default();
    let failures = find_data_type_failures(&schema, &data, &options).expect("type pass");
    assert_eq!(failures[&FieldRef::new("foods", "Cost")].len(), 1);

    let changed =
        replace_data_type_failures(&schema, &mut data, &Replacements::new()).expect("replace");
    assert_eq!(changed, 1);
    let foods = data.table("foods").expect("foods").as_keyed().expect("keyed");
    assert_eq!(
        foods.get(&Key::scalar("caviar")).and_then(|row| row.get("Cost")),
        Some(&Value::Int(0))
    );

    assert_eq!(
        replace_data_type_failures(&schema, &mut data, &Replacements::new()).expect("replace"),
        0
    );
    assert!(find_data_type_failures(&schema, &data, &options)
        .expect("type pass")
        .is_empty());
}
