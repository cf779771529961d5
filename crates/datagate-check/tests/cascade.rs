use datagate_check::{CheckOptions, find_foreign_key_failures, remove_foreign_key_failures};
use datagate_core::{DataSet, Key, Row, Schema, TableDef};

const CHAIN: [&str; 4] = ["plants", "regions", "districts", "stores"];

/// stores -> districts -> regions -> plants, each row pointing at the row of
/// the same id one level up.
fn chain() -> (Schema, DataSet) {
    let mut schema = Schema::define(
        CHAIN
            .iter()
            .map(|table| (*table, TableDef::fixed(["Id"], ["Parent"]))),
    )
    .expect("define chain");
    for pair in CHAIN.windows(2) {
        schema
            .add_foreign_key(pair[1], pair[0], [("Parent", "Id")])
            .expect("chain fk");
    }

    let mut data = DataSet::new(&schema);
    for table in CHAIN {
        for id in 0..5i64 {
            data.insert(
                &schema,
                table,
                Key::scalar(id),
                Row::from_iter([("Parent", id)]),
            )
            .expect("insert");
        }
    }
    (schema, data)
}

#[test]
fn deleting_the_root_cascades_through_every_level() {
    let (schema, mut data) = chain();
    let ids: Vec<_> = data
        .table("plants")
        .expect("plants")
        .entries()
        .map(|entry| entry.row_ref())
        .collect();
    data.table_mut("plants").expect("plants").remove_rows(&ids);

    let removed = remove_foreign_key_failures(&schema, &mut data, true).expect("cascade");
    for table in &CHAIN[1..] {
        assert_eq!(removed.get(*table), Some(&5), "table {table}");
        assert!(data.table(table).expect("table").is_empty());
    }

    let again = remove_foreign_key_failures(&schema, &mut data, true).expect("second run");
    assert!(again.is_empty());
}

#[test]
fn single_batch_without_propagation() {
    let (schema, mut data) = chain();
    let first = data
        .table("plants")
        .expect("plants")
        .entries()
        .map(|entry| entry.row_ref())
        .take(1)
        .collect::<Vec<_>>();
    data.table_mut("plants").expect("plants").remove_rows(&first);

    let removed = remove_foreign_key_failures(&schema, &mut data, false).expect("one batch");
    assert_eq!(removed.len(), 1);
    assert_eq!(removed.get("regions"), Some(&1));

    let remaining = find_foreign_key_failures(&schema, &data, &CheckOptions::default())
        .expect("fk pass");
    assert_eq!(remaining.total(), 1);
}
