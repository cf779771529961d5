use std::collections::HashMap;

use datagate_check::find_duplicates;
use datagate_core::{DataSet, Key, RawData, Schema, TableDef, Value};
use proptest::prelude::*;

fn schema() -> Schema {
    Schema::define([("items", TableDef::fixed(["Group", "Id"], ["Weight"]))])
        .expect("define schema")
}

fn raw_from(keys: &[(u8, u8)]) -> RawData {
    let mut raw = RawData::new();
    for (group, id) in keys {
        raw.push_positional(
            "items",
            [Value::from(i64::from(*group)), Value::from(i64::from(*id)), Value::from(1.5)],
        );
    }
    raw
}

proptest! {
    #[test]
    fn reports_exactly_the_repeated_keys(keys in prop::collection::vec((0u8..4, 0u8..4), 0..40)) {
        let schema = schema();
        let report = find_duplicates(&schema, &raw_from(&keys), None).expect("duplicates");

        let mut expected: HashMap<Key, usize> = HashMap::new();
        for (group, id) in &keys {
            let key = Key::new(vec![Value::from(i64::from(*group)), Value::from(i64::from(*id))]);
            *expected.entry(key).or_insert(0) += 1;
        }
        expected.retain(|_, count| *count > 1);

        let found: HashMap<Key, usize> = report
            .get("items")
            .map(|keys| keys.iter().map(|d| (d.key.clone(), d.count)).collect())
            .unwrap_or_default();
        prop_assert_eq!(found, expected);
    }

    #[test]
    fn unique_rows_load_without_loss(ids in prop::collection::btree_set(0u8..=255, 0..50)) {
        let schema = schema();
        let keys: Vec<(u8, u8)> = ids.iter().map(|id| (0, *id)).collect();
        let raw = raw_from(&keys);

        let report = find_duplicates(&schema, &raw, None).expect("duplicates");
        prop_assert!(report.is_empty());

        let data = DataSet::from_raw(&schema, &raw).expect("load");
        prop_assert_eq!(data.table("items").expect("items").len(), keys.len());
    }
}
