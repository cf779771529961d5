use std::collections::HashMap;

use datagate_core::{Key, RawData, Schema};
use tracing::debug;

use crate::errors::Result;
use crate::model::{DuplicateKey, DuplicateReport};

/// Primary keys occurring more than once in the raw (pre-collapse) rows.
///
/// One counting pass per keyed table. Keys are reported in first-seen order
/// with their true multiplicity; `max_failures` caps the keys per table.
pub fn find_duplicates(
    schema: &Schema,
    raw: &RawData,
    max_failures: Option<usize>,
) -> Result<DuplicateReport> {
    raw.check_tables(schema)?;
    let mut report = DuplicateReport::new();

    for table in schema.table_names() {
        let primary_key = schema.primary_key_fields(table)?;
        if primary_key.is_empty() {
            continue;
        }

        let mut counts: HashMap<Key, usize> = HashMap::new();
        let mut first_seen: Vec<Key> = Vec::new();
        for row in raw.named_rows(schema, table)? {
            let key = Key::new(row.project(primary_key));
            let count = counts.entry(key.clone()).or_insert(0);
            if *count == 0 {
                first_seen.push(key);
            }
            *count += 1;
        }

        let duplicates: Vec<DuplicateKey> = first_seen
            .into_iter()
            .filter_map(|key| {
                let count = counts.get(&key).copied().unwrap_or(0);
                (count > 1).then_some(DuplicateKey { key, count })
            })
            .take(max_failures.unwrap_or(usize::MAX))
            .collect();

        if !duplicates.is_empty() {
            debug!(table, keys = duplicates.len(), "duplicate primary keys");
            report.insert(table.to_string(), duplicates);
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use datagate_core::{Row, TableDef, Value};

    use super::*;

    #[test]
    fn counts_compound_keys_and_skips_keyless_tables() {
        let schema = Schema::define([
            ("quantities", TableDef::fixed(["Food", "Category"], ["Quantity"])),
            ("log", TableDef::fixed(Vec::<String>::new(), ["Entry"])),
        ])
        .unwrap();

        let mut raw = RawData::new();
        raw.push_positional("quantities", [Value::from("burger"), "fat".into(), 10.into()]);
        raw.push_positional("quantities", [Value::from("burger"), "salt".into(), 10.into()]);
        raw.push_positional("quantities", [Value::from("burger"), "fat".into(), 12.into()]);
        raw.push_named("quantities", Row::from_iter([("Food", "burger"), ("Category", "fat")]));
        raw.push_positional("log", [Value::from("a")]);
        raw.push_positional("log", [Value::from("a")]);

        let report = find_duplicates(&schema, &raw, None).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(
            report["quantities"],
            vec![DuplicateKey {
                key: Key::new(vec!["burger".into(), "fat".into()]),
                count: 3,
            }]
        );
    }

    #[test]
    fn integral_floats_collide_with_integers() {
        let schema = Schema::define([("items", TableDef::fixed(["Id"], ["Label"]))]).unwrap();
        let mut raw = RawData::new();
        raw.push_positional("items", [Value::Int(1), "a".into()]);
        raw.push_positional("items", [Value::Float(1.0), "b".into()]);

        let report = find_duplicates(&schema, &raw, None).unwrap();
        assert_eq!(report["items"][0].count, 2);
    }
}
