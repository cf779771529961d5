use std::collections::HashMap;

use datagate_core::predicates::maker_identity;
use datagate_core::{
    DataSet, FailureResponse, Kwargs, KwargsMaker, PredicateError, RowPredicate, Schema, Verdict,
};
use tracing::{debug, warn};

use crate::errors::{CheckError, Result};
use crate::model::{
    CheckOptions, ExceptionHandling, FailedRow, FailureBudget, FailureMap, Failures, PredicateRef,
};

/// Kwargs computed at most once per maker within one pass.
struct KwargsCache<'a> {
    data: &'a DataSet,
    computed: HashMap<usize, std::result::Result<Kwargs, PredicateError>>,
}

impl<'a> KwargsCache<'a> {
    fn new(data: &'a DataSet) -> Self {
        Self {
            data,
            computed: HashMap::new(),
        }
    }

    fn get(&mut self, maker: &KwargsMaker) -> &std::result::Result<Kwargs, PredicateError> {
        let data = self.data;
        self.computed
            .entry(maker_identity(maker))
            .or_insert_with(|| maker(data))
    }
}

/// Rows rejected by the registered row predicates of every table.
///
/// Kwargs makers run once per pass and are shared between predicates that
/// hold the same maker. A failing maker flags every row of its predicates.
pub fn find_data_row_failures(
    schema: &Schema,
    data: &DataSet,
    options: &CheckOptions,
) -> Result<FailureMap<PredicateRef>> {
    let handling = options.exception_handling.resolve();
    let no_kwargs = Kwargs::new();
    let mut cache = KwargsCache::new(data);
    let mut failures = FailureMap::default();

    for table in schema.table_names() {
        if schema.is_generic(table)? {
            continue;
        }
        let predicates = schema.row_predicates(table)?;
        if predicates.is_empty() {
            continue;
        }
        let rows = data.table(table)?;
        let primary_key = schema.primary_key_fields(table)?;

        for (name, predicate) in predicates {
            let kwargs = match predicate.kwargs_maker() {
                Some(maker) => match cache.get(maker) {
                    Ok(kwargs) => Ok(kwargs),
                    Err(err) => Err(format!("kwargs maker failed: {err}")),
                },
                None => Ok(&no_kwargs),
            };

            let mut budget = FailureBudget::new(options.max_failures);
            let mut failed = Vec::new();
            let mut truncated = false;

            for entry in rows.entries() {
                if budget.exhausted() {
                    truncated = true;
                    break;
                }
                let message = match &kwargs {
                    Ok(kwargs) => {
                        let row = DataSet::full_row(primary_key, &entry);
                        match evaluate(&predicate, &row, kwargs, handling) {
                            Ok(None) => continue,
                            Ok(Some(message)) => message,
                            Err(source) => {
                                return Err(CheckError::Predicate {
                                    table: table.to_string(),
                                    predicate: name.clone(),
                                    source,
                                });
                            }
                        }
                    }
                    Err(message) => Some(message.clone()),
                };
                budget.record();
                failed.push(FailedRow {
                    row: entry.row_ref(),
                    message,
                });
            }

            if let Err(message) = &kwargs {
                warn!(table, predicate = %name, "{message}");
            }
            if failed.is_empty() {
                continue;
            }
            debug!(
                table,
                predicate = %name,
                failures = failed.len(),
                truncated,
                "row predicate failures"
            );
            failures.insert(
                PredicateRef::new(table, name),
                Failures::collect(rows, primary_key, failed, options.as_table, truncated),
            );
        }
    }

    Ok(failures)
}

/// `Ok(None)` when the row passes, `Ok(Some(message))` when it fails.
fn evaluate(
    predicate: &RowPredicate,
    row: &datagate_core::Row,
    kwargs: &Kwargs,
    handling: ExceptionHandling,
) -> std::result::Result<Option<Option<String>>, PredicateError> {
    match predicate.evaluate(row, kwargs) {
        Ok(Verdict::Valid) => Ok(None),
        Ok(Verdict::Invalid(message)) => Ok(Some(match predicate.response() {
            FailureResponse::ErrorMessage => message,
            FailureResponse::Boolean => None,
        })),
        Err(err) if handling == ExceptionHandling::AsFailure => Ok(Some(Some(err.to_string()))),
        Err(err) => Err(err),
    }
}
