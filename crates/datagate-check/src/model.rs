use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Deref;

use datagate_core::{Cardinality, DataSet, FieldMapping, Key, Row, RowRef, TableRows};
use serde::{Deserialize, Serialize, Serializer};

/// How failing rows are handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// The failing rows themselves, primary-key fields included.
    #[default]
    Table,
    /// One flag per row of the table, in table order.
    Mask,
}

/// Level of detail in foreign-key failure keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Include the derived cardinality.
    #[default]
    High,
    /// Tables and mapping only.
    Low,
}

/// What to do when a row predicate raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionHandling {
    /// Abort the pass with the error.
    Propagate,
    /// Record the row as failing, with the error text as its message.
    AsFailure,
    /// `Propagate` in debug builds, `AsFailure` in release builds.
    #[default]
    Debug,
}

impl ExceptionHandling {
    pub fn resolve(self) -> ExceptionHandling {
        match self {
            ExceptionHandling::Debug if cfg!(debug_assertions) => ExceptionHandling::Propagate,
            ExceptionHandling::Debug => ExceptionHandling::AsFailure,
            other => other,
        }
    }
}

/// Options shared by the checker passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckOptions {
    #[serde(default)]
    pub as_table: Selection,
    /// Stop each scan once this many failures were found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_failures: Option<usize>,
    #[serde(default)]
    pub verbosity: Verbosity,
    #[serde(default)]
    pub exception_handling: ExceptionHandling,
}

/// Counts failures within one scan and says when to stop.
#[derive(Debug, Clone, Copy)]
pub struct FailureBudget {
    limit: Option<usize>,
    used: usize,
}

impl FailureBudget {
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit, used: 0 }
    }

    pub fn record(&mut self) {
        self.used += 1;
    }

    pub fn exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.used >= limit)
    }

    pub fn used(&self) -> usize {
        self.used
    }
}

/// One failing row and the message explaining it, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRow {
    pub row: RowRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Failing rows as requested by [`Selection`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum FailureView {
    Table(Vec<Row>),
    Mask(Vec<bool>),
}

/// Failures of one scan unit (a field, a predicate or a foreign key).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failures {
    pub rows: Vec<FailedRow>,
    pub view: FailureView,
    /// The scan stopped at `max_failures`; later rows were not examined.
    pub truncated: bool,
}

impl Failures {
    pub(crate) fn collect(
        table_rows: &TableRows,
        primary_key: &[String],
        rows: Vec<FailedRow>,
        selection: Selection,
        truncated: bool,
    ) -> Self {
        let refs = rows.iter().map(|failed| failed.row.clone()).collect::<Vec<_>>();
        let view = match selection {
            Selection::Mask => FailureView::Mask(table_rows.mask(&refs)),
            Selection::Table => {
                let wanted: HashSet<&RowRef> = refs.iter().collect();
                FailureView::Table(
                    table_rows
                        .entries()
                        .filter(|entry| wanted.contains(&entry.row_ref()))
                        .map(|entry| DataSet::full_row(primary_key, &entry))
                        .collect(),
                )
            }
        };
        Self {
            rows,
            view,
            truncated,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn refs(&self) -> Vec<RowRef> {
        self.rows.iter().map(|failed| failed.row.clone()).collect()
    }

    pub fn message(&self, row: &RowRef) -> Option<&str> {
        self.rows
            .iter()
            .find(|failed| &failed.row == row)
            .and_then(|failed| failed.message.as_deref())
    }
}

/// A table field, the key of data-type failures.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldRef {
    pub table: String,
    pub field: String,
}

impl FieldRef {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.field)
    }
}

/// A named row predicate, the key of predicate failures.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PredicateRef {
    pub table: String,
    pub predicate: String,
}

impl PredicateRef {
    pub fn new(table: impl Into<String>, predicate: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            predicate: predicate.into(),
        }
    }
}

impl fmt::Display for PredicateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.table, self.predicate)
    }
}

/// A foreign key, the key of foreign-key failures.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub native_table: String,
    pub foreign_table: String,
    pub mapping: Vec<FieldMapping>,
    /// Present under [`Verbosity::High`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
}

impl fmt::Display for ForeignKeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mapping = self
            .mapping
            .iter()
            .map(|m| format!("{}={}", m.native_field, m.foreign_field))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "{} -> {} ({mapping})", self.native_table, self.foreign_table)?;
        if let Some(cardinality) = &self.cardinality {
            write!(f, " {cardinality}")?;
        }
        Ok(())
    }
}

/// Failures keyed by scan unit, in key order.
///
/// Serializes as a list of `{ "target": .., "failures": .. }` entries since
/// the keys are structured.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureMap<K: Ord>(BTreeMap<K, Failures>);

impl<K: Ord> Default for FailureMap<K> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<K: Ord> FailureMap<K> {
    pub(crate) fn insert(&mut self, key: K, failures: Failures) {
        self.0.insert(key, failures);
    }

    /// Total failing rows across all keys.
    pub fn total(&self) -> usize {
        self.0.values().map(Failures::len).sum()
    }
}

impl<K: Ord> Deref for FailureMap<K> {
    type Target = BTreeMap<K, Failures>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<K: Ord + Serialize> Serialize for FailureMap<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Entry<'a, K> {
            target: &'a K,
            failures: &'a Failures,
        }

        serializer.collect_seq(
            self.0
                .iter()
                .map(|(target, failures)| Entry { target, failures }),
        )
    }
}

/// A primary key seen more than once, with how often.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateKey {
    pub key: Key,
    pub count: usize,
}

/// Duplicated primary keys per table, in first-seen order.
pub type DuplicateReport = BTreeMap<String, Vec<DuplicateKey>>;
