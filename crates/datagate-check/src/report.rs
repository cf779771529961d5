use datagate_core::{DataSet, RawData, Schema};
use serde::Serialize;

use crate::duplicates::find_duplicates;
use crate::errors::Result;
use crate::foreign::find_foreign_key_failures;
use crate::model::{
    CheckOptions, DuplicateReport, FailureMap, FieldRef, ForeignKeyRef, PredicateRef,
};
use crate::predicates::find_data_row_failures;
use crate::types::find_data_type_failures;

/// Category of a reported problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    Duplicate,
    DataType,
    Predicate,
    ForeignKey,
}

impl ProblemKind {
    fn label(self) -> &'static str {
        match self {
            ProblemKind::Duplicate => "duplicate",
            ProblemKind::DataType => "data_type",
            ProblemKind::Predicate => "predicate",
            ProblemKind::ForeignKey => "foreign_key",
        }
    }
}

/// One line of the problem table shown to end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub kind: ProblemKind,
    pub table: String,
    /// Field, predicate name or foreign key description.
    pub target: String,
    /// Offending primary key (or row position).
    pub row: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Results of all four checker passes over one dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub duplicates: DuplicateReport,
    pub data_types: FailureMap<FieldRef>,
    pub predicates: FailureMap<PredicateRef>,
    pub foreign_keys: FailureMap<ForeignKeyRef>,
}

impl IntegrityReport {
    /// Run every pass. Duplicates are only visible in the raw rows, so that
    /// pass is skipped without them.
    pub fn run(
        schema: &Schema,
        data: &DataSet,
        raw: Option<&RawData>,
        options: &CheckOptions,
    ) -> Result<Self> {
        let duplicates = match raw {
            Some(raw) => find_duplicates(schema, raw, options.max_failures)?,
            None => DuplicateReport::new(),
        };
        Ok(Self {
            duplicates,
            data_types: find_data_type_failures(schema, data, options)?,
            predicates: find_data_row_failures(schema, data, options)?,
            foreign_keys: find_foreign_key_failures(schema, data, options)?,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.problem_count() == 0
    }

    pub fn problem_count(&self) -> usize {
        self.duplicates.values().map(Vec::len).sum::<usize>()
            + self.data_types.total()
            + self.predicates.total()
            + self.foreign_keys.total()
    }

    /// Flattened problems in a deterministic order.
    pub fn problems(&self) -> Vec<Problem> {
        let mut problems = Vec::new();
        for (table, keys) in &self.duplicates {
            for duplicate in keys {
                problems.push(Problem {
                    kind: ProblemKind::Duplicate,
                    table: table.clone(),
                    target: "primary key".to_string(),
                    row: duplicate.key.to_string(),
                    message: Some(format!("{} rows share this key", duplicate.count)),
                });
            }
        }
        for (target, failures) in self.data_types.iter() {
            for failed in &failures.rows {
                problems.push(Problem {
                    kind: ProblemKind::DataType,
                    table: target.table.clone(),
                    target: target.field.clone(),
                    row: failed.row.to_string(),
                    message: failed.message.clone(),
                });
            }
        }
        for (target, failures) in self.predicates.iter() {
            for failed in &failures.rows {
                problems.push(Problem {
                    kind: ProblemKind::Predicate,
                    table: target.table.clone(),
                    target: target.predicate.clone(),
                    row: failed.row.to_string(),
                    message: failed.message.clone(),
                });
            }
        }
        for (target, failures) in self.foreign_keys.iter() {
            for failed in &failures.rows {
                problems.push(Problem {
                    kind: ProblemKind::ForeignKey,
                    table: target.native_table.clone(),
                    target: target.to_string(),
                    row: failed.row.to_string(),
                    message: failed.message.clone(),
                });
            }
        }
        problems
    }

    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Render a deterministic markdown problem table.
    pub fn render_markdown(&self, max_rows: usize) -> String {
        let mut lines = Vec::new();

        lines.push("# Datagate Integrity Report".to_string());
        lines.push(String::new());
        lines.push("## Summary".to_string());
        lines.push("| check | failing |".to_string());
        lines.push("| --- | --- |".to_string());
        lines.push(format!(
            "| duplicates | {} |",
            self.duplicates.values().map(Vec::len).sum::<usize>()
        ));
        lines.push(format!("| data_types | {} |", self.data_types.total()));
        lines.push(format!("| predicates | {} |", self.predicates.total()));
        lines.push(format!("| foreign_keys | {} |", self.foreign_keys.total()));
        lines.push(String::new());

        let problems = self.problems();
        if problems.is_empty() {
            lines.push("No problems found.".to_string());
            return lines.join("\n");
        }

        lines.push("## Problems".to_string());
        lines.push("| kind | table | field / predicate / key | row | message |".to_string());
        lines.push("| --- | --- | --- | --- | --- |".to_string());
        for problem in problems.iter().take(max_rows) {
            lines.push(format!(
                "| {} | {} | {} | {} | {} |",
                problem.kind.label(),
                escape_cell(&problem.table),
                escape_cell(&problem.target),
                escape_cell(&problem.row),
                problem
                    .message
                    .as_deref()
                    .map(escape_cell)
                    .unwrap_or_else(|| "-".to_string())
            ));
        }
        if problems.len() > max_rows {
            lines.push(String::new());
            lines.push(format!("... {} more not shown", problems.len() - max_rows));
        }

        let truncated = self.data_types.values().any(|f| f.truncated)
            || self.predicates.values().any(|f| f.truncated)
            || self.foreign_keys.values().any(|f| f.truncated);
        if truncated {
            lines.push(String::new());
            lines.push("Some scans stopped at max_failures; counts are lower bounds.".to_string());
        }

        lines.join("\n")
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
