//! Integrity checks and remediation over Datagate datasets.
//!
//! Each checker pass reads a [`DataSet`](datagate_core::DataSet) and returns
//! a report; none of them modify the data. The remediation functions are
//! the only mutators.

pub mod duplicates;
pub mod errors;
pub mod foreign;
pub mod model;
pub mod predicates;
pub mod remediate;
pub mod report;
pub mod types;

pub use duplicates::find_duplicates;
pub use errors::{CheckError, Result};
pub use foreign::find_foreign_key_failures;
pub use model::{
    CheckOptions, DuplicateKey, DuplicateReport, ExceptionHandling, FailedRow, FailureBudget,
    FailureMap, FailureView, Failures, FieldRef, ForeignKeyRef, PredicateRef, Selection, Verbosity,
};
pub use predicates::find_data_row_failures;
pub use remediate::{Replacements, remove_foreign_key_failures, replace_data_type_failures};
pub use report::{IntegrityReport, Problem, ProblemKind};
pub use types::find_data_type_failures;
