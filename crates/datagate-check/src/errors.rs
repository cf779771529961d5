use datagate_core::PredicateError;
use thiserror::Error;

/// Errors emitted by the integrity checker and remediation engine.
///
/// Integrity problems themselves are never errors; they come back as reports.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Core(#[from] datagate_core::Error),
    /// A row predicate raised while exceptions propagate.
    #[error("predicate {predicate} on {table} failed: {source}")]
    Predicate {
        table: String,
        predicate: String,
        #[source]
        source: PredicateError,
    },
    /// A remediation request that would corrupt the data.
    #[error("remediation refused: {0}")]
    Remediation(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CheckError>;
