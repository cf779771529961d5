use thiserror::Error;

/// Error raised while configuring a schema or building data against it.
#[derive(Debug, Error)]
pub enum Error {
    /// The table layout violates schema invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A table name that the schema does not declare.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// A field name that the table does not declare.
    #[error("unknown field: {table}.{field}")]
    UnknownField { table: String, field: String },
    /// A type rule whose attributes contradict each other.
    #[error("invalid type rule: {0}")]
    InvalidTypeRule(String),
    /// A value that cannot be used where it was supplied.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// The schema has been used to build data and can no longer change.
    #[error("schema is frozen: {0} is not allowed after first use")]
    Frozen(&'static str),
    /// Data that does not match the shape the schema declares.
    #[error("structure mismatch: {0}")]
    Structure(String),
    /// The data container was frozen and cannot be mutated.
    #[error("data is frozen and cannot be modified")]
    FrozenData,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for results returned by schema configuration.
pub type Result<T> = std::result::Result<T, Error>;
