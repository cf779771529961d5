//! Core contracts for Datagate.
//!
//! This crate defines cell values, type rules, foreign keys, row predicates,
//! the schema registry and the in-memory data container that integrity
//! checks run against.

pub mod constraints;
pub mod dataset;
pub mod document;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod parameters;
pub mod predicates;
pub mod row;
pub mod schema;
pub mod types;
pub mod validation;
pub mod value;

pub use constraints::{Cardinality, FieldMapping, ForeignKey, Multiplicity};
pub use dataset::{DataSet, FieldReader, KeyedRows, RowEntry, RowRef, TableRows};
pub use document::{AncillaryInfo, SchemaDocument, TableDocument, TableLayout};
pub use error::{Error, Result};
pub use graph::{FkGraphReport, FkGraphSummary, build_fk_graph_report};
pub use ingest::{RawData, RawRow};
pub use parameters::Parameter;
pub use predicates::{
    FailureResponse, Kwargs, KwargsMaker, PredicateError, PredicateResult, RowPredicate, Verdict,
};
pub use row::Row;
pub use schema::{
    GENERIC_MARKER, PARAMETERS_TABLE, PARAMETER_PREDICATE, Schema, SchemaState, TableDef,
};
pub use types::{StringsAllowed, TypeRule, TypeRuleBuilder};
pub use validation::{
    DocumentIssue, document_json_schema, validate_document, validate_document_json,
};
pub use value::{Key, Value};

/// Current contract version for schema interchange documents.
pub const SCHEMA_VERSION: &str = "0.1";
