use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::DataSet;
use crate::row::Row;
use crate::value::Value;

/// Auxiliary context computed once per validation pass.
pub type Kwargs = HashMap<String, Value>;

pub type PredicateResult = Result<Verdict, PredicateError>;

type PredicateFn = Arc<dyn Fn(&Row, &Kwargs) -> PredicateResult>;

/// Computes [`Kwargs`] from the full dataset. Shared makers are invoked once
/// per pass; identity is the `Arc` allocation.
pub type KwargsMaker = Arc<dyn Fn(&DataSet) -> Result<Kwargs, PredicateError>>;

/// Raised by a predicate (or a kwargs maker) that could not evaluate a row.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct PredicateError(pub String);

impl From<String> for PredicateError {
    fn from(message: String) -> Self {
        PredicateError(message)
    }
}

impl From<&str> for PredicateError {
    fn from(message: &str) -> Self {
        PredicateError(message.to_string())
    }
}

/// Outcome of evaluating a predicate against one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(Option<String>),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

impl From<bool> for Verdict {
    fn from(valid: bool) -> Self {
        if valid {
            Verdict::Valid
        } else {
            Verdict::Invalid(None)
        }
    }
}

/// A string verdict is always a failure message.
impl From<String> for Verdict {
    fn from(message: String) -> Self {
        Verdict::Invalid(Some(message))
    }
}

impl From<&str> for Verdict {
    fn from(message: &str) -> Self {
        Verdict::Invalid(Some(message.to_string()))
    }
}

/// How a predicate's failures are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureResponse {
    /// Failures are flagged without a message.
    #[default]
    Boolean,
    /// The message carried by an invalid verdict is kept in the report.
    ErrorMessage,
}

/// Named cross-field validation over one full table row.
#[derive(Clone)]
pub struct RowPredicate {
    check: PredicateFn,
    response: FailureResponse,
    kwargs_maker: Option<KwargsMaker>,
}

impl RowPredicate {
    /// Predicate receiving the row and the pass-wide kwargs.
    pub fn new<F>(check: F) -> Self
    where
        F: Fn(&Row, &Kwargs) -> PredicateResult + 'static,
    {
        Self {
            check: Arc::new(check),
            response: FailureResponse::Boolean,
            kwargs_maker: None,
        }
    }

    /// Predicate over the row alone that cannot raise.
    pub fn from_fn<F, V>(check: F) -> Self
    where
        F: Fn(&Row) -> V + 'static,
        V: Into<Verdict>,
    {
        Self::new(move |row, _| Ok(check(row).into()))
    }

    pub fn with_response(mut self, response: FailureResponse) -> Self {
        self.response = response;
        self
    }

    pub fn error_message(self) -> Self {
        self.with_response(FailureResponse::ErrorMessage)
    }

    pub fn with_kwargs_maker(mut self, maker: KwargsMaker) -> Self {
        self.kwargs_maker = Some(maker);
        self
    }

    pub fn response(&self) -> FailureResponse {
        self.response
    }

    pub fn kwargs_maker(&self) -> Option<&KwargsMaker> {
        self.kwargs_maker.as_ref()
    }

    pub fn evaluate(&self, row: &Row, kwargs: &Kwargs) -> PredicateResult {
        (self.check)(row, kwargs)
    }
}

impl fmt::Debug for RowPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowPredicate")
            .field("response", &self.response)
            .field("has_kwargs_maker", &self.kwargs_maker.is_some())
            .finish()
    }
}

/// Stable identity of a kwargs maker, for per-pass memoization.
pub fn maker_identity(maker: &KwargsMaker) -> usize {
    Arc::as_ptr(maker) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(min: i64, max: i64) -> Row {
        Row::from_iter([("Min", Value::Int(min)), ("Max", Value::Int(max))])
    }

    #[test]
    fn error_message_predicates_carry_text() {
        let predicate = RowPredicate::from_fn(|row: &Row| {
            let (min, max) = (row.get("Min").cloned(), row.get("Max").cloned());
            match (min, max) {
                (Some(min), Some(max)) if max.as_f64() >= min.as_f64() => Verdict::Valid,
                (Some(min), Some(max)) => format!("{max} < {min}").into(),
                _ => "missing bounds".into(),
            }
        })
        .error_message();

        let verdict = predicate.evaluate(&row(10, 5), &Kwargs::new()).unwrap();
        assert_eq!(verdict, Verdict::Invalid(Some("5 < 10".to_string())));
        assert!(predicate.evaluate(&row(1, 5), &Kwargs::new()).unwrap().is_valid());
    }

    #[test]
    fn raising_predicates_surface_errors() {
        let predicate = RowPredicate::new(|row, _| Ok((row.number("Cost")? > 0.0).into()));
        let err = predicate.evaluate(&row(1, 2), &Kwargs::new()).unwrap_err();
        assert!(err.0.contains("Cost"));
    }

    #[test]
    fn maker_identity_follows_the_allocation() {
        let maker: KwargsMaker = Arc::new(|_| Ok(Kwargs::new()));
        let shared = Arc::clone(&maker);
        let other: KwargsMaker = Arc::new(|_| Ok(Kwargs::new()));
        assert_eq!(maker_identity(&maker), maker_identity(&shared));
        assert_ne!(maker_identity(&maker), maker_identity(&other));
    }
}
