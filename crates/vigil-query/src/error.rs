//! Error types for the query pipeline.
//!
//! Every error carries enough structure (offending path, operator or input
//! position) for a caller to highlight the faulty part of the expression.

use crate::operator::Operator;
use crate::schema::ValueType;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, QueryError>;

/// Filter or selection text that does not match the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("syntax error at position {position}: {message}")]
pub struct SyntaxError {
    /// Byte offset of the first offending character (input length for an
    /// unexpected end of input)
    pub position: usize,
    /// The input from `position` on, truncated
    pub snippet: String,
    /// Human readable description of what was expected
    pub message: String,
}

/// Errors raised while parsing, validating or compiling criteria.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Path text with invalid segment syntax.
    #[error("malformed path '{path}': {reason}")]
    MalformedPath { path: String, reason: String },

    /// Path with no schema entry for the target entity type.
    #[error("invalid field '{path}'")]
    UnknownPath { path: String },

    /// Entity type with no registered schema.
    #[error("unknown entity type '{entity}'")]
    UnknownEntity { entity: String },

    /// Operator not permitted for the resolved value type.
    #[error("operator '{operator}' is not valid for {value_type} field '{path}'")]
    InvalidOperator {
        path: String,
        operator: Operator,
        value_type: ValueType,
    },

    /// The backend rejected a schema-valid criterion.
    #[error("{backend} backend cannot compile '{criterion}': {reason}")]
    CriterionCompile {
        backend: String,
        criterion: String,
        reason: String,
    },

    /// A list container is keyed by a field that was never declared.
    #[error("list '{container}' is indexed by undeclared field '{key}'")]
    AmbiguousIndex { container: String, key: String },
}

impl QueryError {
    pub(crate) fn unknown_path(path: impl ToString) -> Self {
        Self::UnknownPath {
            path: path.to_string(),
        }
    }

    pub(crate) fn rejected(
        backend: &str,
        criterion: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::CriterionCompile {
            backend: backend.to_string(),
            criterion: criterion.to_string(),
            reason: reason.into(),
        }
    }
}
