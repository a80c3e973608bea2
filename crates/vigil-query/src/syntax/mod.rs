//! Query text parsers.
//!
//! [`Grammar`] is built once per process and shared by every request. It
//! owns the comparison token table; the chumsky combinators themselves are
//! cheap to assemble and are instantiated per call against the borrowed
//! input.

mod common;
mod criteria;
mod selection;

pub use common::format_errors;

use crate::criterion::Criterion;
use crate::error::{QueryError, Result, SyntaxError};
use crate::operator::COMPARISON_TOKENS;
use crate::path::Path;
use crate::selection::Selection;
use chumsky::prelude::*;
use criteria::OperatorTable;
use tracing::debug;

/// Parser for filter criteria, selections and paths.
#[derive(Debug, Clone)]
pub struct Grammar {
    operators: OperatorTable,
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar {
    pub fn new() -> Self {
        let mut operators = COMPARISON_TOKENS;
        // stable sort keeps table order between tokens of equal length
        operators.sort_by_key(|(token, _)| std::cmp::Reverse(token.len()));
        Self { operators }
    }

    /// Operator tokens in matching order.
    pub fn operator_tokens(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.operators.iter().map(|(token, _)| *token)
    }

    /// Parse a filter expression into a flattened criterion tree.
    ///
    /// Blank input yields [`Criterion::Empty`].
    pub fn parse_criteria(&self, input: &str) -> std::result::Result<Criterion, SyntaxError> {
        if input.trim().is_empty() {
            return Ok(Criterion::Empty);
        }

        let criterion = criteria::criteria(self.operators)
            .then_ignore(end())
            .parse(input)
            .into_result()
            .map_err(|errs| common::syntax_error(&errs, input))?
            .flatten();

        debug!(input, criterion = %criterion, "parsed criteria");
        Ok(criterion)
    }

    /// Parse a selection such as `count(alert.messageid)/group_by`.
    pub fn parse_selection(&self, input: &str) -> std::result::Result<Selection, SyntaxError> {
        selection::selection()
            .then_ignore(end())
            .parse(input)
            .into_result()
            .map_err(|errs| common::syntax_error(&errs, input))
    }

    pub fn parse_path(&self, input: &str) -> Result<Path> {
        parse_path(input)
    }
}

/// Parse a dotted path. Failures are reported as
/// [`QueryError::MalformedPath`].
pub fn parse_path(input: &str) -> Result<Path> {
    common::path()
        .then_ignore(end())
        .parse(input)
        .into_result()
        .map_err(|errs| QueryError::MalformedPath {
            path: input.to_string(),
            reason: format_errors(&errs, input),
        })
}
