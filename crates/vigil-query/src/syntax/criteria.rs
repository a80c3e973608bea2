//! Criteria (filter) grammar.
//!
//! ```text
//! criteria   := and ( "||" and )*
//! and        := not ( "&&" not )*
//! not        := "!"* criterion
//! criterion  := "(" criteria ")" | path ( operator value )?
//! value      := quoted string | unquoted token
//! ```
//!
//! `&&` binds tighter than `||`; both are left-associative. A bare path
//! means "the field is present".

use super::common::{path, string_literal, Extra};
use crate::criterion::{Criterion, Leaf, Value};
use crate::operator::Operator;
use chumsky::prelude::*;

/// Comparison token table, longest token first.
pub(crate) type OperatorTable = [(&'static str, Operator); 17];

/// Comparison operator, matched against the table in order.
fn operator<'src>(
    table: OperatorTable,
) -> impl Parser<'src, &'src str, Operator, Extra<'src>> + Clone {
    choice(table.map(|(token, op)| just(token).to(op))).labelled("comparison operator")
}

/// Right-hand side of a comparison.
///
/// Unquoted tokens run up to whitespace or one of `&|()`; those four may be
/// backslash-escaped. Other backslash pairs are kept as written.
fn value<'src>() -> impl Parser<'src, &'src str, Value, Extra<'src>> + Clone {
    let escaped = just('\\').ignore_then(one_of("&|()"));
    let plain = none_of("&|()").filter(|c: &char| !c.is_whitespace());
    let unquoted = escaped
        .or(plain)
        .repeated()
        .at_least(1)
        .collect::<String>();

    string_literal()
        .or(unquoted)
        .map(Value::Text)
        .labelled("value")
}

/// The full criteria expression. Leading and trailing whitespace is
/// accepted; the caller anchors the end of input.
pub(crate) fn criteria<'src>(
    table: OperatorTable,
) -> impl Parser<'src, &'src str, Criterion, Extra<'src>> {
    recursive(|criteria| {
        let comparison = path()
            .then(operator(table).padded().then(value()).or_not())
            .map(|(left, comparison)| match comparison {
                Some((operator, right)) => Criterion::leaf(left, operator, Some(right)),
                None => Criterion::from(Leaf::not_null(left)),
            });

        let group = criteria.delimited_by(just('(').padded(), just(')').padded());

        let criterion = group.or(comparison).padded();

        let not = just('!')
            .padded()
            .repeated()
            .count()
            .then(criterion)
            .map(|(bangs, criterion): (usize, Criterion)| {
                if bangs % 2 == 1 {
                    criterion.negate()
                } else {
                    criterion
                }
            });

        let and = not
            .clone()
            .foldl(just("&&").padded().ignore_then(not).repeated(), |lhs, rhs| {
                lhs & rhs
            });

        and.clone()
            .foldl(just("||").padded().ignore_then(and).repeated(), |lhs, rhs| {
                lhs | rhs
            })
    })
    .padded()
}
