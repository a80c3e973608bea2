//! Selection grammar.
//!
//! ```text
//! selection := expr ( ":" word )? ( "/" word ( "," word )* )?
//! expr      := quoted | number | term ( "." term )*
//! term      := word ( "(" arg ( "," arg )* ")" )?
//! arg       := quoted | number | "*" | expr
//! ```
//!
//! A single term with arguments is a function call. Anything else is a
//! path whose parenthesized arguments must be a single list index.

use super::common::{number, string_literal, word, Extra};
use crate::criterion::Value;
use crate::path::{Index, Path, Segment};
use crate::selection::{Selection, SelectionExpr};
use chumsky::prelude::*;

#[derive(Debug, Clone)]
enum Arg {
    Expr(SelectionExpr),
    Constant(Value),
    Star,
}

#[derive(Debug, Clone)]
struct Term {
    name: String,
    args: Option<Vec<Arg>>,
}

fn path_index(name: &str, args: Vec<Arg>) -> Result<Index, String> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (Some(Arg::Constant(Value::Integer(n))), None) => Ok(Index::Position(n)),
        (Some(Arg::Constant(Value::Text(key))), None) => Ok(Index::Key(key)),
        (Some(Arg::Star), None) => Ok(Index::Any),
        _ => Err(format!("invalid index for '{}'", name)),
    }
}

fn arg_to_expr(arg: Arg) -> Result<SelectionExpr, String> {
    match arg {
        Arg::Expr(expr) => Ok(expr),
        Arg::Constant(value) => Ok(SelectionExpr::Constant { value }),
        Arg::Star => Err("'*' is only valid as a list index".to_string()),
    }
}

fn chain_to_expr(mut terms: Vec<Term>) -> Result<SelectionExpr, String> {
    if terms.len() == 1 && terms[0].args.is_some() {
        let term = terms.remove(0);
        let args = term
            .args
            .unwrap_or_default()
            .into_iter()
            .map(arg_to_expr)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(SelectionExpr::Function {
            name: term.name,
            args,
        });
    }

    let segments = terms
        .into_iter()
        .map(|term| match term.args {
            None => Ok(Segment::new(term.name)),
            Some(args) => {
                let index = path_index(&term.name, args)?;
                Ok(Segment::indexed(term.name, index))
            }
        })
        .collect::<Result<Vec<_>, String>>()?;

    Path::from_segments(segments)
        .map(|path| SelectionExpr::Path { path })
        .ok_or_else(|| "empty path".to_string())
}

fn expr<'src>() -> impl Parser<'src, &'src str, SelectionExpr, Extra<'src>> + Clone {
    recursive(|expr| {
        let arg = choice((
            string_literal().map(|s| Arg::Constant(Value::Text(s))),
            number().map(Arg::Constant),
            just('*').to(Arg::Star),
            expr.map(Arg::Expr),
        ))
        .padded();

        let args = arg
            .separated_by(just(','))
            .collect::<Vec<_>>()
            .delimited_by(just('('), just(')'));

        let term = word()
            .then(args.or_not())
            .map(|(name, args)| Term { name, args });

        let chain = term
            .separated_by(just('.'))
            .at_least(1)
            .collect::<Vec<_>>()
            .try_map(|terms, span| chain_to_expr(terms).map_err(|msg| Rich::custom(span, msg)));

        choice((
            string_literal().map(|s| SelectionExpr::Constant {
                value: Value::Text(s),
            }),
            number().map(|value| SelectionExpr::Constant { value }),
            chain,
        ))
        .padded()
    })
}

pub(crate) fn selection<'src>() -> impl Parser<'src, &'src str, Selection, Extra<'src>> {
    let commands = word()
        .separated_by(just(',').padded())
        .at_least(1)
        .collect::<Vec<_>>();

    expr()
        .then(just(':').ignore_then(word()).or_not())
        .then(just('/').ignore_then(commands).or_not())
        .map(|((expr, extract), commands)| Selection {
            expr,
            extract,
            commands: commands.unwrap_or_default(),
        })
        .padded()
}
