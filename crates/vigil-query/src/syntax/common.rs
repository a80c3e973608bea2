//! Shared parser primitives for the criteria and selection grammars.
//!
//! Both grammars share the same lexical rules for field names, paths,
//! quoted strings and numbers.

use crate::criterion::Value;
use crate::error::SyntaxError;
use crate::path::{Index, Path, Segment};
use chumsky::extra;
use chumsky::prelude::*;

/// Extra type for parsers - uses Rich errors for better messages
pub type Extra<'src> = extra::Err<Rich<'src, char>>;

/// Longest snippet of remaining input reported with a syntax error.
const SNIPPET_LEN: usize = 24;

// ============================================================================
// Primitive parsers
// ============================================================================

/// Field name: a letter followed by letters, digits, `-` or `_`
pub fn word<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphabetic())
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .repeated(),
        )
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("field name")
}

/// Quoted string with `quote` as delimiter.
///
/// `\<quote>` and `\\` are unescaped; any other backslash pair is kept
/// verbatim so that escaped wildcards reach the backend untouched.
fn quoted<'src>(quote: char) -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    let escaped = just('\\').ignore_then(any()).map(move |c: char| {
        let mut s = String::with_capacity(2);
        if c != quote && c != '\\' {
            s.push('\\');
        }
        s.push(c);
        s
    });
    let plain = any()
        .filter(move |c: &char| *c != quote && *c != '\\')
        .map(|c: char| c.to_string());

    just(quote)
        .ignore_then(escaped.or(plain).repeated().collect::<Vec<String>>())
        .then_ignore(just(quote))
        .map(|parts| parts.concat())
}

/// Parser for string literals (single or double quoted)
pub fn string_literal<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    quoted('"').or(quoted('\'')).labelled("quoted string")
}

/// Parser for integer literals, optionally negative
pub fn signed_integer<'src>() -> impl Parser<'src, &'src str, i64, Extra<'src>> + Clone {
    just('-')
        .or_not()
        .then(any().filter(|c: &char| c.is_ascii_digit()).repeated().at_least(1))
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<i64>()
                .map_err(|_| Rich::custom(span, "integer overflow"))
        })
        .labelled("integer")
}

/// Parser for numeric constants: integers or decimals
pub fn number<'src>() -> impl Parser<'src, &'src str, Value, Extra<'src>> + Clone {
    let digits = any().filter(|c: &char| c.is_ascii_digit()).repeated().at_least(1);

    just('-')
        .or_not()
        .then(digits.clone())
        .then(just('.').then(digits).or_not())
        .to_slice()
        .try_map(|s: &str, span| {
            if s.contains('.') {
                s.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| Rich::custom(span, "invalid number"))
            } else {
                s.parse::<i64>()
                    .map(Value::Integer)
                    .map_err(|_| Rich::custom(span, "integer overflow"))
            }
        })
        .labelled("number")
}

// ============================================================================
// Path parsers
// ============================================================================

/// Segment index: `(0)`, `(-1)`, `("key")` or `(*)`
pub fn index<'src>() -> impl Parser<'src, &'src str, Index, Extra<'src>> + Clone {
    choice((
        signed_integer().map(Index::Position),
        string_literal().map(Index::Key),
        just('*').to(Index::Any),
    ))
    .delimited_by(just('('), just(')'))
    .labelled("index like (0), (-1), (\"key\") or (*)")
}

/// Path segment: a field name with an optional index
pub fn segment<'src>() -> impl Parser<'src, &'src str, Segment, Extra<'src>> + Clone {
    word()
        .then(index().or_not())
        .map(|(name, index)| Segment { name, index })
}

/// Dotted path: `source(0).node.address`
pub fn path<'src>() -> impl Parser<'src, &'src str, Path, Extra<'src>> + Clone {
    segment()
        .separated_by(just('.'))
        .at_least(1)
        .collect::<Vec<_>>()
        .try_map(|segments, span| {
            Path::from_segments(segments).ok_or_else(|| Rich::custom(span, "empty path"))
        })
        .labelled("path like source(0).node.address")
}

// ============================================================================
// Error formatting
// ============================================================================

/// Format chumsky errors for human consumption
pub fn format_errors(errs: &[Rich<'_, char>], input: &str) -> String {
    errs.iter()
        .map(|e| {
            let start = e.span().start;
            let col = start - input[..start].rfind('\n').map_or(0, |i| i + 1);

            let found = e
                .found()
                .map_or("end of input".to_string(), |c| format!("'{}'", c));

            format!("column {}: {} (found {})", col + 1, e.reason(), found)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse chumsky errors into a single [`SyntaxError`] located at the
/// furthest offending position.
pub fn syntax_error(errs: &[Rich<'_, char>], input: &str) -> SyntaxError {
    let position = errs
        .iter()
        .map(|e| e.span().start)
        .max()
        .unwrap_or(input.len())
        .min(input.len());

    SyntaxError {
        position,
        snippet: input
            .get(position..)
            .unwrap_or_default()
            .chars()
            .take(SNIPPET_LEN)
            .collect(),
        message: format_errors(errs, input),
    }
}
