//! Comparison and boolean operators of the criteria language.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An operator token.
///
/// Comparison operators appear in leaf predicates; `And` and `Or` only
/// label combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Equal,
    EqualNocase,
    NotEqual,
    NotEqualNocase,
    Substr,
    SubstrNocase,
    NotSubstr,
    NotSubstrNocase,
    Regex,
    RegexNocase,
    NotRegex,
    NotRegexNocase,
    Lesser,
    LesserOrEqual,
    Greater,
    GreaterOrEqual,
    And,
    Or,
}

/// Every comparison token the grammar recognizes, longest first so that a
/// first-match scan is also a longest-match scan.
pub const COMPARISON_TOKENS: [(&str, Operator); 17] = [
    ("!<>*", Operator::NotSubstrNocase),
    ("!<>", Operator::NotSubstr),
    ("<>*", Operator::SubstrNocase),
    ("!=*", Operator::NotEqualNocase),
    ("!~*", Operator::NotRegexNocase),
    ("==", Operator::Equal),
    ("=*", Operator::EqualNocase),
    ("!=", Operator::NotEqual),
    ("<>", Operator::Substr),
    ("<=", Operator::LesserOrEqual),
    (">=", Operator::GreaterOrEqual),
    ("~*", Operator::RegexNocase),
    ("!~", Operator::NotRegex),
    ("=", Operator::Equal),
    ("<", Operator::Lesser),
    (">", Operator::Greater),
    ("~", Operator::Regex),
];

/// All comparison operators in declaration order.
pub const COMPARISONS: [Operator; 16] = [
    Operator::Equal,
    Operator::EqualNocase,
    Operator::NotEqual,
    Operator::NotEqualNocase,
    Operator::Substr,
    Operator::SubstrNocase,
    Operator::NotSubstr,
    Operator::NotSubstrNocase,
    Operator::Regex,
    Operator::RegexNocase,
    Operator::NotRegex,
    Operator::NotRegexNocase,
    Operator::Lesser,
    Operator::LesserOrEqual,
    Operator::Greater,
    Operator::GreaterOrEqual,
];

impl Operator {
    /// Look up an operator by its token. Both `=` and `==` mean equality.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "&&" => Some(Self::And),
            "||" => Some(Self::Or),
            _ => COMPARISON_TOKENS
                .iter()
                .find(|(t, _)| *t == token)
                .map(|(_, op)| *op),
        }
    }

    /// Canonical spelling, used when serializing criteria.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Equal => "==",
            Self::EqualNocase => "=*",
            Self::NotEqual => "!=",
            Self::NotEqualNocase => "!=*",
            Self::Substr => "<>",
            Self::SubstrNocase => "<>*",
            Self::NotSubstr => "!<>",
            Self::NotSubstrNocase => "!<>*",
            Self::Regex => "~",
            Self::RegexNocase => "~*",
            Self::NotRegex => "!~",
            Self::NotRegexNocase => "!~*",
            Self::Lesser => "<",
            Self::LesserOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    /// Logical inverse of a positive operator (`!=`, `!<>`, `!~` and their
    /// case-insensitive forms).
    pub const fn is_negated(self) -> bool {
        matches!(
            self,
            Self::NotEqual
                | Self::NotEqualNocase
                | Self::NotSubstr
                | Self::NotSubstrNocase
                | Self::NotRegex
                | Self::NotRegexNocase
        )
    }

    /// Contains-style match, eligible for implicit wildcarding.
    pub const fn is_substring(self) -> bool {
        matches!(
            self,
            Self::Substr | Self::SubstrNocase | Self::NotSubstr | Self::NotSubstrNocase
        )
    }

    pub const fn is_regex(self) -> bool {
        matches!(
            self,
            Self::Regex | Self::RegexNocase | Self::NotRegex | Self::NotRegexNocase
        )
    }

    pub const fn is_nocase(self) -> bool {
        matches!(
            self,
            Self::EqualNocase
                | Self::NotEqualNocase
                | Self::SubstrNocase
                | Self::NotSubstrNocase
                | Self::RegexNocase
                | Self::NotRegexNocase
        )
    }

    /// Marks the AND/OR combinators rather than leaf comparisons.
    pub const fn is_boolean(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    pub const fn is_ordering(self) -> bool {
        matches!(
            self,
            Self::Lesser | Self::LesserOrEqual | Self::Greater | Self::GreaterOrEqual
        )
    }

    /// The logical complement of this operator.
    pub const fn negate(self) -> Self {
        match self {
            Self::Equal => Self::NotEqual,
            Self::NotEqual => Self::Equal,
            Self::EqualNocase => Self::NotEqualNocase,
            Self::NotEqualNocase => Self::EqualNocase,
            Self::Substr => Self::NotSubstr,
            Self::NotSubstr => Self::Substr,
            Self::SubstrNocase => Self::NotSubstrNocase,
            Self::NotSubstrNocase => Self::SubstrNocase,
            Self::Regex => Self::NotRegex,
            Self::NotRegex => Self::Regex,
            Self::RegexNocase => Self::NotRegexNocase,
            Self::NotRegexNocase => Self::RegexNocase,
            Self::Lesser => Self::GreaterOrEqual,
            Self::GreaterOrEqual => Self::Lesser,
            Self::LesserOrEqual => Self::Greater,
            Self::Greater => Self::LesserOrEqual,
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl TryFrom<String> for Operator {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_token(&value).ok_or_else(|| format!("unknown operator '{}'", value))
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.token().to_string()
    }
}
