//! The criteria predicate algebra.
//!
//! A [`Criterion`] is either empty, a single comparison ([`Leaf`]) or an
//! AND/OR [`Criterion::Combinator`] over child criteria. There is no NOT
//! node: negation is carried by the leaf operators, and negating a
//! combinator goes through De Morgan's law.

use crate::error::Result;
use crate::operator::Operator;
use crate::path::Path;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Textual rendering without quoting.
    pub fn to_text(&self) -> String {
        match self {
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"")
            }
            other => f.write_str(&other.to_text()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// A single comparison. `right == None` turns equality operators into null
/// tests: `path == None` is "absent", `path != None` is "present".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaf {
    pub left: Path,
    pub operator: Operator,
    pub right: Option<Value>,
}

impl Leaf {
    pub fn new(left: Path, operator: Operator, right: Option<Value>) -> Self {
        Self {
            left,
            operator,
            right,
        }
    }

    /// The bare-path shorthand: the field is present.
    pub fn not_null(left: Path) -> Self {
        Self::new(left, Operator::NotEqual, None)
    }

    /// The field is absent.
    pub fn is_null(left: Path) -> Self {
        Self::new(left, Operator::Equal, None)
    }

    /// Whether the leaf excludes rather than selects: a negated operator
    /// against a value, or a test for absence.
    pub fn is_negative(&self) -> bool {
        if self.right.is_some() {
            self.operator.is_negated()
        } else {
            !self.operator.is_negated()
        }
    }

    pub fn negate(self) -> Self {
        Self {
            operator: self.operator.negate(),
            ..self
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.right {
            Some(value) => write!(f, "{} {} {}", self.left, self.operator, value),
            None if self.operator.is_negated() => write!(f, "{}", self.left),
            None => write!(f, "!{}", self.left),
        }
    }
}

/// Boolean combinator kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    And,
    Or,
}

impl BoolOp {
    pub const fn operator(self) -> Operator {
        match self {
            Self::And => Operator::And,
            Self::Or => Operator::Or,
        }
    }

    pub const fn negate(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

impl fmt::Display for BoolOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operator().token())
    }
}

/// A predicate tree over schema fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Criterion {
    /// Identity element of both combinators; matches everything.
    #[default]
    Empty,
    Leaf(Leaf),
    Combinator {
        operator: BoolOp,
        operands: Vec<Criterion>,
    },
}

impl Criterion {
    /// Shorthand for `Criterion::Leaf(Leaf::new(..))`.
    pub fn leaf(left: Path, operator: Operator, right: Option<Value>) -> Self {
        Self::Leaf(Leaf::new(left, operator, right))
    }

    /// Parse `left` as a path and build a leaf comparing it with `right`.
    pub fn compare(left: &str, operator: Operator, right: impl Into<Value>) -> Result<Self> {
        Ok(Self::leaf(Path::parse(left)?, operator, Some(right.into())))
    }

    /// False only for [`Criterion::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    fn combine(self, operator: BoolOp, other: Self) -> Self {
        match (self, other) {
            (Self::Empty, other) => other,
            (this, Self::Empty) => this,
            (this, other) => Self::Combinator {
                operator,
                operands: vec![this, other],
            },
        }
    }

    /// Merge nested combinators of the same kind into one n-ary
    /// combinator, preserving left-to-right order.
    pub fn flatten(self) -> Self {
        match self {
            Self::Combinator { operator, operands } => {
                let mut flat = Vec::with_capacity(operands.len());
                for operand in operands {
                    match operand.flatten() {
                        Self::Combinator {
                            operator: inner,
                            operands: nested,
                        } if inner == operator => flat.extend(nested),
                        Self::Empty => {}
                        other => flat.push(other),
                    }
                }
                match flat.len() {
                    0 => Self::Empty,
                    1 => flat.pop().unwrap_or_default(),
                    _ => Self::Combinator {
                        operator,
                        operands: flat,
                    },
                }
            }
            other => other,
        }
    }

    /// Logical complement: leaves flip their operator, combinators swap
    /// AND/OR and negate every operand.
    pub fn negate(self) -> Self {
        match self {
            Self::Empty => Self::Empty,
            Self::Leaf(leaf) => Self::Leaf(leaf.negate()),
            Self::Combinator { operator, operands } => Self::Combinator {
                operator: operator.negate(),
                operands: operands.into_iter().map(Self::negate).collect(),
            },
        }
    }

    /// All leaves, depth-first, left to right.
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Leaf>) {
        match self {
            Self::Empty => {}
            Self::Leaf(leaf) => out.push(leaf),
            Self::Combinator { operands, .. } => {
                for operand in operands {
                    operand.collect_leaves(out);
                }
            }
        }
    }

    /// Rebuild the tree, replacing every leaf with the criterion `f` returns.
    /// The first error aborts the whole rewrite.
    pub fn try_map_leaves<E, F>(self, f: &mut F) -> std::result::Result<Self, E>
    where
        F: FnMut(Leaf) -> std::result::Result<Self, E>,
    {
        match self {
            Self::Empty => Ok(Self::Empty),
            Self::Leaf(leaf) => f(leaf),
            Self::Combinator { operator, operands } => {
                let operands = operands
                    .into_iter()
                    .map(|operand| operand.try_map_leaves(f))
                    .collect::<std::result::Result<Vec<_>, E>>()?;
                Ok(Self::Combinator { operator, operands })
            }
        }
    }
}

impl From<Leaf> for Criterion {
    fn from(leaf: Leaf) -> Self {
        Self::Leaf(leaf)
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Leaf(leaf) => write!(f, "{}", leaf),
            Self::Combinator { operator, operands } => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", operator)?;
                    }
                    match operand {
                        Self::Combinator { .. } => write!(f, "({})", operand)?,
                        _ => write!(f, "{}", operand)?,
                    }
                }
                Ok(())
            }
        }
    }
}

impl BitAnd for Criterion {
    type Output = Criterion;

    fn bitand(self, rhs: Self) -> Self {
        self.combine(BoolOp::And, rhs)
    }
}

impl BitOr for Criterion {
    type Output = Criterion;

    fn bitor(self, rhs: Self) -> Self {
        self.combine(BoolOp::Or, rhs)
    }
}

impl BitAndAssign for Criterion {
    fn bitand_assign(&mut self, rhs: Self) {
        *self = std::mem::take(self) & rhs;
    }
}

impl BitOrAssign for Criterion {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = std::mem::take(self) | rhs;
    }
}

impl Not for Criterion {
    type Output = Criterion;

    fn not(self) -> Self {
        self.negate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(path: &str, value: &str) -> Criterion {
        Criterion::compare(path, Operator::Equal, value).unwrap()
    }

    #[test]
    fn test_empty_is_identity() {
        let c = leaf("a", "1");
        assert_eq!(Criterion::Empty & c.clone(), c);
        assert_eq!(c.clone() | Criterion::Empty, c);
        assert_eq!(Criterion::Empty & Criterion::Empty, Criterion::Empty);
        assert!(Criterion::Empty.is_empty());
        assert!(!c.is_empty());
    }

    #[test]
    fn test_combination_is_pairwise() {
        let c = leaf("a", "1") & leaf("b", "2") & leaf("c", "3");
        match &c {
            Criterion::Combinator { operator, operands } => {
                assert_eq!(*operator, BoolOp::And);
                assert_eq!(operands.len(), 2);
                assert!(matches!(operands[0], Criterion::Combinator { .. }));
            }
            other => panic!("expected combinator, got {:?}", other),
        }
    }

    #[test]
    fn test_flatten_merges_same_operator() {
        let c = (leaf("a", "1") & leaf("b", "2") & leaf("c", "3")).flatten();
        match &c {
            Criterion::Combinator { operands, .. } => {
                assert_eq!(operands.len(), 3);
                assert_eq!(operands[0], leaf("a", "1"));
                assert_eq!(operands[2], leaf("c", "3"));
            }
            other => panic!("expected combinator, got {:?}", other),
        }
    }

    #[test]
    fn test_flatten_keeps_mixed_operators() {
        let c = (leaf("a", "1") & (leaf("c", "y") | leaf("c", "z"))).flatten();
        match &c {
            Criterion::Combinator { operator, operands } => {
                assert_eq!(*operator, BoolOp::And);
                assert_eq!(operands.len(), 2);
                assert!(matches!(
                    &operands[1],
                    Criterion::Combinator { operator: BoolOp::Or, operands } if operands.len() == 2
                ));
            }
            other => panic!("expected combinator, got {:?}", other),
        }
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let c = ((leaf("a", "1") | leaf("b", "2")) & leaf("c", "3") & leaf("d", "4")).flatten();
        assert_eq!(c.clone().flatten(), c);
    }

    #[test]
    fn test_display() {
        let c = (leaf("a.b", "x") & (leaf("c.d", "y") | leaf("c.d", "z"))).flatten();
        assert_eq!(c.to_string(), r#"a.b == "x" && (c.d == "y" || c.d == "z")"#);
    }

    #[test]
    fn test_display_null_tests() {
        let path = Path::parse("source.node").unwrap();
        assert_eq!(Criterion::from(Leaf::not_null(path.clone())).to_string(), "source.node");
        assert_eq!(Criterion::from(Leaf::is_null(path)).to_string(), "!source.node");
    }

    #[test]
    fn test_display_escapes_value() {
        let c = leaf("a", r#"say "hi" \o/"#);
        assert_eq!(c.to_string(), r#"a == "say \"hi\" \\o/""#);
    }

    #[test]
    fn test_negate_applies_de_morgan() {
        let c = leaf("a", "1") & leaf("b", "2");
        let negated = !c;
        assert_eq!(
            negated,
            Criterion::Combinator {
                operator: BoolOp::Or,
                operands: vec![
                    Criterion::compare("a", Operator::NotEqual, "1").unwrap(),
                    Criterion::compare("b", Operator::NotEqual, "2").unwrap(),
                ],
            }
        );
    }

    #[test]
    fn test_leaf_polarity() {
        let path = Path::parse("a").unwrap();
        assert!(!Leaf::not_null(path.clone()).is_negative());
        assert!(Leaf::is_null(path.clone()).is_negative());
        assert!(Leaf::new(path.clone(), Operator::NotSubstr, Some("x".into())).is_negative());
        assert!(!Leaf::new(path, Operator::Lesser, Some(3i64.into())).is_negative());
    }

    #[test]
    fn test_assign_operators() {
        let mut c = Criterion::Empty;
        c |= leaf("a", "1");
        assert_eq!(c, leaf("a", "1"));
        c &= leaf("b", "2");
        assert_eq!(c.leaves().len(), 2);
    }

    #[test]
    fn test_json_persistence() {
        let c = (leaf("a", "1") | leaf("b", "2")).flatten();
        let json = serde_json::to_string(&c).unwrap();
        let back: Criterion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
