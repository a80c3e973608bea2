//! Backend-independent rewriting and lowering.

use super::{Backend, LeafContext};
use crate::criterion::{Criterion, Leaf, Value};
use crate::error::Result;
use crate::operator::Operator;
use crate::schema::{EntitySchema, ValueType};
use crate::transform::ValidateTransform;
use tracing::debug;

/// True if `value` contains `ch` not preceded by a backslash.
pub fn has_unescaped(value: &str, ch: char) -> bool {
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ch {
            return true;
        }
    }
    false
}

/// Wrap a substring operand in `*` unless it already holds an unescaped
/// wildcard.
pub fn wildcard(value: &str) -> String {
    if has_unescaped(value, '*') {
        value.to_string()
    } else {
        format!("*{}*", value)
    }
}

/// Rewrites validated criteria for one entity schema and lowers them
/// through a backend.
#[derive(Debug, Clone, Copy)]
pub struct BackendCompiler<'a> {
    schema: &'a EntitySchema,
}

impl<'a> BackendCompiler<'a> {
    pub fn new(schema: &'a EntitySchema) -> Self {
        Self { schema }
    }

    /// Check every leaf with [`ValidateTransform`], then apply the backend
    /// rewrite rules:
    ///
    /// - substring operands get implicit wildcards,
    /// - `path == None` on a text field also matches the empty string,
    /// - a negative leaf on an ambiguous path is pinned to the list's
    ///   default element.
    pub fn rewrite(&self, criterion: Criterion) -> Result<Criterion> {
        criterion
            .try_map_leaves(&mut |leaf| self.rewrite_leaf(leaf))
            .map(Criterion::flatten)
    }

    fn rewrite_leaf(&self, mut leaf: Leaf) -> Result<Criterion> {
        ValidateTransform.check_leaf(&leaf, self.schema)?;
        let value_type = self.schema.validate(&leaf.left)?.value_type;

        if leaf.is_negative() && self.schema.is_ambiguous(&leaf.left) {
            let indexed = self.schema.auto_index(&leaf.left);
            debug!(from = %leaf.left, to = %indexed, "pinned ambiguous path");
            leaf.left = indexed;
        }

        match leaf.right.take() {
            Some(value) if leaf.operator.is_substring() => {
                let text = wildcard(&value.to_text());
                debug!(path = %leaf.left, value = %text, "wildcarded substring operand");
                leaf.right = Some(Value::Text(text));
                Ok(leaf.into())
            }
            Some(value) => {
                leaf.right = Some(value);
                Ok(leaf.into())
            }
            None if leaf.operator == Operator::Equal && value_type == ValueType::Text => {
                debug!(path = %leaf.left, "absence test also matches empty string");
                let empty = Leaf::new(leaf.left.clone(), Operator::Equal, Some(Value::from("")));
                Ok(Criterion::from(leaf) | Criterion::from(empty))
            }
            None => Ok(leaf.into()),
        }
    }

    /// Rewrite then lower `criterion`. `Empty` compiles to `None`, meaning
    /// "no restriction".
    pub fn compile<B: Backend>(&self, backend: &B, criterion: Criterion) -> Result<Option<B::Expr>> {
        let rewritten = self.rewrite(criterion)?;
        self.lower(backend, &rewritten)
    }

    fn lower<B: Backend>(&self, backend: &B, criterion: &Criterion) -> Result<Option<B::Expr>> {
        match criterion {
            Criterion::Empty => Ok(None),
            Criterion::Leaf(leaf) => {
                let info = self.schema.validate(&leaf.left)?;
                let lists = self.schema.unindexed_lists(&leaf.left);
                let ctx = LeafContext {
                    entity: self.schema.name(),
                    info: &*info,
                    unindexed_lists: &lists,
                };
                backend.compile_criterion(leaf, &ctx).map(Some)
            }
            Criterion::Combinator { operator, operands } => {
                let mut exprs = Vec::with_capacity(operands.len());
                for operand in operands {
                    if let Some(expr) = self.lower(backend, operand)? {
                        exprs.push(expr);
                    }
                }
                match exprs.len() {
                    0 => Ok(None),
                    1 => Ok(exprs.pop()),
                    _ => backend.combine(*operator, exprs).map(Some),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::BoolOp;
    use crate::error::QueryError;
    use crate::path::Path;
    use crate::schema::{ListIndex, PathRegistry};
    use test_case::test_case;

    fn registry() -> PathRegistry {
        let mut registry = PathRegistry::new();
        registry
            .register_path("alert.source.node.name", ValueType::Text, true, false)
            .unwrap();
        registry
            .register_path("alert.analyzer.name", ValueType::Text, true, false)
            .unwrap();
        registry
            .register_path("alert.create_time", ValueType::DateTime, true, false)
            .unwrap();
        registry.register_list("alert.source", ListIndex::First).unwrap();
        registry.register_list("alert.analyzer", ListIndex::Last).unwrap();
        registry
    }

    fn leaf(path: &str, op: Operator, value: Option<&str>) -> Criterion {
        Criterion::leaf(Path::parse(path).unwrap(), op, value.map(Value::from))
    }

    fn rewrite(criterion: Criterion) -> Criterion {
        let registry = registry();
        BackendCompiler::new(registry.schema("alert").unwrap())
            .rewrite(criterion)
            .unwrap()
    }

    #[test_case("foo", "*foo*" ; "plain")]
    #[test_case("fo*", "fo*" ; "has wildcard")]
    #[test_case(r"fo\*", r"*fo\**" ; "escaped wildcard")]
    #[test_case("", "**" ; "empty")]
    fn test_wildcard(input: &str, expected: &str) {
        assert_eq!(wildcard(input), expected);
    }

    #[test]
    fn test_wildcard_is_idempotent() {
        for input in ["foo", "*", r"a\*b", ""] {
            assert_eq!(wildcard(&wildcard(input)), wildcard(input));
        }
    }

    #[test]
    fn test_substring_operands_are_wildcarded() {
        let out = rewrite(leaf("source(0).node.name", Operator::SubstrNocase, Some("web")));
        assert_eq!(out, leaf("source(0).node.name", Operator::SubstrNocase, Some("*web*")));
    }

    #[test]
    fn test_equality_operands_untouched() {
        let criterion = leaf("source(0).node.name", Operator::Equal, Some("web"));
        assert_eq!(rewrite(criterion.clone()), criterion);
    }

    #[test]
    fn test_absence_on_text_matches_empty() {
        let out = rewrite(leaf("source(0).node.name", Operator::Equal, None));
        assert_eq!(
            out,
            leaf("source(0).node.name", Operator::Equal, None)
                | leaf("source(0).node.name", Operator::Equal, Some(""))
        );
    }

    #[test]
    fn test_absence_on_datetime_unchanged() {
        let criterion = leaf("create_time", Operator::Equal, None);
        assert_eq!(rewrite(criterion.clone()), criterion);
    }

    #[test]
    fn test_negative_ambiguous_path_is_pinned() {
        let out = rewrite(leaf("source.node.name", Operator::NotEqual, Some("x")));
        assert_eq!(out, leaf("source(0).node.name", Operator::NotEqual, Some("x")));

        let out = rewrite(leaf("analyzer(*).name", Operator::NotSubstr, Some("x")));
        assert_eq!(out, leaf("analyzer(-1).name", Operator::NotSubstr, Some("*x*")));
    }

    #[test]
    fn test_positive_ambiguous_path_is_kept() {
        let criterion = leaf("source.node.name", Operator::Equal, Some("x"));
        assert_eq!(rewrite(criterion.clone()), criterion);
    }

    #[test]
    fn test_operator_not_allowed_for_type_fails() {
        let registry = registry();
        let criterion: Criterion = serde_json::from_str(
            r#"{"kind":"leaf","left":"create_time","operator":"<>","right":"2024"}"#,
        )
        .unwrap();
        let err = BackendCompiler::new(registry.schema("alert").unwrap())
            .compile(&crate::render::CriteriaTextBackend, criterion)
            .unwrap_err();
        assert_eq!(
            err,
            QueryError::InvalidOperator {
                path: "create_time".to_string(),
                operator: Operator::Substr,
                value_type: ValueType::DateTime,
            }
        );
    }

    #[test]
    fn test_null_test_with_ordering_fails() {
        let registry = registry();
        let err = BackendCompiler::new(registry.schema("alert").unwrap())
            .rewrite(leaf("create_time", Operator::Greater, None))
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidOperator { .. }));
    }

    #[test]
    fn test_rewrite_flattens_expansion() {
        let out = rewrite(
            leaf("create_time", Operator::Greater, Some("x"))
                | leaf("source(0).node.name", Operator::Equal, None),
        );
        match out {
            Criterion::Combinator { operator, operands } => {
                assert_eq!(operator, BoolOp::Or);
                assert_eq!(operands.len(), 3);
            }
            other => panic!("expected combinator, got {:?}", other),
        }
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let once = rewrite(
            leaf("source.node.name", Operator::NotSubstr, Some("x"))
                & leaf("create_time", Operator::Greater, Some("y")),
        );
        assert_eq!(rewrite(once.clone()), once);
    }
}
