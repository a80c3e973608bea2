//! SQLite backend.
//!
//! Renders criteria to a `WHERE` fragment over entities stored as JSON
//! documents, one row per entity:
//!
//! ```sql
//! CREATE TABLE alert (
//!     id INTEGER PRIMARY KEY,
//!     document TEXT NOT NULL  -- JSON
//! );
//! ```
//!
//! Fields are read with `json_extract`. A path crossing a list without an
//! element index matches when any element does, through `EXISTS` over
//! `json_each`. Values are bound as positional parameters, in order of
//! appearance.

use super::{Backend, LeafContext};
use crate::criterion::{BoolOp, Leaf, Value};
use crate::error::{QueryError, Result};
use crate::operator::Operator;
use crate::path::{Index, Segment};
use crate::schema::ValueType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

/// JSON object keys that need no quoting in a JSON path
static PLAIN_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"));

/// Output from rendering
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    /// SQL boolean expression with `?` placeholders
    pub sql: String,
    /// Parameters to bind, in placeholder order
    pub params: Vec<JsonValue>,
}

/// SQLite backend with a configurable document column.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    /// Column holding the JSON document
    pub document_column: String,
}

impl Default for SqliteBackend {
    fn default() -> Self {
        Self {
            document_column: "document".to_string(),
        }
    }
}

impl SqliteBackend {
    /// Create backend reading documents from `column`
    pub fn with_column(column: impl Into<String>) -> Self {
        Self {
            document_column: column.into(),
        }
    }

    fn reject(&self, leaf: &Leaf, reason: impl Into<String>) -> QueryError {
        QueryError::rejected(self.name(), leaf, reason)
    }

    /// `$.source[0].node.name` for `source(0).node.name`. Unindexed list
    /// segments add no subscript.
    fn json_path(&self, leaf: &Leaf, segments: &[Segment]) -> Result<String> {
        let mut out = String::from("$");
        for segment in segments {
            if PLAIN_KEY.is_match(&segment.name) {
                out.push('.');
                out.push_str(&segment.name);
            } else {
                out.push_str(&format!(".\"{}\"", segment.name));
            }
            match &segment.index {
                Some(Index::Position(n)) if *n >= 0 => out.push_str(&format!("[{}]", n)),
                Some(Index::Position(n)) => out.push_str(&format!("[#{}]", n)),
                Some(Index::Key(_)) => {
                    return Err(self.reject(leaf, "string-keyed list indices are not supported"))
                }
                Some(Index::Any) | None => {}
            }
        }
        Ok(out)
    }

    /// Column expression of the leaf path, plus one `json_each` source per
    /// list traversed without an index. Each source iterates the elements
    /// of its list within the element picked by the previous one.
    fn column(&self, leaf: &Leaf, lists: &[usize]) -> Result<(String, Vec<String>)> {
        let segments = leaf.left.segments();
        let mut document = self.document_column.clone();
        let mut sources = Vec::with_capacity(lists.len());
        let mut start = 0;
        for (n, &end) in lists.iter().enumerate() {
            let alias = format!("each{}", n);
            sources.push(format!(
                "json_each({}, '{}') AS {}",
                document,
                self.json_path(leaf, &segments[start..=end])?,
                alias
            ));
            document = format!("{}.value", alias);
            start = end + 1;
        }
        let column = if start == segments.len() {
            document
        } else {
            format!(
                "json_extract({}, '{}')",
                document,
                self.json_path(leaf, &segments[start..])?
            )
        };
        Ok((column, sources))
    }

    /// Predicate over `column`, the value the leaf path designates.
    fn predicate(&self, leaf: &Leaf, ctx: &LeafContext<'_>, column: String) -> Result<RenderedQuery> {
        let Some(value) = &leaf.right else {
            return match leaf.operator {
                Operator::Equal => Ok(RenderedQuery {
                    sql: format!("{} IS NULL", column),
                    params: Vec::new(),
                }),
                Operator::NotEqual => Ok(RenderedQuery {
                    sql: format!("{} IS NOT NULL", column),
                    params: Vec::new(),
                }),
                _ => Err(self.reject(leaf, "null tests only support == and !=")),
            };
        };

        if leaf.operator.is_regex() {
            return Err(self.reject(leaf, "regular expressions are not available"));
        }

        let bind = || self.bind(leaf, value, ctx.info.value_type);
        let (sql, param) = match leaf.operator {
            Operator::Equal => (format!("{} = ?", column), bind()?),
            Operator::NotEqual => (format!("{} != ?", column), bind()?),
            Operator::EqualNocase => (format!("{} = ? COLLATE NOCASE", column), bind()?),
            Operator::NotEqualNocase => (format!("{} != ? COLLATE NOCASE", column), bind()?),
            Operator::Substr | Operator::NotSubstr => {
                let not = if leaf.operator.is_negated() { "NOT " } else { "" };
                (
                    format!("{} {}GLOB ?", column, not),
                    JsonValue::String(glob_pattern(&value.to_text())),
                )
            }
            Operator::SubstrNocase | Operator::NotSubstrNocase => {
                let not = if leaf.operator.is_negated() { "NOT " } else { "" };
                (
                    format!("{} {}LIKE ? ESCAPE '\\'", column, not),
                    JsonValue::String(glob_to_like(&value.to_text())),
                )
            }
            Operator::Lesser => (format!("{} < ?", column), bind()?),
            Operator::LesserOrEqual => (format!("{} <= ?", column), bind()?),
            Operator::Greater => (format!("{} > ?", column), bind()?),
            Operator::GreaterOrEqual => (format!("{} >= ?", column), bind()?),
            _ => return Err(self.reject(leaf, "not a comparison operator")),
        };

        Ok(RenderedQuery {
            sql,
            params: vec![param],
        })
    }

    fn float(&self, leaf: &Leaf, f: f64) -> Result<JsonValue> {
        serde_json::Number::from_f64(f)
            .map(JsonValue::Number)
            .ok_or_else(|| self.reject(leaf, "non-finite number"))
    }

    /// Convert the operand to a JSON parameter. Text operands of numeric
    /// fields are bound as numbers so `json_extract` compares numerically.
    fn bind(&self, leaf: &Leaf, value: &Value, value_type: ValueType) -> Result<JsonValue> {
        match (value, value_type) {
            (Value::Text(s), ValueType::Integer) => s
                .trim()
                .parse::<i64>()
                .map(JsonValue::from)
                .map_err(|_| self.reject(leaf, "expected an integer")),
            (Value::Text(s), ValueType::Float) => {
                let f = s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| self.reject(leaf, "expected a number"))?;
                self.float(leaf, f)
            }
            (Value::Boolean(b), _) => Ok(JsonValue::Bool(*b)),
            (Value::Integer(n), _) => Ok(JsonValue::from(*n)),
            (Value::Float(f), _) => self.float(leaf, *f),
            (Value::Text(s), _) => Ok(JsonValue::String(s.clone())),
        }
    }
}

/// Translate a `*` wildcard pattern to a LIKE pattern escaped with `\`.
fn glob_to_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(next @ ('%' | '_' | '\\')) => {
                    out.push('\\');
                    out.push(next);
                }
                Some(next) => out.push(next),
                None => out.push_str("\\\\"),
            },
            '*' => out.push('%'),
            '%' | '_' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Translate a `*` wildcard pattern to a GLOB pattern. `\*` matches a
/// literal star. Other GLOB metacharacters always match literally.
fn glob_pattern(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('*') => out.push_str("[*]"),
                Some('?') => out.push_str("[?]"),
                Some('[') => out.push_str("[[]"),
                Some(next) => out.push(next),
                None => out.push('\\'),
            },
            '?' => out.push_str("[?]"),
            '[' => out.push_str("[[]"),
            _ => out.push(c),
        }
    }
    out
}

impl Backend for SqliteBackend {
    type Expr = RenderedQuery;

    fn name(&self) -> &str {
        "sqlite"
    }

    fn compile_criterion(&self, leaf: &Leaf, ctx: &LeafContext<'_>) -> Result<RenderedQuery> {
        let (column, sources) = self.column(leaf, ctx.unindexed_lists)?;
        let mut query = self.predicate(leaf, ctx, column)?;
        if !sources.is_empty() {
            query.sql = format!(
                "EXISTS (SELECT 1 FROM {} WHERE {})",
                sources.join(", "),
                query.sql
            );
        }
        Ok(query)
    }

    fn combine(&self, operator: BoolOp, operands: Vec<RenderedQuery>) -> Result<RenderedQuery> {
        let joiner = match operator {
            BoolOp::And => " AND ",
            BoolOp::Or => " OR ",
        };
        let mut sql = Vec::with_capacity(operands.len());
        let mut params = Vec::new();
        for operand in operands {
            sql.push(operand.sql);
            params.extend(operand.params);
        }
        Ok(RenderedQuery {
            sql: format!("({})", sql.join(joiner)),
            params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criterion::Criterion;
    use crate::render::BackendCompiler;
    use crate::schema::{ListIndex, PathRegistry, ValueType};
    use crate::syntax::Grammar;

    fn registry() -> PathRegistry {
        let mut registry = PathRegistry::new();
        registry
            .register_path("alert.source.node.name", ValueType::Text, true, false)
            .unwrap();
        registry
            .register_path("alert.additional_data.meaning", ValueType::Text, true, true)
            .unwrap();
        registry
            .register_path("alert.additional_data.data", ValueType::Text, true, false)
            .unwrap();
        registry
            .register_path("alert.messageid", ValueType::Integer, true, false)
            .unwrap();
        registry
            .register_path("alert.correlation-id", ValueType::Text, true, false)
            .unwrap();
        registry
            .register_path("alert.source.node.address.address", ValueType::Text, true, false)
            .unwrap();
        registry
            .register_path("alert.tags", ValueType::Text, true, false)
            .unwrap();
        registry.register_list("alert.source", ListIndex::First).unwrap();
        registry
            .register_list("alert.source.node.address", ListIndex::First)
            .unwrap();
        registry
            .register_list("alert.additional_data", ListIndex::First)
            .unwrap();
        registry.register_list("alert.tags", ListIndex::First).unwrap();
        registry
    }

    fn render(text: &str) -> Result<Option<RenderedQuery>> {
        let registry = registry();
        let criterion = Grammar::new().parse_criteria(text)?;
        BackendCompiler::new(registry.schema("alert")?).compile(&SqliteBackend::default(), criterion)
    }

    fn text(s: &str) -> JsonValue {
        JsonValue::String(s.to_string())
    }

    // =========================================================================
    // Leaf rendering
    // =========================================================================

    #[test]
    fn test_render_equality() {
        let result = render("source(0).node.name == web").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "json_extract(document, '$.source[0].node.name') = ?"
        );
        assert_eq!(result.params, vec![text("web")]);
    }

    #[test]
    fn test_render_last_element() {
        let result = render("source(-1).node.name != web").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "json_extract(document, '$.source[#-1].node.name') != ?"
        );
    }

    #[test]
    fn test_render_quoted_key() {
        let result = render("correlation-id == x").unwrap().unwrap();
        assert_eq!(result.sql, "json_extract(document, '$.\"correlation-id\"') = ?");
    }

    #[test]
    fn test_render_substring_as_glob() {
        let result = render("source(0).node.name <> web").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "json_extract(document, '$.source[0].node.name') GLOB ?"
        );
        assert_eq!(result.params, vec![text("*web*")]);
    }

    #[test]
    fn test_render_nocase_substring_as_like() {
        let result = render(r"source(0).node.name !<>* 100%\*").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "json_extract(document, '$.source[0].node.name') NOT LIKE ? ESCAPE '\\'"
        );
        assert_eq!(result.params, vec![text(r"%100\%*%")]);
    }

    #[test]
    fn test_render_absence_on_text() {
        let result = render("!source(0).node.name").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "(json_extract(document, '$.source[0].node.name') IS NULL OR json_extract(document, '$.source[0].node.name') = ?)"
        );
        assert_eq!(result.params, vec![text("")]);
    }

    #[test]
    fn test_render_presence() {
        let result = render("messageid").unwrap().unwrap();
        assert_eq!(result.sql, "json_extract(document, '$.messageid') IS NOT NULL");
        assert!(result.params.is_empty());
    }

    #[test]
    fn test_render_typed_parameter() {
        let registry = registry();
        let criterion = Criterion::compare("messageid", Operator::Greater, 10i64).unwrap();
        let result = BackendCompiler::new(registry.schema("alert").unwrap())
            .compile(&SqliteBackend::default(), criterion)
            .unwrap()
            .unwrap();
        assert_eq!(result.params, vec![JsonValue::from(10)]);
    }

    #[test]
    fn test_render_combined_params_in_order() {
        let result = render("source(0).node.name == a && (messageid == 1 || messageid == 2)")
            .unwrap()
            .unwrap();
        assert_eq!(
            result.sql,
            "(json_extract(document, '$.source[0].node.name') = ? AND (json_extract(document, '$.messageid') = ? OR json_extract(document, '$.messageid') = ?))"
        );
        assert_eq!(
            result.params,
            vec![text("a"), JsonValue::from(1), JsonValue::from(2)]
        );
    }

    #[test]
    fn test_reject_non_numeric_operand() {
        let err = render("messageid > ten").unwrap_err();
        assert!(matches!(err, QueryError::CriterionCompile { ref reason, .. } if reason == "expected an integer"));
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render("").unwrap(), None);
    }

    #[test]
    fn test_custom_column() {
        let registry = registry();
        let criterion = Grammar::new().parse_criteria("messageid == 1").unwrap();
        let result = BackendCompiler::new(registry.schema("alert").unwrap())
            .compile(&SqliteBackend::with_column("payload"), criterion)
            .unwrap()
            .unwrap();
        assert_eq!(result.sql, "json_extract(payload, '$.messageid') = ?");
    }

    // =========================================================================
    // Rejections
    // =========================================================================

    #[test]
    fn test_reject_regex() {
        let err = render("source(0).node.name ~ ^web").unwrap_err();
        assert!(matches!(err, QueryError::CriterionCompile { ref backend, .. } if backend == "sqlite"));
    }

    #[test]
    fn test_reject_keyed_index() {
        let err = render("additional_data(\"Ip\").data == 1.2.3.4").unwrap_err();
        assert!(matches!(err, QueryError::CriterionCompile { .. }));
    }

    #[test]
    fn test_negative_unindexed_list_is_pinned_first() {
        let result = render("source.node.name != web").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "json_extract(document, '$.source[0].node.name') != ?"
        );
    }

    // =========================================================================
    // Lists without an index
    // =========================================================================

    #[test]
    fn test_unindexed_list_matches_any_element() {
        let result = render("source.node.name == web").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "EXISTS (SELECT 1 FROM json_each(document, '$.source') AS each0 WHERE json_extract(each0.value, '$.node.name') = ?)"
        );
        assert_eq!(result.params, vec![text("web")]);
    }

    #[test]
    fn test_wildcard_index_matches_any_element() {
        let result = render("source(*).node.name <> web").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "EXISTS (SELECT 1 FROM json_each(document, '$.source') AS each0 WHERE json_extract(each0.value, '$.node.name') GLOB ?)"
        );
        assert_eq!(result.params, vec![text("*web*")]);
    }

    #[test]
    fn test_nested_unindexed_lists_chain_sources() {
        let result = render("source.node.address.address == 10.0.0.1").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "EXISTS (SELECT 1 FROM json_each(document, '$.source') AS each0, json_each(each0.value, '$.node.address') AS each1 WHERE json_extract(each1.value, '$.address') = ?)"
        );
    }

    #[test]
    fn test_unindexed_list_presence() {
        let result = render("source.node.name").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "EXISTS (SELECT 1 FROM json_each(document, '$.source') AS each0 WHERE json_extract(each0.value, '$.node.name') IS NOT NULL)"
        );
        assert!(result.params.is_empty());
    }

    #[test]
    fn test_unindexed_list_of_values() {
        let result = render("tags == urgent").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "EXISTS (SELECT 1 FROM json_each(document, '$.tags') AS each0 WHERE each0.value = ?)"
        );
    }

    #[test]
    fn test_unindexed_list_inside_indexed_one() {
        let result = render("source(-1).node.address.address == x").unwrap().unwrap();
        assert_eq!(
            result.sql,
            "EXISTS (SELECT 1 FROM json_each(document, '$.source[#-1].node.address') AS each0 WHERE json_extract(each0.value, '$.address') = ?)"
        );
    }

    // =========================================================================
    // Pattern helpers
    // =========================================================================

    #[test]
    fn test_glob_to_like() {
        assert_eq!(glob_to_like("*a_b*"), r"%a\_b%");
        assert_eq!(glob_to_like(r"\*x"), "*x");
    }

    #[test]
    fn test_glob_pattern() {
        assert_eq!(glob_pattern(r"*a\*[b]?*"), "*a[*][[]b][?]*");
        assert_eq!(glob_pattern(r"a\?b\[c"), "a[?]b[[]c");
        assert_eq!(glob_pattern(r"\\x\"), r"\x\");
    }

    #[test]
    fn test_render_escaped_glob_metacharacters() {
        let result = render(r#"source(0).node.name <> "a\?b\[c""#).unwrap().unwrap();
        assert_eq!(result.params, vec![text("*a[?]b[[]c*")]);
    }
}
