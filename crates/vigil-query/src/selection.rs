//! Selection expressions: what a query returns rather than what it filters.
//!
//! A selection is a path, a function over other selections or a constant,
//! optionally followed by a `:extract` (`alert.create_time:year`) and a list
//! of `/commands` (`alert.classification.text/group_by,order_desc`).

use crate::criterion::Value;
use crate::path::Path;
use crate::schema::ValueType;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionKind {
    Path,
    Function,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SelectionExpr {
    Path { path: Path },
    Function { name: String, args: Vec<SelectionExpr> },
    Constant { value: Value },
}

impl SelectionExpr {
    pub fn kind(&self) -> SelectionKind {
        match self {
            Self::Path { .. } => SelectionKind::Path,
            Self::Function { .. } => SelectionKind::Function,
            Self::Constant { .. } => SelectionKind::Constant,
        }
    }

    /// Every path referenced by the expression, depth-first.
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            Self::Path { path } => vec![path],
            Self::Function { args, .. } => args.iter().flat_map(Self::paths).collect(),
            Self::Constant { .. } => Vec::new(),
        }
    }

    /// Type produced by the expression itself, when it does not depend on
    /// the schema.
    pub fn return_type(&self) -> Option<ValueType> {
        match self {
            Self::Path { .. } => None,
            Self::Function { name, .. } => match name.as_str() {
                "avg" => Some(ValueType::Float),
                "count" => Some(ValueType::Integer),
                "timezone" => Some(ValueType::DateTime),
                _ => None,
            },
            Self::Constant { .. } => Some(ValueType::Text),
        }
    }
}

impl fmt::Display for SelectionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path { path } => write!(f, "{}", path),
            Self::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Self::Constant { value } => write!(f, "{}", value),
        }
    }
}

/// A parsed selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub expr: SelectionExpr,
    /// Time component extracted from the value (`year`, `month`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract: Option<String>,
    /// Post-processing commands (`group_by`, `order_asc`, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<String>,
}

impl Selection {
    pub fn new(expr: SelectionExpr) -> Self {
        Self {
            expr,
            extract: None,
            commands: Vec::new(),
        }
    }

    pub fn kind(&self) -> SelectionKind {
        self.expr.kind()
    }

    /// The first path the selection reads, if any.
    pub fn path(&self) -> Option<&Path> {
        self.expr.paths().into_iter().next()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.expr.paths()
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }

    /// Result type known without the schema. An extraction always yields
    /// an integer.
    pub fn declared_type(&self) -> Option<ValueType> {
        if self.extract.is_some() {
            Some(ValueType::Integer)
        } else {
            self.expr.return_type()
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(extract) = &self.extract {
            write!(f, ":{}", extract)?;
        }
        if !self.commands.is_empty() {
            write!(f, "/{}", self.commands.join(","))?;
        }
        Ok(())
    }
}

/// A selection checked against the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSelection {
    pub selection: Selection,
    /// Result type, `None` for functions of unknown return type over
    /// constants only
    pub value_type: Option<ValueType>,
    /// Index-free form of the first referenced path
    pub canonical_path: Option<Path>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_expr(text: &str) -> SelectionExpr {
        SelectionExpr::Path {
            path: Path::parse(text).unwrap(),
        }
    }

    #[test]
    fn test_function_return_types() {
        let count = SelectionExpr::Function {
            name: "count".to_string(),
            args: vec![path_expr("alert.messageid")],
        };
        assert_eq!(count.return_type(), Some(ValueType::Integer));

        let custom = SelectionExpr::Function {
            name: "distinct".to_string(),
            args: vec![path_expr("alert.messageid")],
        };
        assert_eq!(custom.return_type(), None);
    }

    #[test]
    fn test_extract_forces_integer() {
        let mut selection = Selection::new(path_expr("alert.create_time"));
        assert_eq!(selection.declared_type(), None);
        selection.extract = Some("year".to_string());
        assert_eq!(selection.declared_type(), Some(ValueType::Integer));
    }

    #[test]
    fn test_paths_inside_functions() {
        let expr = SelectionExpr::Function {
            name: "timezone".to_string(),
            args: vec![
                path_expr("alert.create_time"),
                SelectionExpr::Constant {
                    value: Value::from("UTC"),
                },
            ],
        };
        let selection = Selection::new(expr);
        assert_eq!(selection.path().unwrap().to_string(), "alert.create_time");
        assert_eq!(selection.kind(), SelectionKind::Function);
    }

    #[test]
    fn test_display() {
        let selection = Selection {
            expr: SelectionExpr::Function {
                name: "count".to_string(),
                args: vec![path_expr("alert.source(0).node.name")],
            },
            extract: None,
            commands: vec!["group_by".to_string(), "order_desc".to_string()],
        };
        assert_eq!(
            selection.to_string(),
            "count(alert.source(0).node.name)/group_by,order_desc"
        );
    }
}
