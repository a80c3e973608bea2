//! Per-entity field schemas.
//!
//! Every entity type (`alert`, `heartbeat`, ...) declares the paths it
//! exposes, their value types, which operators they accept, which
//! containers are lists and how lists are keyed. The registry is the source
//! of truth for validation, translation and backend compilation.

mod config;
mod registry;

pub use config::{
    EntityConfig, FieldConfig, ListConfig, SchemaConfig, SchemaError, TranslationConfig,
};
pub use registry::{EntitySchema, ListInfo, PathRegistry, SharedRegistry, TypeProvider};

use crate::criterion::{BoolOp, Leaf, Value};
use crate::operator::{Operator, COMPARISONS};
use crate::path::Path;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Type of the value stored at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Text,
    Bytes,
    Integer,
    Float,
    DateTime,
    Enum,
    /// A container of other fields
    Object,
}

impl ValueType {
    /// Operators accepted by a field of this type unless the schema says
    /// otherwise.
    pub fn default_operators(self) -> Vec<Operator> {
        use Operator::*;
        match self {
            Self::Text | Self::Enum => COMPARISONS.to_vec(),
            Self::Bytes | Self::Integer | Self::Float | Self::DateTime => vec![
                Equal,
                NotEqual,
                Lesser,
                LesserOrEqual,
                Greater,
                GreaterOrEqual,
            ],
            Self::Object => vec![Equal, NotEqual],
        }
    }

    pub fn is_textual(self) -> bool {
        matches!(self, Self::Text | Self::Enum)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::DateTime => "datetime",
            Self::Enum => "enum",
            Self::Object => "object",
        })
    }
}

/// One suggested value of an enumerated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl PathValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: None,
            color: None,
        }
    }
}

/// Element picked when an ambiguous list path must designate one element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListIndex {
    #[default]
    First,
    Last,
}

impl ListIndex {
    pub fn position(self) -> i64 {
        match self {
            Self::First => 0,
            Self::Last => -1,
        }
    }
}

/// Everything the schema knows about one path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathInfo {
    pub value_type: ValueType,
    pub operators: Vec<Operator>,
    /// Listed in [`EntitySchema::paths`]; private paths stay queryable
    pub public: bool,
    /// The field keys the elements of its parent list
    pub indexed: bool,
    pub values: Option<Vec<PathValue>>,
}

impl PathInfo {
    pub fn new(value_type: ValueType) -> Self {
        Self {
            value_type,
            operators: value_type.default_operators(),
            public: true,
            indexed: false,
            values: None,
        }
    }

    /// Implicitly declared ancestor of a registered path.
    pub fn container() -> Self {
        Self {
            public: false,
            ..Self::new(ValueType::Object)
        }
    }

    pub fn allows(&self, operator: Operator) -> bool {
        self.operators.contains(&operator)
    }
}

/// Maps a translated value before it is compared against the target paths.
pub type ValueMap = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// A logical field that stands for several concrete paths.
///
/// `classification` may expand to `classification.text` and
/// `classification.ident`; a positive test matches if any target matches,
/// a negative one only if all of them do.
#[derive(Clone)]
pub struct PathTranslation {
    pub paths: Vec<Path>,
    pub value_map: Option<ValueMap>,
}

impl PathTranslation {
    pub fn new(paths: Vec<Path>) -> Self {
        Self {
            paths,
            value_map: None,
        }
    }

    pub fn with_value_map<F>(mut self, map: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.value_map = Some(Arc::new(map));
        self
    }

    /// How the expanded leaves are joined for `leaf`.
    pub fn combinator_for(&self, leaf: &Leaf) -> BoolOp {
        if leaf.is_negative() {
            BoolOp::And
        } else {
            BoolOp::Or
        }
    }

    pub fn map_value(&self, value: Value) -> Value {
        match &self.value_map {
            Some(map) => map(&value),
            None => value,
        }
    }
}

impl fmt::Debug for PathTranslation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathTranslation")
            .field("paths", &self.paths)
            .field("value_map", &self.value_map.is_some())
            .finish()
    }
}
