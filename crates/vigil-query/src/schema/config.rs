//! TOML schema definitions.
//!
//! ```toml
//! [[entities]]
//! name = "alert"
//! time_field = "create_time"
//!
//! [[entities.fields]]
//! path = "source.node.address.address"
//! type = "text"
//!
//! [[entities.lists]]
//! path = "source"
//! index = "first"
//!
//! [[entities.translations]]
//! field = "classification"
//! paths = ["classification.text", "classification.ident"]
//! ```

use super::{ListIndex, PathRegistry, PathTranslation, PathValue, ValueType};
use crate::error::QueryError;
use crate::operator::Operator;
use crate::path::Path;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

/// Errors raised while loading a schema definition.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The schema file could not be read.
    #[error("failed to read schema file {path}: {source}")]
    Io {
        /// Location of the file
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema layout.
    #[error("invalid schema definition: {0}")]
    Toml(#[from] toml::de::Error),

    /// The definition parsed but describes an inconsistent schema.
    #[error(transparent)]
    Invalid(#[from] QueryError),
}

/// Top level of a schema file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

/// One entity type and its fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Entity type name, the first segment of every qualified path
    pub name: String,

    /// Field holding the entity's timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_field: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldConfig>,

    #[serde(default)]
    pub lists: Vec<ListConfig>,

    #[serde(default)]
    pub translations: Vec<TranslationConfig>,
}

/// A declared field. Paths are relative to the entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfig {
    pub path: String,

    #[serde(rename = "type")]
    pub value_type: ValueType,

    /// Listed among the entity's paths
    #[serde(default = "default_public")]
    pub public: bool,

    /// The field keys the elements of its parent list
    #[serde(default)]
    pub index: bool,

    /// Replaces the operators implied by the value type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operators: Option<Vec<Operator>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<PathValue>>,
}

fn default_public() -> bool {
    true
}

/// A list container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListConfig {
    pub path: String,

    #[serde(default)]
    pub index: ListIndex,

    /// Child field keying the elements; must be declared as a field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A logical field expanding to several concrete paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationConfig {
    pub field: String,
    pub paths: Vec<String>,
}

impl SchemaConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, SchemaError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SchemaError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|source| SchemaError::Io {
            path: path.clone(),
            source,
        })?;
        info!(path = %path.display(), "loading schema definition");
        Self::from_toml_str(&content)
    }

    /// Build and check a registry from this definition.
    pub fn build(&self) -> Result<PathRegistry, SchemaError> {
        let mut registry = PathRegistry::new();
        for entity in &self.entities {
            entity.apply(&mut registry)?;
        }
        registry.check()?;
        info!(entities = self.entities.len(), "schema registry built");
        Ok(registry)
    }
}

impl EntityConfig {
    fn qualify(&self, path: &str) -> String {
        format!("{}.{}", self.name, path)
    }

    fn apply(&self, registry: &mut PathRegistry) -> Result<(), QueryError> {
        for field in &self.fields {
            let qualified = self.qualify(&field.path);
            registry.register_path(&qualified, field.value_type, field.public, field.index)?;
            if let Some(operators) = &field.operators {
                registry.register_operators(&qualified, operators.clone())?;
            }
            if let Some(values) = &field.values {
                registry.register_values(&qualified, values.clone())?;
            }
        }

        for list in &self.lists {
            let qualified = self.qualify(&list.path);
            registry.register_list(&qualified, list.index)?;
            if let Some(key) = &list.key {
                registry.set_list_key(&qualified, key)?;
            }
        }

        for translation in &self.translations {
            let paths = translation
                .paths
                .iter()
                .map(|p| Path::parse(p))
                .collect::<Result<Vec<_>, _>>()?;
            registry.register_translation(&self.name, &translation.field, PathTranslation::new(paths));
        }

        if let Some(time_field) = &self.time_field {
            registry.set_time_field(&self.qualify(time_field))?;
        }

        Ok(())
    }
}

impl PathRegistry {
    pub fn from_config(config: &SchemaConfig) -> Result<Self, SchemaError> {
        config.build()
    }
}
