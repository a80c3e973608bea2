//! Registry of entity schemas.

use super::{ListIndex, PathInfo, PathTranslation, PathValue, ValueType};
use crate::error::{QueryError, Result};
use crate::operator::Operator;
use crate::path::{Index, Path};
use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolves the type of paths an entity schema does not declare, e.g.
/// fields of a dynamically shaped payload.
pub trait TypeProvider: fmt::Debug + Send + Sync {
    /// Type of the entity-relative canonical `path`, `None` if unknown.
    fn value_type(&self, path: &Path) -> Option<ValueType>;
}

/// List container metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListInfo {
    /// Element used when an ambiguous path must designate one element
    pub default_index: ListIndex,
    /// Field whose value keys the elements of the list
    pub key: Option<String>,
}

/// The schema of one entity type. Paths are entity-relative.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    fields: HashMap<Path, PathInfo>,
    lists: HashMap<Path, ListInfo>,
    translations: HashMap<String, PathTranslation>,
    time_field: Option<Path>,
    type_provider: Option<Arc<dyn TypeProvider>>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: HashMap::new(),
            lists: HashMap::new(),
            translations: HashMap::new(),
            time_field: None,
            type_provider: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema entry for `path`, ignoring list indices.
    pub fn field(&self, path: &Path) -> Option<Cow<'_, PathInfo>> {
        let canonical = path.canonical();
        if let Some(info) = self.fields.get(&canonical) {
            return Some(Cow::Borrowed(info));
        }
        self.type_provider
            .as_ref()
            .and_then(|provider| provider.value_type(&canonical))
            .map(|ty| Cow::Owned(PathInfo::new(ty)))
    }

    /// Like [`field`](Self::field), failing with `UnknownPath`.
    pub fn validate(&self, path: &Path) -> Result<Cow<'_, PathInfo>> {
        self.field(path).ok_or_else(|| QueryError::unknown_path(path))
    }

    pub fn list(&self, path: &Path) -> Option<&ListInfo> {
        self.lists.get(&path.canonical())
    }

    pub fn is_list(&self, path: &Path) -> bool {
        self.list(path).is_some()
    }

    /// True when some list along the path is traversed without an explicit
    /// element index, so the path may designate several values.
    pub fn is_ambiguous(&self, path: &Path) -> bool {
        !self.unindexed_lists(path).is_empty()
    }

    /// Positions of the list segments `path` traverses without an explicit
    /// element index, in path order.
    pub fn unindexed_lists(&self, path: &Path) -> Vec<usize> {
        path.prefixes()
            .enumerate()
            .filter(|(n, prefix)| {
                !path.segments()[*n].has_explicit_index() && self.is_list(prefix)
            })
            .map(|(n, _)| n)
            .collect()
    }

    /// Pin every unindexed list segment to the list's default element.
    pub fn auto_index(&self, path: &Path) -> Path {
        let mut indexed = path.clone();
        for (n, prefix) in path.prefixes().enumerate() {
            let Some(list) = self.list(&prefix) else {
                continue;
            };
            let segment = &mut indexed.segments_mut()[n];
            if !segment.has_explicit_index() {
                segment.index = Some(Index::Position(list.default_index.position()));
            }
        }
        indexed
    }

    /// Path of the field keying the list that `path` is, or belongs to.
    pub fn indexation_key(&self, path: &Path) -> Result<Path> {
        let canonical = path.canonical();
        let keyed = |container: &Path| -> Option<Path> {
            let key = self.lists.get(container)?.key.as_deref()?;
            Some(container.child(key))
        };
        keyed(&canonical)
            .or_else(|| canonical.parent().and_then(|parent| keyed(&parent)))
            .ok_or_else(|| QueryError::unknown_path(path))
    }

    pub fn translation(&self, field: &str) -> Option<&PathTranslation> {
        self.translations.get(field)
    }

    pub fn time_field(&self) -> Option<&Path> {
        self.time_field.as_ref()
    }

    /// Public paths, sorted.
    pub fn paths(&self) -> Vec<&Path> {
        let mut paths: Vec<&Path> = self
            .fields
            .iter()
            .filter(|(_, info)| info.public)
            .map(|(path, _)| path)
            .collect();
        paths.sort_by_key(|path| path.to_string());
        paths
    }

    fn register(&mut self, path: Path, info: PathInfo) {
        if let Some(parent) = path.parent() {
            for prefix in parent.prefixes() {
                self.fields.entry(prefix).or_insert_with(PathInfo::container);
            }
            if info.indexed {
                self.lists.entry(parent).or_default().key = Some(path.name().to_string());
            } else if let Some(list) = self.lists.get_mut(&parent) {
                if list.key.as_deref() == Some(path.name()) {
                    list.key = None;
                }
            }
        }
        self.fields.insert(path, info);
    }

    fn check(&self) -> Result<()> {
        for (container, list) in &self.lists {
            if let Some(key) = &list.key {
                if !self.fields.contains_key(&container.child(key)) {
                    return Err(QueryError::AmbiguousIndex {
                        container: container.qualified(&self.name).to_string(),
                        key: key.clone(),
                    });
                }
            }
        }
        for translation in self.translations.values() {
            for path in &translation.paths {
                self.validate(path)?;
            }
        }
        if let Some(time_field) = &self.time_field {
            self.validate(time_field)?;
        }
        Ok(())
    }
}

/// All entity schemas known to the process.
///
/// Registration takes fully qualified paths (`alert.source.node.name`);
/// the first segment names the entity type.
#[derive(Debug, Clone, Default)]
pub struct PathRegistry {
    entities: HashMap<String, EntitySchema>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn split(path: &str) -> Result<(String, Path)> {
        let full = Path::parse(path)?;
        let (entity, relative) = full
            .strip_entity()
            .ok_or_else(|| QueryError::MalformedPath {
                path: path.to_string(),
                reason: "expected <entity>.<field>".to_string(),
            })?;
        Ok((entity.to_string(), relative.canonical()))
    }

    fn entity_mut(&mut self, entity: &str) -> &mut EntitySchema {
        self.entities
            .entry(entity.to_string())
            .or_insert_with(|| EntitySchema::new(entity))
    }

    fn field_mut(&mut self, path: &str) -> Result<&mut PathInfo> {
        let (entity, relative) = Self::split(path)?;
        self.entities
            .get_mut(&entity)
            .and_then(|schema| schema.fields.get_mut(&relative))
            .ok_or_else(|| QueryError::unknown_path(path))
    }

    /// Declare a path. Missing ancestors are declared as private
    /// containers. An `indexable` path keys the elements of its parent
    /// list.
    pub fn register_path(
        &mut self,
        path: &str,
        value_type: ValueType,
        public: bool,
        indexable: bool,
    ) -> Result<()> {
        let (entity, relative) = Self::split(path)?;
        let info = PathInfo {
            public,
            indexed: indexable,
            ..PathInfo::new(value_type)
        };
        debug!(%entity, path = %relative, %value_type, public, indexable, "registering path");
        self.entity_mut(&entity).register(relative, info);
        Ok(())
    }

    /// Declare `path` as a list container. The path is declared as a
    /// private container if needed.
    pub fn register_list(&mut self, path: &str, default_index: ListIndex) -> Result<()> {
        let (entity, relative) = Self::split(path)?;
        let schema = self.entity_mut(&entity);
        if !schema.fields.contains_key(&relative) {
            schema.register(relative.clone(), PathInfo::container());
        }
        schema.lists.entry(relative).or_default().default_index = default_index;
        Ok(())
    }

    /// Key the elements of the list at `path` by its child field `key`.
    /// The key field must be declared before [`check`](Self::check) runs.
    pub fn set_list_key(&mut self, path: &str, key: &str) -> Result<()> {
        let (entity, relative) = Self::split(path)?;
        self.entity_mut(&entity)
            .lists
            .entry(relative)
            .or_default()
            .key = Some(key.to_string());
        Ok(())
    }

    pub fn register_operators(&mut self, path: &str, operators: Vec<Operator>) -> Result<()> {
        self.field_mut(path)?.operators = operators;
        Ok(())
    }

    pub fn register_values(&mut self, path: &str, values: Vec<PathValue>) -> Result<()> {
        self.field_mut(path)?.values = Some(values);
        Ok(())
    }

    /// Make `field` (entity-relative, e.g. `classification`) stand for the
    /// translation's target paths.
    pub fn register_translation(
        &mut self,
        entity: &str,
        field: &str,
        translation: PathTranslation,
    ) {
        debug!(entity, field, targets = translation.paths.len(), "registering translation");
        self.entity_mut(entity)
            .translations
            .insert(field.to_string(), translation);
    }

    pub fn set_time_field(&mut self, path: &str) -> Result<()> {
        let (entity, relative) = Self::split(path)?;
        self.entity_mut(&entity).time_field = Some(relative);
        Ok(())
    }

    pub fn set_type_provider(&mut self, entity: &str, provider: Arc<dyn TypeProvider>) {
        self.entity_mut(entity).type_provider = Some(provider);
    }

    pub fn schema(&self, entity: &str) -> Result<&EntitySchema> {
        self.entities
            .get(entity)
            .ok_or_else(|| QueryError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    /// Schema entry of an entity-relative path.
    pub fn validate(&self, entity: &str, path: &Path) -> Result<Cow<'_, PathInfo>> {
        self.schema(entity)?.validate(path)
    }

    /// Schema entry of a fully qualified path.
    pub fn path_info(&self, path: &str) -> Result<Cow<'_, PathInfo>> {
        let full = Path::parse(path)?;
        let (entity, relative) = full
            .strip_entity()
            .ok_or_else(|| QueryError::unknown_path(path))?;
        self.schema(entity)?
            .field(&relative)
            .ok_or_else(|| QueryError::unknown_path(path))
    }

    /// Type of a fully qualified path, public or not.
    pub fn get_path_type(&self, path: &str) -> Result<ValueType> {
        Ok(self.path_info(path)?.value_type)
    }

    pub fn is_ambiguous(&self, entity: &str, path: &Path) -> Result<bool> {
        Ok(self.schema(entity)?.is_ambiguous(path))
    }

    /// Fully qualified path of the field keying the list `path` is, or
    /// belongs to.
    pub fn get_indexation_key(&self, path: &str) -> Result<Path> {
        let full = Path::parse(path)?;
        let (entity, relative) = full
            .strip_entity()
            .ok_or_else(|| QueryError::unknown_path(path))?;
        let key = self
            .schema(entity)?
            .indexation_key(&relative)
            .map_err(|_| QueryError::unknown_path(path))?;
        Ok(key.qualified(entity))
    }

    /// Public paths of an entity, fully qualified and sorted.
    pub fn paths(&self, entity: &str) -> Result<Vec<Path>> {
        Ok(self
            .schema(entity)?
            .paths()
            .into_iter()
            .map(|path| path.qualified(entity))
            .collect())
    }

    /// Verify cross references: list keys, translation targets and time
    /// fields must all be declared.
    pub fn check(&self) -> Result<()> {
        for schema in self.entities.values() {
            schema.check()?;
        }
        Ok(())
    }
}

/// A registry that can be swapped atomically while requests hold the
/// previous snapshot.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<RwLock<Arc<PathRegistry>>>,
}

impl SharedRegistry {
    pub fn new(registry: PathRegistry) -> Result<Self> {
        registry.check()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(registry))),
        })
    }

    /// The current registry. Later replacements do not affect it.
    pub fn snapshot(&self) -> Arc<PathRegistry> {
        self.inner.read().clone()
    }

    /// Install a new registry after checking it. On error the current
    /// registry stays in place.
    pub fn replace(&self, registry: PathRegistry) -> Result<()> {
        registry.check()?;
        let entities = registry.entities.len();
        *self.inner.write() = Arc::new(registry);
        info!(entities, "schema registry replaced");
        Ok(())
    }
}
