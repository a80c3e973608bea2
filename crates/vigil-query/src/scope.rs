//! Per-request parsing and resolution.
//!
//! A [`RequestScope`] lives for one external request. It pins a registry
//! snapshot, so a concurrent schema reload never changes the answers of a
//! request in flight, and memoizes selection and criteria resolution.
//! Dropping the scope discards the cache.

use crate::criterion::Criterion;
use crate::error::{QueryError, Result};
use crate::path::Path;
use crate::render::{Backend, BackendCompiler};
use crate::schema::{PathRegistry, ValueType};
use crate::selection::{ResolvedSelection, Selection};
use crate::syntax::Grammar;
use crate::transform::{CompileOptions, TransformPipeline};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct RequestCache {
    selections: HashMap<String, ResolvedSelection>,
    criteria: HashMap<(String, String), Criterion>,
    hits: usize,
}

#[derive(Debug)]
pub struct RequestScope<'g> {
    grammar: &'g Grammar,
    registry: Arc<PathRegistry>,
    options: CompileOptions,
    pipeline: TransformPipeline,
    cache: RequestCache,
}

impl<'g> RequestScope<'g> {
    pub fn new(grammar: &'g Grammar, registry: Arc<PathRegistry>) -> Self {
        Self::with_options(grammar, registry, CompileOptions::default())
    }

    pub fn with_options(
        grammar: &'g Grammar,
        registry: Arc<PathRegistry>,
        options: CompileOptions,
    ) -> Self {
        Self {
            grammar,
            registry,
            options,
            pipeline: TransformPipeline::standard(options),
            cache: RequestCache::default(),
        }
    }

    pub fn registry(&self) -> &PathRegistry {
        &self.registry
    }

    pub fn options(&self) -> CompileOptions {
        self.options
    }

    /// Number of answers served from the cache so far.
    pub fn cache_hits(&self) -> usize {
        self.cache.hits
    }

    /// Parse a selection and resolve it against the schema. Every path it
    /// references must exist; the result type comes from the selection
    /// itself when it fixes one, else from the schema type of its first
    /// path.
    pub fn parse_and_resolve(&mut self, text: &str) -> Result<ResolvedSelection> {
        if let Some(hit) = self.cache.selections.get(text) {
            self.cache.hits += 1;
            debug!(selection = text, "selection cache hit");
            return Ok(hit.clone());
        }

        let selection = self.grammar.parse_selection(text)?;
        let (value_type, canonical_path) = self.resolve(&selection)?;
        let resolved = ResolvedSelection {
            selection,
            value_type,
            canonical_path,
        };

        self.cache
            .selections
            .insert(text.to_string(), resolved.clone());
        Ok(resolved)
    }

    /// Alias of [`parse_and_resolve`](Self::parse_and_resolve).
    pub fn resolve_selection(&mut self, text: &str) -> Result<ResolvedSelection> {
        self.parse_and_resolve(text)
    }

    /// Resolve several selections, returning them with their result types
    /// in input order.
    pub fn resolve_selections<I, S>(
        &mut self,
        texts: I,
    ) -> Result<(Vec<Selection>, Vec<Option<ValueType>>)>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selections = Vec::new();
        let mut types = Vec::new();
        for text in texts {
            let resolved = self.parse_and_resolve(text.as_ref())?;
            selections.push(resolved.selection);
            types.push(resolved.value_type);
        }
        Ok((selections, types))
    }

    fn resolve(&self, selection: &Selection) -> Result<(Option<ValueType>, Option<Path>)> {
        let mut first = None;
        for path in selection.paths() {
            let value_type = self.path_type(path)?;
            first.get_or_insert((value_type, path.canonical()));
        }
        Ok(match first {
            Some((value_type, canonical)) => (
                selection.declared_type().or(Some(value_type)),
                Some(canonical),
            ),
            None => (selection.declared_type(), None),
        })
    }

    fn path_type(&self, path: &Path) -> Result<ValueType> {
        let (entity, relative) = path
            .strip_entity()
            .ok_or_else(|| QueryError::unknown_path(path))?;
        self.registry
            .validate(entity, &relative)
            .map(|info| info.value_type)
            .map_err(|err| match err {
                QueryError::UnknownPath { .. } | QueryError::UnknownEntity { .. } => {
                    QueryError::unknown_path(path)
                }
                other => other,
            })
    }

    /// Parse a filter for `entity`, then translate and validate it.
    pub fn criteria(&mut self, entity: &str, text: &str) -> Result<Criterion> {
        let key = (entity.to_string(), text.to_string());
        if let Some(hit) = self.cache.criteria.get(&key) {
            self.cache.hits += 1;
            debug!(entity, criteria = text, "criteria cache hit");
            return Ok(hit.clone());
        }

        let schema = self.registry.schema(entity)?;
        let parsed = self.grammar.parse_criteria(text)?;
        let criterion = self.pipeline.run(parsed, schema)?;

        self.cache.criteria.insert(key, criterion.clone());
        Ok(criterion)
    }

    /// Compile an already validated criterion for `entity`.
    pub fn compile<B: Backend>(
        &self,
        backend: &B,
        entity: &str,
        criterion: Criterion,
    ) -> Result<Option<B::Expr>> {
        BackendCompiler::new(self.registry.schema(entity)?).compile(backend, criterion)
    }

    /// [`criteria`](Self::criteria) followed by [`compile`](Self::compile).
    pub fn compile_text<B: Backend>(
        &mut self,
        backend: &B,
        entity: &str,
        text: &str,
    ) -> Result<Option<B::Expr>> {
        let criterion = self.criteria(entity, text)?;
        self.compile(backend, entity, criterion)
    }
}
