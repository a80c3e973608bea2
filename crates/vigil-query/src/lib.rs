//! Criteria language, schema registry and backend compiler for security
//! event queries.
//!
//! Filters are written in a small boolean language over dotted field paths:
//!
//! ```text
//! source(0).node.address(*).address == 10.0.0.1 && !(classification.text <>* scan)
//! ```
//!
//! The pipeline is:
//!
//! 1. [`Grammar`] parses text into a [`Criterion`] tree (or a [`Selection`]).
//! 2. A [`TransformPipeline`] expands logical fields and validates each leaf
//!    against the entity's [`EntitySchema`].
//! 3. [`BackendCompiler`] applies backend rewrite rules and lowers the tree
//!    through a [`Backend`] into its native predicate.
//!
//! [`RequestScope`] ties the three together for one request, with
//! memoization.
//!
//! ```
//! use vigil_query::{CriteriaTextBackend, Grammar, PathRegistry, RequestScope, ValueType};
//! use std::sync::Arc;
//!
//! let mut registry = PathRegistry::new();
//! registry.register_path("alert.classification.text", ValueType::Text, true, false)?;
//!
//! let grammar = Grammar::new();
//! let mut scope = RequestScope::new(&grammar, Arc::new(registry));
//! let compiled = scope.compile_text(&CriteriaTextBackend, "alert", "classification.text <> scan")?;
//! assert_eq!(compiled.as_deref(), Some(r#"alert.classification.text <> "*scan*""#));
//! # Ok::<(), vigil_query::QueryError>(())
//! ```

pub mod criterion;
pub mod error;
pub mod operator;
pub mod path;
pub mod render;
pub mod schema;
pub mod scope;
pub mod selection;
pub mod syntax;
pub mod transform;

pub use criterion::{BoolOp, Criterion, Leaf, Value};
pub use error::{QueryError, Result, SyntaxError};
pub use operator::Operator;
pub use path::{Index, Path, Segment};
pub use render::{
    wildcard, Backend, BackendCompiler, CriteriaTextBackend, LeafContext, RenderedQuery,
    SqliteBackend,
};
pub use schema::{
    EntitySchema, ListIndex, PathInfo, PathRegistry, PathTranslation, PathValue, SchemaConfig,
    SchemaError, SharedRegistry, TypeProvider, ValueType,
};
pub use scope::RequestScope;
pub use selection::{ResolvedSelection, Selection, SelectionExpr, SelectionKind};
pub use syntax::Grammar;
pub use transform::{
    CompileOptions, CriteriaTransform, TransformPipeline, TransformPipelineBuilder,
    TranslateTransform, ValidateTransform,
};
