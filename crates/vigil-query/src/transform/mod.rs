//! Criteria transforms.
//!
//! Transforms run between parsing and backend compilation, in order. The
//! standard pipeline expands logical fields and then validates every leaf
//! against the entity schema.

mod translate;
mod validate;

pub use translate::TranslateTransform;
pub use validate::ValidateTransform;

use crate::criterion::Criterion;
use crate::error::Result;
use crate::schema::EntitySchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Per-request compilation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Downgrade operators a field does not support instead of failing.
    /// Meant for machine-generated filters such as drill-down links.
    pub lenient: bool,
}

/// A rewrite of a criterion tree against one entity schema.
pub trait CriteriaTransform: Send + Sync {
    /// Unique name for this transform
    fn name(&self) -> &'static str;

    fn transform(&self, criterion: Criterion, schema: &EntitySchema) -> Result<Criterion>;
}

/// Ordered list of transforms.
#[derive(Clone, Default)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn CriteriaTransform>>,
}

impl TransformPipeline {
    /// Translation followed by validation.
    pub fn standard(options: CompileOptions) -> Self {
        TransformPipelineBuilder::new()
            .with_transform(TranslateTransform::new(options.lenient))
            .with_transform(ValidateTransform)
            .build()
    }

    pub fn run(&self, criterion: Criterion, schema: &EntitySchema) -> Result<Criterion> {
        self.transforms
            .iter()
            .try_fold(criterion, |criterion, transform| {
                debug!(transform = transform.name(), entity = schema.name(), "applying transform");
                transform.transform(criterion, schema)
            })
    }

    pub fn transform_names(&self) -> Vec<&'static str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.transform_names()).finish()
    }
}

/// Builder for ergonomic pipeline construction
#[derive(Default)]
pub struct TransformPipelineBuilder {
    transforms: Vec<Arc<dyn CriteriaTransform>>,
}

impl TransformPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transform
    pub fn with_transform(mut self, transform: impl CriteriaTransform + 'static) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    pub fn build(self) -> TransformPipeline {
        TransformPipeline {
            transforms: self.transforms,
        }
    }
}
