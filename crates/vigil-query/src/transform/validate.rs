//! Validation transform.
//!
//! Checks every leaf against the entity schema before compilation.

use crate::criterion::{Criterion, Leaf};
use crate::error::{QueryError, Result};
use crate::operator::Operator;
use crate::schema::EntitySchema;
use crate::transform::CriteriaTransform;

/// Rejects unknown paths and operators the field type does not accept.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateTransform;

impl ValidateTransform {
    /// Fails unless the leaf's path resolves and its operator is allowed
    /// for the field.
    pub(crate) fn check_leaf(&self, leaf: &Leaf, schema: &EntitySchema) -> Result<()> {
        let info = schema.validate(&leaf.left)?;

        let null_test = leaf.right.is_none();
        let allowed = if null_test {
            matches!(leaf.operator, Operator::Equal | Operator::NotEqual)
        } else {
            info.allows(leaf.operator)
        };

        if allowed {
            Ok(())
        } else {
            Err(QueryError::InvalidOperator {
                path: leaf.left.to_string(),
                operator: leaf.operator,
                value_type: info.value_type,
            })
        }
    }
}

impl CriteriaTransform for ValidateTransform {
    fn name(&self) -> &'static str {
        "validate"
    }

    fn transform(&self, criterion: Criterion, schema: &EntitySchema) -> Result<Criterion> {
        for leaf in criterion.leaves() {
            self.check_leaf(leaf, schema)?;
        }
        Ok(criterion)
    }
}
