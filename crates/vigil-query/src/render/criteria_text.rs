//! Criteria text backend.
//!
//! Emits the criteria language itself with entity-qualified paths, for
//! engines that parse IDMEF-style criteria natively.

use super::{Backend, LeafContext};
use crate::criterion::{BoolOp, Leaf};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default)]
pub struct CriteriaTextBackend;

impl Backend for CriteriaTextBackend {
    type Expr = String;

    fn name(&self) -> &str {
        "criteria"
    }

    fn compile_criterion(&self, leaf: &Leaf, ctx: &LeafContext<'_>) -> Result<String> {
        let qualified = Leaf::new(
            leaf.left.qualified(ctx.entity),
            leaf.operator,
            leaf.right.clone(),
        );
        Ok(qualified.to_string())
    }

    fn combine(&self, operator: BoolOp, operands: Vec<String>) -> Result<String> {
        Ok(format!("({})", operands.join(&format!(" {} ", operator))))
    }
}
