//! Backend compilation.
//!
//! A validated criterion is first rewritten by [`BackendCompiler`] into the
//! form every backend expects, then lowered leaf by leaf through a
//! [`Backend`] into its native predicate type.

mod compiler;
mod criteria_text;
mod sqlite;

pub use compiler::{has_unescaped, wildcard, BackendCompiler};
pub use criteria_text::CriteriaTextBackend;
pub use sqlite::{RenderedQuery, SqliteBackend};

use crate::criterion::{BoolOp, Leaf};
use crate::error::Result;
use crate::schema::PathInfo;

/// What a backend knows about the leaf it compiles.
#[derive(Debug, Clone, Copy)]
pub struct LeafContext<'a> {
    /// Entity type the criterion applies to
    pub entity: &'a str,
    /// Schema entry of the leaf path
    pub info: &'a PathInfo,
    /// Positions of the list segments the leaf path traverses without an
    /// explicit index
    pub unindexed_lists: &'a [usize],
}

impl LeafContext<'_> {
    /// The path may designate several values.
    pub fn is_ambiguous(&self) -> bool {
        !self.unindexed_lists.is_empty()
    }
}

/// Trait for compiling criteria to a storage engine's native predicate.
pub trait Backend: Send + Sync {
    /// Native predicate type
    type Expr;

    /// Unique name for this backend
    fn name(&self) -> &str;

    /// Compile one rewritten leaf. Unsupported combinations fail with
    /// `CriterionCompile`.
    fn compile_criterion(&self, leaf: &Leaf, ctx: &LeafContext<'_>) -> Result<Self::Expr>;

    /// Join compiled operands. Never called with fewer than two operands.
    fn combine(&self, operator: BoolOp, operands: Vec<Self::Expr>) -> Result<Self::Expr>;
}
