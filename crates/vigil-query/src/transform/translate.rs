//! Logical field expansion.
//!
//! A leaf on a translated field (`classification == "scan"`) becomes one
//! leaf per target path. Positive leaves are OR-ed, negative ones AND-ed, so
//! that `classification != "scan"` excludes entities where any target
//! matches.

use crate::criterion::{BoolOp, Criterion, Leaf};
use crate::error::Result;
use crate::operator::Operator;
use crate::schema::EntitySchema;
use crate::transform::CriteriaTransform;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default)]
pub struct TranslateTransform {
    lenient: bool,
}

impl TranslateTransform {
    pub fn new(lenient: bool) -> Self {
        Self { lenient }
    }

    pub fn strict() -> Self {
        Self::new(false)
    }

    pub fn lenient() -> Self {
        Self::new(true)
    }

    fn translate(&self, leaf: Leaf, schema: &EntitySchema) -> Criterion {
        let Some(translation) = schema.translation(&leaf.left.to_string()) else {
            return self.fix_operator(leaf, schema).into();
        };

        let combinator = translation.combinator_for(&leaf);
        let right = leaf.right.map(|value| translation.map_value(value));

        translation
            .paths
            .iter()
            .map(|path| {
                let expanded = Leaf::new(path.clone(), leaf.operator, right.clone());
                Criterion::from(self.fix_operator(expanded, schema))
            })
            .fold(Criterion::Empty, |acc, expanded| match combinator {
                BoolOp::And => acc & expanded,
                BoolOp::Or => acc | expanded,
            })
    }

    /// In lenient mode, replace an operator the field does not accept with
    /// plain (in)equality.
    fn fix_operator(&self, leaf: Leaf, schema: &EntitySchema) -> Leaf {
        if !self.lenient {
            return leaf;
        }
        match schema.field(&leaf.left) {
            Some(info) if !info.allows(leaf.operator) => {
                let operator = if leaf.operator.is_negated() {
                    Operator::NotEqual
                } else {
                    Operator::Equal
                };
                warn!(
                    path = %leaf.left,
                    from = %leaf.operator,
                    to = %operator,
                    value_type = %info.value_type,
                    "operator not supported by field, downgraded"
                );
                Leaf { operator, ..leaf }
            }
            _ => leaf,
        }
    }
}

impl CriteriaTransform for TranslateTransform {
    fn name(&self) -> &'static str {
        "translate"
    }

    fn transform(&self, criterion: Criterion, schema: &EntitySchema) -> Result<Criterion> {
        criterion
            .try_map_leaves(&mut |leaf| Ok(self.translate(leaf, schema)))
            .map(Criterion::flatten)
    }
}
