//! Turns layers and their features into evaluated appearances.

mod appearance;
mod simple;

pub use appearance::AppearanceEvaluator;

use crate::model::{Appearances, ComputedFeature};

/// Layer-level appearance plus each evaluated feature, in source order.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct EvalResult {
    pub layer: Appearances,
    pub features: Vec<ComputedFeature>,
}
