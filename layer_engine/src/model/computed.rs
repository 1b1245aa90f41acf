use serde::Serialize;

use super::appearance::Appearances;
use super::feature::Feature;
use super::layer::Layer;

#[derive(Serialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum ComputedLayerStatus {
    Fetching,
    Ready,
}

/// A feature with its evaluated appearance categories flattened in.
#[derive(Serialize, Clone, PartialEq, Debug)]
pub struct ComputedFeature {
    #[serde(flatten)]
    pub feature: Feature,
    #[serde(flatten)]
    pub appearances: Appearances,
}

impl ComputedFeature {
    pub fn new(feature: Feature, appearances: Appearances) -> Self {
        Self {
            feature,
            appearances,
        }
    }

    pub fn id(&self) -> &str {
        &self.feature.id
    }
}

#[derive(Serialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ComputedLayer {
    pub id: String,
    pub layer: Layer,
    pub status: ComputedLayerStatus,
    pub features: Vec<ComputedFeature>,
    pub original_features: Vec<Feature>,
    /// Layer-level evaluated appearance.
    #[serde(flatten)]
    pub appearances: Appearances,
}
