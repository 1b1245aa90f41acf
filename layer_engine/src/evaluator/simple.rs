use rayon::prelude::*;

use super::{AppearanceEvaluator, EvalResult};
use crate::data::FeatureSource;
use crate::error::LayerError;
use crate::model::{ComputedFeature, Layer, SimpleLayer};
use crate::util::timing::ScopedTimer;

impl AppearanceEvaluator {
    /// `None` for group layers.
    pub async fn eval_layer<S>(&self, layer: &Layer, source: &S) -> Result<Option<EvalResult>, LayerError>
    where
        S: FeatureSource + ?Sized,
    {
        match layer {
            Layer::Simple(simple) => self.eval_simple_layer(simple, source).await,
            Layer::Group(_) => Ok(None),
        }
    }

    /// Pulls every feature through `source` and evaluates the layer-level
    /// appearance once plus each feature's. `None` when the layer has no data.
    pub async fn eval_simple_layer<S>(
        &self,
        layer: &SimpleLayer,
        source: &S,
    ) -> Result<Option<EvalResult>, LayerError>
    where
        S: FeatureSource + ?Sized,
    {
        let Some(data) = &layer.data else {
            return Ok(None);
        };
        let features = source.get_all_features(data).await?;

        let _timer = ScopedTimer::debug_lazy(|| {
            format!("Evaluating {} features of layer {}", features.len(), layer.id)
        });

        let layer_appearance = self.eval_layer_appearances(layer.appearances(), layer, None);
        let features: Vec<ComputedFeature> = if features.len() >= self.parallel_threshold {
            features
                .par_iter()
                .map(|feature| self.eval_simple_layer_feature(layer, feature))
                .collect()
        } else {
            features
                .iter()
                .map(|feature| self.eval_simple_layer_feature(layer, feature))
                .collect()
        };

        Ok(Some(EvalResult {
            layer: layer_appearance,
            features,
        }))
    }
}
