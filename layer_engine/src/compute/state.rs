use log::{debug, warn};

use super::command::Command;
use super::overrides::{OverrideStore, apply_merged};
use crate::error::LayerError;
use crate::evaluator::EvalResult;
use crate::model::{
    Appearances, ComputedLayer, ComputedLayerStatus, Data, DataRange, Feature, Layer, SimpleLayer,
};

/// Snapshot of what an evaluation needs, tagged with the generation that
/// requested it.
#[derive(Clone, PartialEq, Debug)]
pub struct Job {
    pub generation: u64,
    pub layer_id: String,
    pub layer: SimpleLayer,
    pub data: Data,
}

/// Async work the driver must perform after a reducer step.
#[derive(Clone, PartialEq, Debug)]
pub enum Effect {
    None,
    Evaluate(Job),
    Fetch {
        layer_id: String,
        data: Data,
        range: DataRange,
    },
    Write {
        job: Job,
        features: Vec<Feature>,
    },
    Delete {
        job: Job,
        ids: Vec<String>,
    },
}

/// Synchronous half of the compute graph.
///
/// `dispatch` mutates state and describes follow-up work; `complete` folds an
/// evaluation outcome back in, but only if no newer mutating command has
/// been issued since the job was created.
#[derive(Debug)]
pub struct ComputeState {
    layer: Option<Layer>,
    status: ComputedLayerStatus,
    result: Option<EvalResult>,
    overrides: OverrideStore,
    generation: u64,
    failed: bool,
}

impl Default for ComputeState {
    fn default() -> Self {
        Self {
            layer: None,
            status: ComputedLayerStatus::Fetching,
            result: None,
            overrides: OverrideStore::new(),
            generation: 0,
            failed: false,
        }
    }
}

impl ComputeState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self) -> Option<&Layer> {
        self.layer.as_ref()
    }

    pub fn status(&self) -> ComputedLayerStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn overrides(&self) -> &OverrideStore {
        &self.overrides
    }

    pub fn dispatch(&mut self, command: Command) -> Effect {
        match command {
            Command::SetLayer(layer) => {
                self.generation += 1;
                self.result = None;
                self.failed = false;
                self.layer = layer;
                match self.job() {
                    Some(job) => {
                        self.status = ComputedLayerStatus::Fetching;
                        Effect::Evaluate(job)
                    }
                    None => {
                        self.status = ComputedLayerStatus::Ready;
                        Effect::None
                    }
                }
            }
            Command::RequestFetch(range) => match self.layer.as_ref().and_then(Layer::fetchable) {
                Some((layer, data)) => Effect::Fetch {
                    layer_id: layer.id.clone(),
                    data: data.clone(),
                    range,
                },
                None => Effect::None,
            },
            Command::WriteFeatures(features) => match self.begin_mutation() {
                Some(job) => Effect::Write { job, features },
                None => Effect::None,
            },
            Command::DeleteFeatures(ids) => match self.begin_mutation() {
                Some(job) => Effect::Delete { job, ids },
                None => Effect::None,
            },
            Command::Override { owner, overrides } => {
                self.overrides.set(&owner, overrides);
                Effect::None
            }
        }
    }

    /// Applies an evaluation outcome. Returns `false` when the outcome was
    /// stale and discarded.
    pub fn complete(
        &mut self,
        generation: u64,
        outcome: Result<Option<EvalResult>, LayerError>,
    ) -> bool {
        if generation != self.generation {
            debug!(
                "Discarding stale evaluation (generation {}, current {})",
                generation, self.generation
            );
            return false;
        }
        self.status = ComputedLayerStatus::Ready;
        match outcome {
            Ok(result) => {
                self.result = result;
                self.failed = false;
            }
            Err(e) => {
                warn!(
                    "Evaluation of layer {} failed: {}",
                    self.layer.as_ref().map(Layer::id).unwrap_or_default(),
                    e
                );
                self.result = None;
                self.failed = true;
            }
        }
        true
    }

    /// Read view. `original_features` is what the feature store currently
    /// holds for the layer; it is ignored when the layer has nothing to fetch
    /// or the last evaluation failed.
    pub fn project(&self, original_features: Option<Vec<Feature>>) -> Option<ComputedLayer> {
        let layer = self.layer.as_ref()?;
        let merged = self.overrides.merged();
        let features = self
            .result
            .as_ref()
            .map(|result| {
                result
                    .features
                    .iter()
                    .map(|feature| match &merged {
                        Some(merged) => apply_merged(feature, merged),
                        None => feature.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let original_features = if self.failed || layer.fetchable().is_none() {
            Vec::new()
        } else {
            original_features.unwrap_or_default()
        };
        Some(ComputedLayer {
            id: layer.id().to_string(),
            layer: layer.clone(),
            status: self.status,
            features,
            original_features,
            appearances: self
                .result
                .as_ref()
                .map(|result| result.layer.clone())
                .unwrap_or_else(Appearances::new),
        })
    }

    fn job(&self) -> Option<Job> {
        let (layer, data) = self.layer.as_ref()?.fetchable()?;
        Some(Job {
            generation: self.generation,
            layer_id: layer.id.clone(),
            layer: layer.clone(),
            data: data.clone(),
        })
    }

    fn begin_mutation(&mut self) -> Option<Job> {
        self.layer.as_ref()?.fetchable()?;
        self.generation += 1;
        self.failed = false;
        self.status = ComputedLayerStatus::Fetching;
        self.job()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupLayer;

    fn simple_layer() -> Layer {
        let data = Data::new("geojson").with_url("https://example.com/x.geojson");
        Layer::Simple(SimpleLayer::new("xxx").with_data(data))
    }

    #[test]
    fn layers_without_data_are_ready_immediately() {
        let mut state = ComputeState::new();
        let group = Layer::Group(GroupLayer {
            id: "g".into(),
            children: vec![],
        });
        assert_eq!(state.dispatch(Command::SetLayer(Some(group))), Effect::None);
        assert_eq!(state.status(), ComputedLayerStatus::Ready);
        assert_eq!(state.dispatch(Command::SetLayer(None)), Effect::None);
        assert!(state.project(None).is_none());
    }

    #[test]
    fn stale_completions_are_discarded() {
        let mut state = ComputeState::new();
        let Effect::Evaluate(first) = state.dispatch(Command::SetLayer(Some(simple_layer()))) else {
            panic!("expected evaluate");
        };
        let Effect::Evaluate(second) = state.dispatch(Command::SetLayer(Some(simple_layer()))) else {
            panic!("expected evaluate");
        };
        assert!(state.complete(second.generation, Ok(Some(EvalResult::default()))));
        assert!(!state.complete(first.generation, Err(LayerError::data("late"))));
        assert!(!state.has_failed());
        assert_eq!(state.status(), ComputedLayerStatus::Ready);
    }

    #[test]
    fn failure_hides_original_features_until_next_mutation() {
        let mut state = ComputeState::new();
        let Effect::Evaluate(job) = state.dispatch(Command::SetLayer(Some(simple_layer()))) else {
            panic!("expected evaluate");
        };
        state.complete(job.generation, Err(LayerError::data("boom")));
        let view = state.project(Some(vec![Feature::new("a")])).unwrap();
        assert_eq!(view.status, ComputedLayerStatus::Ready);
        assert!(view.features.is_empty());
        assert!(view.original_features.is_empty());

        let effect = state.dispatch(Command::WriteFeatures(vec![Feature::new("b")]));
        assert!(matches!(effect, Effect::Write { .. }));
        assert_eq!(state.status(), ComputedLayerStatus::Fetching);
        let view = state.project(Some(vec![Feature::new("a")])).unwrap();
        assert_eq!(view.original_features.len(), 1);
    }
}
