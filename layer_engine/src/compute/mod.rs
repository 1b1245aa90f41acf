//! Per-layer compute graph: a synchronous reducer ([`ComputeState`]) driven
//! by an async shell ([`LayerCompute`]) that talks to the data collaborator.

mod command;
mod overrides;
mod source;
mod state;

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use crate::data::DataCollaborator;
use crate::error::LayerError;
use crate::evaluator::AppearanceEvaluator;
use crate::model::{ComputedLayer, Layer};

pub use command::Command;
pub use overrides::{OverrideStore, admit, merge_property};
pub use source::LayerFeatureSource;
pub use state::{ComputeState, Effect, Job};

/// One layer's compute graph. Commands may overlap; the state lock is
/// only held for the synchronous reducer steps.
pub struct LayerCompute<D: DataCollaborator + ?Sized> {
    data: Arc<D>,
    evaluator: Arc<AppearanceEvaluator>,
    state: Mutex<ComputeState>,
}

impl<D: DataCollaborator + ?Sized> LayerCompute<D> {
    pub fn new(data: Arc<D>, evaluator: Arc<AppearanceEvaluator>) -> Self {
        Self {
            data,
            evaluator,
            state: Mutex::new(ComputeState::new()),
        }
    }

    pub fn data(&self) -> &Arc<D> {
        &self.data
    }

    pub async fn set_layer(&self, layer: Option<Layer>) -> Result<(), LayerError> {
        self.dispatch(Command::SetLayer(layer)).await
    }

    /// Applies `command` and awaits whatever work it causes. Evaluation
    /// failures are absorbed into the state; only a `RequestFetch` error and
    /// lock poisoning are returned.
    pub async fn dispatch(&self, command: Command) -> Result<(), LayerError> {
        let name = command.name();
        let effect = self.with_state(|state| state.dispatch(command))?;
        debug!("{} -> {:?}", name, EffectKind(&effect));

        match effect {
            Effect::None => Ok(()),
            Effect::Evaluate(job) => self.evaluate(job).await,
            Effect::Fetch {
                layer_id,
                data,
                range,
            } => {
                self.data.fetch(&layer_id, &data, Some(&range)).await?;
                Ok(())
            }
            Effect::Write { job, features } => {
                self.data.write(&job.layer_id, &job.data, features);
                self.evaluate(job).await
            }
            Effect::Delete { job, ids } => {
                self.data.delete(&job.layer_id, &job.data, &ids);
                self.evaluate(job).await
            }
        }
    }

    /// Current read view, `None` until a layer is set.
    pub fn get(&self) -> Option<ComputedLayer> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let original = state
            .layer()
            .and_then(Layer::fetchable)
            .and_then(|(layer, data)| self.data.get_all(&layer.id, data));
        state.project(original)
    }

    async fn evaluate(&self, job: Job) -> Result<(), LayerError> {
        let source = LayerFeatureSource::new(job.layer_id.clone(), Arc::clone(&self.data));
        let outcome = self.evaluator.eval_simple_layer(&job.layer, &source).await;
        self.with_state(|state| {
            state.complete(job.generation, outcome);
        })
    }

    fn with_state<F, R>(&self, f: F) -> Result<R, LayerError>
    where
        F: FnOnce(&mut ComputeState) -> R,
    {
        let mut state = self
            .state
            .lock()
            .map_err(|_| LayerError::Runtime("Lock Poisoned".to_string()))?;
        Ok(f(&mut state))
    }
}

/// Logs an effect without dumping the features it carries.
struct EffectKind<'a>(&'a Effect);

impl std::fmt::Debug for EffectKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Effect::None => f.write_str("none"),
            Effect::Evaluate(job) => write!(f, "evaluate(gen {})", job.generation),
            Effect::Fetch { range, .. } => write!(f, "fetch({:?})", range),
            Effect::Write { job, features } => {
                write!(f, "write({} features, gen {})", features.len(), job.generation)
            }
            Effect::Delete { job, ids } => {
                write!(f, "delete({} ids, gen {})", ids.len(), job.generation)
            }
        }
    }
}
