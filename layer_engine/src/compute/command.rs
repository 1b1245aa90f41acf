use serde_json::Value;

use crate::model::{DataRange, Feature, Layer};

/// Everything a caller can ask of one compute graph.
#[derive(Clone, PartialEq, Debug)]
pub enum Command {
    /// Replaces the layer and discards everything computed for the old one.
    SetLayer(Option<Layer>),
    /// Loads one more range into the feature store without re-evaluating.
    RequestFetch(DataRange),
    WriteFeatures(Vec<Feature>),
    DeleteFeatures(Vec<String>),
    /// `None` removes the owner's override.
    Override {
        owner: String,
        overrides: Option<Value>,
    },
}

impl Command {
    pub fn set_layer(layer: impl Into<Option<Layer>>) -> Self {
        Command::SetLayer(layer.into())
    }

    pub fn override_with(owner: impl Into<String>, overrides: Option<Value>) -> Self {
        Command::Override {
            owner: owner.into(),
            overrides,
        }
    }

    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::SetLayer(_) => "setLayer",
            Command::RequestFetch(_) => "requestFetch",
            Command::WriteFeatures(_) => "writeFeatures",
            Command::DeleteFeatures(_) => "deleteFeatures",
            Command::Override { .. } => "override",
        }
    }
}
