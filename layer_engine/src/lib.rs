pub mod cache;
pub mod compute;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod model;
pub mod util;

use std::fs;
use std::sync::Arc;

use log::info;
use serde_json::Value;

pub use compute::{Command, LayerCompute};
pub use config::EngineConfig;
pub use data::{DataCollaborator, EmbeddedFetcher, FeatureSource, FeatureStore, Fetcher};
pub use error::LayerError;
pub use evaluator::{AppearanceEvaluator, EvalResult};
pub use model::{ComputedLayer, Layer};

use crate::util::timing::ScopedTimer;

/// Reads a layer or an array of layers from JSON text.
pub fn parse_layers(source: &str) -> Result<Vec<Layer>, LayerError> {
    match serde_json::from_str::<Value>(source)? {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(LayerError::from))
            .collect(),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

/// Evaluates every simple layer in `layers` against embedded data, one
/// compute graph per layer.
pub async fn compute_layers(
    layers: &[Layer],
    config: &EngineConfig,
) -> Result<Vec<ComputedLayer>, LayerError> {
    let store = Arc::new(FeatureStore::new(EmbeddedFetcher));
    let evaluator = Arc::new(AppearanceEvaluator::new(config));

    let mut computed = Vec::new();
    for simple in layers.iter().flat_map(Layer::simple_layers) {
        let compute = LayerCompute::new(Arc::clone(&store), Arc::clone(&evaluator));
        compute
            .set_layer(Some(Layer::Simple(simple.clone())))
            .await?;
        if let Some(view) = compute.get() {
            computed.push(view);
        }
    }
    Ok(computed)
}

/// `cli <layers.json> [config.toml]`
pub fn run(args: Vec<String>) -> Result<(), LayerError> {
    let Some(layers_path) = args.get(1) else {
        return Err(LayerError::InvalidArgument(format!(
            "usage: {} <layers.json> [config.toml]",
            args.first().map(String::as_str).unwrap_or("cli")
        )));
    };
    let config = match args.get(2) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let layers = parse_layers(&fs::read_to_string(layers_path)?)?;
    info!("Loaded {} layers from {}", layers.len(), layers_path);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let computed = {
        let _timer = ScopedTimer::info(format!("Computing layers from {}", layers_path));
        runtime.block_on(compute_layers(&layers, &config))?
    };

    println!("{}", serde_json::to_string_pretty(&computed)?);
    Ok(())
}
