//! Compute graph behaviour: status cycle, store mutations, overrides and
//! the generation guard under overlapping commands.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use layer_engine::compute::{Command, LayerCompute};
use layer_engine::data::{FeatureStore, Fetcher};
use layer_engine::model::{
    AppearanceType, ComputedLayerStatus, Data, DataRange, Feature, Layer,
};
use layer_engine::{AppearanceEvaluator, LayerError};

/// Answers by URL after a per-URL delay.
#[derive(Default)]
struct ScriptedFetcher {
    responses: HashMap<String, (u64, Option<Vec<&'static str>>)>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    fn respond(mut self, url: &str, delay_ms: u64, ids: &[&'static str]) -> Self {
        self.responses
            .insert(url.to_string(), (delay_ms, Some(ids.to_vec())));
        self
    }

    fn reject(mut self, url: &str, delay_ms: u64) -> Self {
        self.responses.insert(url.to_string(), (delay_ms, None));
        self
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, data: &Data, range: Option<&DataRange>) -> Result<Vec<Feature>, LayerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = data.url.clone().unwrap_or_default();
        let Some((delay, ids)) = self.responses.get(&url) else {
            return Err(LayerError::data(format!("no response for {}", url)));
        };
        tokio::time::sleep(Duration::from_millis(*delay)).await;
        let ids = ids
            .as_ref()
            .ok_or_else(|| LayerError::data(format!("{} rejected", url)))?;
        Ok(ids
            .iter()
            .map(|id| {
                let feature = Feature::new(*id);
                match range {
                    Some(range) => feature.with_range(*range),
                    None => feature,
                }
            })
            .collect())
    }
}

fn simple_layer(id: &str, url: &str) -> Layer {
    serde_json::from_value(json!({
        "type": "simple",
        "id": id,
        "data": { "type": "geojson", "url": url },
        "marker": { "pointColor": "'#FF0000'", "pointSize": 4 }
    }))
    .unwrap()
}

fn compute(fetcher: ScriptedFetcher) -> LayerCompute<FeatureStore<ScriptedFetcher>> {
    LayerCompute::new(
        Arc::new(FeatureStore::new(fetcher)),
        Arc::new(AppearanceEvaluator::default()),
    )
}

fn feature_ids(compute: &LayerCompute<FeatureStore<ScriptedFetcher>>) -> Vec<String> {
    compute
        .get()
        .map(|view| view.features.iter().map(|f| f.id().to_string()).collect())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_no_layer_has_no_view() {
    let compute = compute(ScriptedFetcher::default());
    assert!(compute.get().is_none());
    compute.dispatch(Command::SetLayer(None)).await.unwrap();
    assert!(compute.get().is_none());
}

#[tokio::test]
async fn test_set_layer_evaluates_and_becomes_ready() {
    let compute = compute(ScriptedFetcher::default().respond("a.geojson", 5, &["a", "b"]));
    compute
        .dispatch(Command::set_layer(simple_layer("A", "a.geojson")))
        .await
        .unwrap();

    let view = compute.get().unwrap();
    assert_eq!(view.id, "A");
    assert_eq!(view.status, ComputedLayerStatus::Ready);
    assert_eq!(feature_ids(&compute), vec!["a", "b"]);
    assert_eq!(view.original_features.len(), 2);
    assert_eq!(
        view.appearances.field(AppearanceType::Marker, "pointColor"),
        Some(&json!("#FF0000"))
    );
    assert_eq!(
        view.features[0].appearances.field(AppearanceType::Marker, "pointSize"),
        Some(&json!(4))
    );
}

#[tokio::test]
async fn test_group_layer_is_ready_without_fetching() {
    let fetcher = ScriptedFetcher::default();
    let compute = compute(fetcher);
    let group: Layer = serde_json::from_value(json!({
        "type": "group",
        "id": "g",
        "children": [{ "type": "simple", "id": "child" }]
    }))
    .unwrap();
    compute.dispatch(Command::set_layer(group)).await.unwrap();

    let view = compute.get().unwrap();
    assert_eq!(view.status, ComputedLayerStatus::Ready);
    assert!(view.features.is_empty());
    assert!(view.original_features.is_empty());
    assert_eq!(compute.data().fetcher().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_later_set_layer_wins_over_slow_earlier_one() {
    let compute = compute(
        ScriptedFetcher::default()
            .respond("slow.geojson", 100, &["slow"])
            .respond("fast.geojson", 10, &["fast"]),
    );

    let (first, second) = tokio::join!(
        compute.dispatch(Command::set_layer(simple_layer("A", "slow.geojson"))),
        compute.dispatch(Command::set_layer(simple_layer("B", "fast.geojson"))),
    );
    first.unwrap();
    second.unwrap();

    let view = compute.get().unwrap();
    assert_eq!(view.id, "B");
    assert_eq!(view.status, ComputedLayerStatus::Ready);
    assert_eq!(feature_ids(&compute), vec!["fast"]);
}

#[tokio::test(start_paused = true)]
async fn test_early_completion_of_superseded_layer_is_discarded() {
    let compute = Arc::new(compute(
        ScriptedFetcher::default()
            .respond("fast.geojson", 10, &["fast"])
            .respond("slow.geojson", 100, &["slow"]),
    ));

    let background = Arc::clone(&compute);
    let pending = tokio::spawn(async move {
        background
            .dispatch(Command::set_layer(simple_layer("A", "fast.geojson")))
            .await
    });
    tokio::task::yield_now().await;
    let late = Arc::clone(&compute);
    let second = tokio::spawn(async move {
        late.dispatch(Command::set_layer(simple_layer("B", "slow.geojson")))
            .await
    });

    pending.await.unwrap().unwrap();
    // A finished first but B is the current layer.
    let view = compute.get().unwrap();
    assert_eq!(view.id, "B");
    assert_eq!(view.status, ComputedLayerStatus::Fetching);
    assert!(view.features.is_empty());

    second.await.unwrap().unwrap();
    assert_eq!(feature_ids(&compute), vec!["slow"]);
    assert_eq!(compute.get().unwrap().status, ComputedLayerStatus::Ready);
}

#[tokio::test]
async fn test_fetch_failure_is_ready_and_empty() {
    let compute = compute(ScriptedFetcher::default().reject("broken.geojson", 1));
    compute
        .dispatch(Command::set_layer(simple_layer("A", "broken.geojson")))
        .await
        .unwrap();

    let view = compute.get().unwrap();
    assert_eq!(view.status, ComputedLayerStatus::Ready);
    assert!(view.features.is_empty());
    assert!(view.original_features.is_empty());
    assert!(view.appearances.is_empty());
}

#[tokio::test]
async fn test_write_and_delete_reevaluate_from_the_store() {
    let compute = compute(ScriptedFetcher::default().respond("a.geojson", 1, &["a", "b"]));
    compute
        .dispatch(Command::set_layer(simple_layer("A", "a.geojson")))
        .await
        .unwrap();

    compute
        .dispatch(Command::WriteFeatures(vec![Feature::new("c")]))
        .await
        .unwrap();
    assert_eq!(feature_ids(&compute), vec!["a", "b", "c"]);
    assert_eq!(compute.get().unwrap().original_features.len(), 3);

    compute
        .dispatch(Command::DeleteFeatures(vec!["a".to_string()]))
        .await
        .unwrap();
    assert_eq!(feature_ids(&compute), vec!["b", "c"]);
    // Evaluation after the first fetch reads the store only.
    assert_eq!(compute.data().fetcher().calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_request_fetch_loads_a_range_without_reevaluating() {
    let compute = compute(ScriptedFetcher::default().respond("a.geojson", 1, &["a"]));
    compute
        .dispatch(Command::set_layer(simple_layer("A", "a.geojson")))
        .await
        .unwrap();

    compute
        .dispatch(Command::RequestFetch(DataRange::new(1, 2, 3)))
        .await
        .unwrap();
    let view = compute.get().unwrap();
    assert_eq!(view.features.len(), 1);
    assert_eq!(view.original_features.len(), 2);
    assert_eq!(view.original_features[1].range, Some(DataRange::new(1, 2, 3)));
}

#[tokio::test]
async fn test_request_fetch_error_is_returned() {
    let compute = compute(ScriptedFetcher::default().reject("broken.geojson", 1));
    compute
        .dispatch(Command::set_layer(simple_layer("A", "broken.geojson")))
        .await
        .unwrap();
    let result = compute
        .dispatch(Command::RequestFetch(DataRange::new(0, 0, 0)))
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_override_then_remove_restores_view() {
    let compute = compute(ScriptedFetcher::default().respond("a.geojson", 1, &["a"]));
    compute
        .dispatch(Command::set_layer(simple_layer("A", "a.geojson")))
        .await
        .unwrap();
    let before = compute.get().unwrap();

    compute
        .dispatch(Command::override_with(
            "x",
            Some(json!({ "marker": { "pointColor": "blue" }, "unknown": { "a": 1 } })),
        ))
        .await
        .unwrap();
    let overridden = compute.get().unwrap();
    let marker = overridden.features[0]
        .appearances
        .get(AppearanceType::Marker)
        .cloned()
        .map(Value::Object);
    assert_eq!(marker, Some(json!({ "pointColor": "blue", "pointSize": 4 })));
    assert_eq!(overridden.appearances, before.appearances);
    assert_eq!(compute.data().fetcher().calls.load(Ordering::SeqCst), 1);

    compute
        .dispatch(Command::override_with("x", None))
        .await
        .unwrap();
    assert_eq!(compute.get().unwrap(), before);
}

#[tokio::test]
async fn test_overrides_survive_set_layer() {
    let compute = compute(
        ScriptedFetcher::default()
            .respond("a.geojson", 1, &["a"])
            .respond("b.geojson", 1, &["b"]),
    );
    compute
        .dispatch(Command::override_with("", Some(json!({ "marker": { "pointSize": 9 } }))))
        .await
        .unwrap();
    compute
        .dispatch(Command::set_layer(simple_layer("A", "a.geojson")))
        .await
        .unwrap();
    compute
        .dispatch(Command::set_layer(simple_layer("B", "b.geojson")))
        .await
        .unwrap();

    let view = compute.get().unwrap();
    assert_eq!(
        view.features[0].appearances.field(AppearanceType::Marker, "pointSize"),
        Some(&json!(9))
    );
}
