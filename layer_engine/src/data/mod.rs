//! Feature storage seams between the compute graph and the outside world.

pub mod embedded;
pub mod store;

use async_trait::async_trait;

use crate::error::LayerError;
use crate::model::{Data, DataRange, Feature};

pub use embedded::EmbeddedFetcher;
pub use store::{FeatureStore, Fetcher};

/// Owns fetched features for every layer. The compute graph reads it
/// synchronously and only awaits on `fetch`.
#[async_trait]
pub trait DataCollaborator: Send + Sync {
    /// Cached features for one range bucket, `None` if never stored.
    fn get(&self, layer_id: &str, data: &Data, range: Option<&DataRange>) -> Option<Vec<Feature>>;

    /// All cached buckets flattened, `None` if nothing was stored for the data.
    fn get_all(&self, layer_id: &str, data: &Data) -> Option<Vec<Feature>>;

    async fn fetch(
        &self,
        layer_id: &str,
        data: &Data,
        range: Option<&DataRange>,
    ) -> Result<Vec<Feature>, LayerError>;

    fn write(&self, layer_id: &str, data: &Data, features: Vec<Feature>);

    fn delete(&self, layer_id: &str, data: &Data, ids: &[String]);
}

/// What the evaluator pulls features from.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn get_all_features(&self, data: &Data) -> Result<Vec<Feature>, LayerError>;

    async fn get_features(
        &self,
        data: &Data,
        range: Option<&DataRange>,
    ) -> Result<Vec<Feature>, LayerError>;
}
