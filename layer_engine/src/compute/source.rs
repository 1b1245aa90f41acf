use std::sync::Arc;

use async_trait::async_trait;

use crate::data::{DataCollaborator, FeatureSource};
use crate::error::LayerError;
use crate::model::{Data, DataRange, Feature};

/// Binds a [`DataCollaborator`] to one layer id for the evaluator.
///
/// Reads the store first and fetches on a miss. Embedded data skips the
/// cache lookup and is always decoded fresh.
pub struct LayerFeatureSource<D: ?Sized> {
    layer_id: String,
    data: Arc<D>,
}

impl<D: DataCollaborator + ?Sized> LayerFeatureSource<D> {
    pub fn new(layer_id: impl Into<String>, data: Arc<D>) -> Self {
        Self {
            layer_id: layer_id.into(),
            data,
        }
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }
}

#[async_trait]
impl<D: DataCollaborator + ?Sized> FeatureSource for LayerFeatureSource<D> {
    async fn get_all_features(&self, data: &Data) -> Result<Vec<Feature>, LayerError> {
        if !data.is_embedded() {
            if let Some(features) = self.data.get_all(&self.layer_id, data) {
                return Ok(features);
            }
        }
        self.data.fetch(&self.layer_id, data, None).await?;
        Ok(self.data.get_all(&self.layer_id, data).unwrap_or_default())
    }

    async fn get_features(
        &self,
        data: &Data,
        range: Option<&DataRange>,
    ) -> Result<Vec<Feature>, LayerError> {
        if !data.is_embedded() {
            if let Some(features) = self.data.get(&self.layer_id, data, range) {
                return Ok(features);
            }
        }
        self.data.fetch(&self.layer_id, data, range).await?;
        Ok(self.data.get(&self.layer_id, data, range).unwrap_or_default())
    }
}
