use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::debug;

use super::DataCollaborator;
use crate::error::LayerError;
use crate::model::{Data, DataRange, Feature};

/// Produces raw features for a data handle.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, data: &Data, range: Option<&DataRange>) -> Result<Vec<Feature>, LayerError>;
}

type StoreKey = (String, String);
type Buckets = Vec<(String, Vec<Feature>)>;

/// In-memory [`DataCollaborator`] keyed by `(layer id, data key)` and then by
/// range key. Buckets keep insertion order.
pub struct FeatureStore<F: Fetcher> {
    fetcher: F,
    cache: Mutex<HashMap<StoreKey, Buckets>>,
}

impl<F: Fetcher> FeatureStore<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<StoreKey, Buckets>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key(layer_id: &str, data: &Data) -> StoreKey {
        (layer_id.to_string(), data.key())
    }
}

#[async_trait]
impl<F: Fetcher> DataCollaborator for FeatureStore<F> {
    fn get(&self, layer_id: &str, data: &Data, range: Option<&DataRange>) -> Option<Vec<Feature>> {
        let range_key = DataRange::key(range);
        self.lock()
            .get(&Self::key(layer_id, data))?
            .iter()
            .find(|(key, _)| *key == range_key)
            .map(|(_, features)| features.clone())
    }

    fn get_all(&self, layer_id: &str, data: &Data) -> Option<Vec<Feature>> {
        self.lock()
            .get(&Self::key(layer_id, data))
            .map(|buckets| {
                buckets
                    .iter()
                    .flat_map(|(_, features)| features.iter().cloned())
                    .collect()
            })
    }

    async fn fetch(
        &self,
        layer_id: &str,
        data: &Data,
        range: Option<&DataRange>,
    ) -> Result<Vec<Feature>, LayerError> {
        let features = self.fetcher.fetch(data, range).await?;
        let range_key = DataRange::key(range);
        debug!(
            "Fetched {} features for layer {} range '{}'",
            features.len(),
            layer_id,
            range_key
        );

        let mut cache = self.lock();
        let buckets = cache.entry(Self::key(layer_id, data)).or_default();
        match buckets.iter_mut().find(|(key, _)| *key == range_key) {
            Some((_, bucket)) => *bucket = features.clone(),
            None => buckets.push((range_key, features.clone())),
        }
        Ok(features)
    }

    fn write(&self, layer_id: &str, data: &Data, features: Vec<Feature>) {
        let mut cache = self.lock();
        let buckets = cache.entry(Self::key(layer_id, data)).or_default();
        for feature in features {
            let range_key = DataRange::key(feature.range.as_ref());
            match buckets.iter_mut().find(|(key, _)| *key == range_key) {
                Some((_, bucket)) => bucket.push(feature),
                None => buckets.push((range_key, vec![feature])),
            }
        }
    }

    fn delete(&self, layer_id: &str, data: &Data, ids: &[String]) {
        if let Some(buckets) = self.lock().get_mut(&Self::key(layer_id, data)) {
            for (_, bucket) in buckets.iter_mut() {
                bucket.retain(|feature| !ids.contains(&feature.id));
            }
        }
    }
}
