use async_trait::async_trait;
use log::debug;
use serde_json::Value;

use super::store::Fetcher;
use crate::error::LayerError;
use crate::model::{Data, DataRange, Feature};

/// Decodes features carried inline in `data.value`.
///
/// Accepts a feature array, a GeoJSON `FeatureCollection` or a single
/// `Feature`. Remote formats belong to other fetchers.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmbeddedFetcher;

impl EmbeddedFetcher {
    pub fn decode(value: &Value) -> Result<Vec<Feature>, LayerError> {
        match value {
            Value::Array(_) => Ok(serde_json::from_value(value.clone())?),
            Value::Object(map) => match map.get("type").and_then(Value::as_str) {
                Some("FeatureCollection") => {
                    let features = map.get("features").cloned().unwrap_or(Value::Array(Vec::new()));
                    Ok(serde_json::from_value(features)?)
                }
                Some("Feature") => Ok(vec![serde_json::from_value(value.clone())?]),
                other => Err(LayerError::data(format!(
                    "embedded object must be a Feature or FeatureCollection, got type {:?}",
                    other
                ))),
            },
            other => Err(LayerError::data(format!(
                "embedded data must be an array or object, got {}",
                other
            ))),
        }
    }
}

#[async_trait]
impl Fetcher for EmbeddedFetcher {
    async fn fetch(&self, data: &Data, _range: Option<&DataRange>) -> Result<Vec<Feature>, LayerError> {
        let value = data.value.as_ref().ok_or_else(|| {
            LayerError::data(format!(
                "{} data at {} is not embedded and no remote fetcher is configured",
                data.format,
                data.url.as_deref().unwrap_or("<no url>")
            ))
        })?;
        let features = Self::decode(value)?;
        debug!("Decoded {} embedded {} features", features.len(), data.format);
        Ok(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_collections_and_arrays() {
        let collection = json!({
            "type": "FeatureCollection",
            "features": [
                { "type": "Feature", "id": 7, "properties": null, "geometry": { "type": "Point", "coordinates": [0, 0] } },
                { "type": "Feature", "properties": { "a": 1 } }
            ]
        });
        let features = EmbeddedFetcher::decode(&collection).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].id, "7");
        assert!(features[0].properties.is_empty());
        assert!(!features[1].id.is_empty());

        let array = json!([{ "id": "a" }]);
        assert_eq!(EmbeddedFetcher::decode(&array).unwrap()[0].id, "a");
    }

    #[test]
    fn rejects_unknown_shapes() {
        assert!(EmbeddedFetcher::decode(&json!("nope")).is_err());
        assert!(EmbeddedFetcher::decode(&json!({ "type": "Topology" })).is_err());
    }

    #[tokio::test]
    async fn fetch_requires_value() {
        let data = Data::new("geojson").with_url("https://example.com/a.geojson");
        assert!(EmbeddedFetcher.fetch(&data, None).await.is_err());
    }
}
