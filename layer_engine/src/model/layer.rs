use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::appearance::{AppearanceType, LayerAppearance};

/// Opaque handle handed to the data collaborator.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    #[serde(rename = "type")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Embedded payload. Bypasses the feature cache and is never stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Feature properties holding JSON text to be parsed before evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_properties: Option<Vec<String>>,
}

impl Data {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            url: None,
            value: None,
            json_properties: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn is_embedded(&self) -> bool {
        self.value.is_some()
    }

    pub fn key(&self) -> String {
        format!("{}::{}", self.format, self.url.as_deref().unwrap_or_default())
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    Simple(SimpleLayer),
    Group(GroupLayer),
}

impl Layer {
    pub fn id(&self) -> &str {
        match self {
            Layer::Simple(layer) => &layer.id,
            Layer::Group(layer) => &layer.id,
        }
    }

    pub fn as_simple(&self) -> Option<&SimpleLayer> {
        match self {
            Layer::Simple(layer) => Some(layer),
            Layer::Group(_) => None,
        }
    }

    /// The simple layer and its data, if this layer has anything to fetch.
    pub fn fetchable(&self) -> Option<(&SimpleLayer, &Data)> {
        let layer = self.as_simple()?;
        layer.data.as_ref().map(|data| (layer, data))
    }

    /// Depth-first walk returning every simple layer in the tree.
    pub fn simple_layers(&self) -> Vec<&SimpleLayer> {
        let mut out = Vec::new();
        self.collect_simple(&mut out);
        out
    }

    fn collect_simple<'a>(&'a self, out: &mut Vec<&'a SimpleLayer>) {
        match self {
            Layer::Simple(layer) => out.push(layer),
            Layer::Group(group) => {
                for child in &group.children {
                    child.collect_simple(out);
                }
            }
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct SimpleLayer {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
    /// Properties used as the evaluation scope for layer-level appearance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// `${name}` substitutions applied to every expression before parsing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defines: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker: Option<LayerAppearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polyline: Option<LayerAppearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polygon: Option<LayerAppearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<LayerAppearance>,
    #[serde(default, rename = "3dtiles", skip_serializing_if = "Option::is_none")]
    pub tiles3d: Option<LayerAppearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ellipsoid: Option<LayerAppearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photooverlay: Option<LayerAppearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legacy_resource: Option<LayerAppearance>,
}

impl SimpleLayer {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Data) -> Self {
        self.data = Some(data);
        self
    }

    pub fn appearance(&self, kind: AppearanceType) -> Option<&LayerAppearance> {
        match kind {
            AppearanceType::Marker => self.marker.as_ref(),
            AppearanceType::Polyline => self.polyline.as_ref(),
            AppearanceType::Polygon => self.polygon.as_ref(),
            AppearanceType::Model => self.model.as_ref(),
            AppearanceType::Tiles3d => self.tiles3d.as_ref(),
            AppearanceType::Ellipsoid => self.ellipsoid.as_ref(),
            AppearanceType::Photooverlay => self.photooverlay.as_ref(),
            AppearanceType::LegacyResource => self.legacy_resource.as_ref(),
        }
    }

    pub fn set_appearance(&mut self, kind: AppearanceType, appearance: LayerAppearance) {
        let slot = match kind {
            AppearanceType::Marker => &mut self.marker,
            AppearanceType::Polyline => &mut self.polyline,
            AppearanceType::Polygon => &mut self.polygon,
            AppearanceType::Model => &mut self.model,
            AppearanceType::Tiles3d => &mut self.tiles3d,
            AppearanceType::Ellipsoid => &mut self.ellipsoid,
            AppearanceType::Photooverlay => &mut self.photooverlay,
            AppearanceType::LegacyResource => &mut self.legacy_resource,
        };
        *slot = Some(appearance);
    }

    /// Present categories, in category order.
    pub fn appearances(&self) -> Vec<(AppearanceType, &LayerAppearance)> {
        AppearanceType::ALL
            .into_iter()
            .filter_map(|kind| self.appearance(kind).map(|a| (kind, a)))
            .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct GroupLayer {
    pub id: String,
    #[serde(default)]
    pub children: Vec<Layer>,
}
