use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Tile/page coordinate identifying a bounded subset of a layer's features.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct DataRange {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl DataRange {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// Cache key for the range bucket. `None` maps to the empty key.
    pub fn key(range: Option<&DataRange>) -> String {
        match range {
            Some(r) => format!("{}:{}:{}", r.x, r.y, r.z),
            None => String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Feature {
    #[serde(default = "generate_feature_id", deserialize_with = "deserialize_feature_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty", deserialize_with = "deserialize_properties")]
    pub properties: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<DataRange>,
}

impl Feature {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            geometry: None,
            properties: Map::new(),
            range: None,
        }
    }

    pub fn with_properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_range(mut self, range: DataRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Parses the named string properties as JSON in place. Values that fail
    /// to parse keep their raw text.
    pub fn parse_json_properties(&self, keys: &[String]) -> Feature {
        let mut next = self.clone();
        for key in keys {
            if let Some(Value::String(raw)) = next.properties.get(key) {
                if let Ok(parsed) = serde_json::from_str::<Value>(raw) {
                    next.properties.insert(key.clone(), parsed);
                }
            }
        }
        next
    }
}

fn generate_feature_id() -> String {
    Uuid::new_v4().to_string()
}

// GeoJSON allows numeric ids; everything downstream compares strings.
fn deserialize_feature_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(generate_feature_id()),
        other => Err(serde::de::Error::custom(format!(
            "feature id must be a string or number, got {}",
            other
        ))),
    }
}

// GeoJSON writes `"properties": null` for bare geometries.
fn deserialize_properties<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}
