//! Appearance categories and the field values that style them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The closed set of appearance categories a layer can carry.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum AppearanceType {
    #[serde(rename = "marker")]
    Marker,
    #[serde(rename = "polyline")]
    Polyline,
    #[serde(rename = "polygon")]
    Polygon,
    #[serde(rename = "model")]
    Model,
    #[serde(rename = "3dtiles")]
    Tiles3d,
    #[serde(rename = "ellipsoid")]
    Ellipsoid,
    #[serde(rename = "photooverlay")]
    Photooverlay,
    #[serde(rename = "legacy_resource")]
    LegacyResource,
}

impl AppearanceType {
    pub const ALL: [AppearanceType; 8] = [
        AppearanceType::Marker,
        AppearanceType::Polyline,
        AppearanceType::Polygon,
        AppearanceType::Model,
        AppearanceType::Tiles3d,
        AppearanceType::Ellipsoid,
        AppearanceType::Photooverlay,
        AppearanceType::LegacyResource,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppearanceType::Marker => "marker",
            AppearanceType::Polyline => "polyline",
            AppearanceType::Polygon => "polygon",
            AppearanceType::Model => "model",
            AppearanceType::Tiles3d => "3dtiles",
            AppearanceType::Ellipsoid => "ellipsoid",
            AppearanceType::Photooverlay => "photooverlay",
            AppearanceType::LegacyResource => "legacy_resource",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == key)
    }
}

/// Ordered `[condition, value]` pairs; the first truthy condition selects its value.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ConditionsExpression {
    pub conditions: Vec<(String, String)>,
}

impl ConditionsExpression {
    pub fn new<C, V>(conditions: impl IntoIterator<Item = (C, V)>) -> Self
    where
        C: Into<String>,
        V: Into<String>,
    {
        Self {
            conditions: conditions
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(untagged)]
pub enum StyleExpression {
    Conditions(ConditionsExpression),
    Source(String),
}

impl From<&str> for StyleExpression {
    fn from(source: &str) -> Self {
        StyleExpression::Source(source.to_string())
    }
}

impl From<ConditionsExpression> for StyleExpression {
    fn from(conditions: ConditionsExpression) -> Self {
        StyleExpression::Conditions(conditions)
    }
}

/// `{ "expression": ... }` wrapper used by older layer documents.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct ExpressionContainer {
    pub expression: Box<AppearanceValue>,
}

/// A single appearance field as authored on a layer.
///
/// Strings are expression sources: `"'#FF0000'"` evaluates to `#FF0000` and
/// `"1"` to the number `1`. Any other JSON value passes through unchanged.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(untagged)]
pub enum AppearanceValue {
    Expression(StyleExpression),
    Container(ExpressionContainer),
    Literal(Value),
}

impl AppearanceValue {
    pub fn source(source: impl Into<String>) -> Self {
        AppearanceValue::Expression(StyleExpression::Source(source.into()))
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        AppearanceValue::Literal(value.into())
    }

    /// The expression to evaluate, if this field is not a plain literal.
    pub fn expression(&self) -> Option<&StyleExpression> {
        match self {
            AppearanceValue::Expression(expression) => Some(expression),
            AppearanceValue::Container(container) => container.expression.expression(),
            AppearanceValue::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            AppearanceValue::Expression(_) => None,
            AppearanceValue::Container(container) => container.expression.as_literal(),
            AppearanceValue::Literal(value) => Some(value),
        }
    }
}

impl From<ConditionsExpression> for AppearanceValue {
    fn from(conditions: ConditionsExpression) -> Self {
        AppearanceValue::Expression(StyleExpression::Conditions(conditions))
    }
}

pub type LayerAppearance = BTreeMap<String, AppearanceValue>;

/// Evaluated, render-ready appearance: category → field → value.
#[derive(Serialize, Clone, PartialEq, Debug, Default)]
#[serde(transparent)]
pub struct Appearances(BTreeMap<AppearanceType, Map<String, Value>>);

impl Appearances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: AppearanceType, fields: Map<String, Value>) {
        self.0.insert(kind, fields);
    }

    pub fn get(&self, kind: AppearanceType) -> Option<&Map<String, Value>> {
        self.0.get(&kind)
    }

    pub fn field(&self, kind: AppearanceType, name: &str) -> Option<&Value> {
        self.0.get(&kind).and_then(|fields| fields.get(name))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AppearanceType, &Map<String, Value>)> {
        self.0.iter()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(kind, fields)| (kind.as_str().to_string(), Value::Object(fields.clone())))
                .collect(),
        )
    }

    /// Rebuilds from a JSON object, keeping only known categories whose value is an object.
    pub fn from_value(value: &Value) -> Self {
        let mut out = Self::new();
        if let Value::Object(map) = value {
            for (key, fields) in map {
                if let (Some(kind), Value::Object(fields)) = (AppearanceType::from_key(key), fields) {
                    out.insert(kind, fields.clone());
                }
            }
        }
        out
    }
}

impl FromIterator<(AppearanceType, Map<String, Value>)> for Appearances {
    fn from_iter<I: IntoIterator<Item = (AppearanceType, Map<String, Value>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
