//! Owner-keyed appearance overrides, merged at read time.

use serde_json::{Map, Value};

use crate::model::{AppearanceType, Appearances, ComputedFeature};

/// Ordered override stack; later entries win. The anonymous owner `""`
/// always sits at the bottom.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct OverrideStore {
    entries: Vec<(String, Map<String, Value>)>,
}

impl OverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets, replaces or (with `None`) removes `owner`'s override. A named
    /// owner moves to the top of the stack.
    pub fn set(&mut self, owner: &str, overrides: Option<Value>) {
        self.entries.retain(|(existing, _)| existing != owner);
        let Some(overrides) = overrides else {
            return;
        };
        let admitted = admit(overrides);
        if owner.is_empty() {
            self.entries.insert(0, (String::new(), admitted));
        } else {
            self.entries.push((owner.to_string(), admitted));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(owner, _)| owner.as_str())
    }

    /// Left fold of [`merge_property`] over the stack.
    pub fn merged(&self) -> Option<Value> {
        if self.entries.is_empty() {
            return None;
        }
        Some(
            self.entries
                .iter()
                .fold(Value::Object(Map::new()), |acc, (_, entry)| {
                    merge_property(&acc, &Value::Object(entry.clone()))
                }),
        )
    }

    pub fn apply(&self, feature: &ComputedFeature) -> ComputedFeature {
        match self.merged() {
            Some(merged) => apply_merged(feature, &merged),
            None => feature.clone(),
        }
    }
}

pub(crate) fn apply_merged(feature: &ComputedFeature, merged: &Value) -> ComputedFeature {
    let appearances = merge_property(&feature.appearances.to_value(), merged);
    ComputedFeature::new(feature.feature.clone(), Appearances::from_value(&appearances))
}

/// Keeps only appearance category keys. Anything else is dropped silently.
pub fn admit(overrides: Value) -> Map<String, Value> {
    match overrides {
        Value::Object(map) => map
            .into_iter()
            .filter(|(key, _)| AppearanceType::from_key(key).is_some())
            .collect(),
        _ => Map::new(),
    }
}

/// Two-level merge. Both sides objects: every base key is kept; where both
/// values of a key are objects the override's entries are assigned over the
/// base's, otherwise the override value replaces the base value (arrays
/// included). Anything else yields a clone of `over`.
pub fn merge_property(base: &Value, over: &Value) -> Value {
    let (Value::Object(base), Value::Object(over)) = (base, over) else {
        return over.clone();
    };
    let mut merged = base.clone();
    for (key, value) in over {
        let next = match (merged.get(key), value) {
            (Some(Value::Object(inner)), Value::Object(over_inner)) => {
                let mut inner = inner.clone();
                for (k, v) in over_inner {
                    inner.insert(k.clone(), v.clone());
                }
                Value::Object(inner)
            }
            _ => value.clone(),
        };
        merged.insert(key.clone(), next);
    }
    Value::Object(merged)
}
