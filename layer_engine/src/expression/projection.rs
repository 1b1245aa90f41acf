use serde_json::{Map, Value};

use super::references::{REEARTH_ID, REEARTH_JSONPATH, ReferenceExtractor};
use crate::model::{Feature, StyleExpression};

/// The smallest property bag that determines an expression's result for a
/// feature. Used as part of the result cache key.
pub fn get_cacheable_properties(
    extractor: &ReferenceExtractor,
    expression: &StyleExpression,
    feature: &Feature,
) -> Map<String, Value> {
    let references = extractor.get_combined_references(expression);
    project_properties(&references, &feature.id, &feature.properties)
}

pub fn project_properties(
    references: &[String],
    id: &str,
    properties: &Map<String, Value>,
) -> Map<String, Value> {
    if references.iter().any(|r| r == REEARTH_JSONPATH) {
        return properties.clone();
    }
    let mut projected = Map::new();
    for reference in references {
        if reference == REEARTH_ID {
            projected.insert("id".to_string(), Value::String(id.to_string()));
        } else if let Some(value) = properties.get(reference) {
            projected.insert(reference.clone(), value.clone());
        } else if let Some((head, _)) = reference.split_once('.') {
            // `${a.b}` walks into `a`, so all of `a` matters.
            if let Some(value) = properties.get(head) {
                projected.insert(head.to_string(), value.clone());
            }
        }
    }
    projected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn narrows_to_referenced_keys() {
        let properties = props(json!({ "test": 1, "other": 2 }));
        let projected = project_properties(&["test".to_string(), "missing".to_string()], "f", &properties);
        assert_eq!(Value::Object(projected), json!({ "test": 1 }));
    }

    #[test]
    fn sentinels() {
        let properties = props(json!({ "a": 1, "b": { "c": 2 } }));
        let id = project_properties(&[REEARTH_ID.to_string()], "f1", &properties);
        assert_eq!(Value::Object(id), json!({ "id": "f1" }));

        let all = project_properties(&[REEARTH_JSONPATH.to_string()], "f1", &properties);
        assert_eq!(all, properties);

        let dotted = project_properties(&["b.c".to_string()], "f1", &properties);
        assert_eq!(Value::Object(dotted), json!({ "b": { "c": 2 } }));
    }
}
