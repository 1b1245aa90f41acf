//! Reference scanning and property projection, the inputs of the result cache key.

use serde_json::{Map, Value, json};

use layer_engine::expression::{
    REEARTH_ID, REEARTH_JSONPATH, ReferenceExtractor, get_cacheable_properties,
};
use layer_engine::model::{ConditionsExpression, Feature, StyleExpression};

fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[test]
fn test_single_variable() {
    let extractor = ReferenceExtractor::default();
    assert_eq!(*extractor.get_references("color: ${test_var}"), vec!["test_var"]);
}

#[test]
fn test_sentinels_short_circuit() {
    let extractor = ReferenceExtractor::default();
    assert_eq!(*extractor.get_references("${id}"), vec![REEARTH_ID]);
    assert_eq!(*extractor.get_references("${a} + ${id}"), vec![REEARTH_ID]);
    assert_eq!(
        *extractor.get_references("${$.['x']}"),
        vec![REEARTH_JSONPATH]
    );
}

#[test]
fn test_quoted_placeholder_is_literal_text() {
    let extractor = ReferenceExtractor::default();
    assert!(extractor.get_references("'${not_a_ref}'").is_empty());
    assert!(extractor.get_references("1 + 2").is_empty());
}

#[test]
fn test_combined_references_keep_order_and_duplicates() {
    let extractor = ReferenceExtractor::default();
    let conditions = StyleExpression::Conditions(ConditionsExpression::new([
        ("${a} > 1", "${b}"),
        ("${a} < 0", "${c}"),
    ]));
    assert_eq!(
        extractor.get_combined_references(&conditions),
        vec!["a", "b", "a", "c"]
    );
}

#[test]
fn test_cacheable_properties_project_referenced_keys() {
    let extractor = ReferenceExtractor::default();
    let feature = Feature::new("f1").with_properties(props(json!({
        "test": 3,
        "other": "ignored",
        "nested": { "deep": true }
    })));

    let only_test = StyleExpression::from("${test} * 2");
    assert_eq!(
        Value::Object(get_cacheable_properties(&extractor, &only_test, &feature)),
        json!({ "test": 3 })
    );

    let nested = StyleExpression::from("${nested.deep}");
    assert_eq!(
        Value::Object(get_cacheable_properties(&extractor, &nested, &feature)),
        json!({ "nested": { "deep": true } })
    );

    let by_id = StyleExpression::from("${id} === 'f1'");
    assert_eq!(
        Value::Object(get_cacheable_properties(&extractor, &by_id, &feature)),
        json!({ "id": "f1" })
    );

    let jsonpath = StyleExpression::from("${$.test}");
    assert_eq!(
        get_cacheable_properties(&extractor, &jsonpath, &feature),
        feature.properties
    );
}

#[test]
fn test_missing_references_project_to_nothing() {
    let extractor = ReferenceExtractor::default();
    let feature = Feature::new("f1");
    let expression = StyleExpression::from("${absent}");
    assert!(get_cacheable_properties(&extractor, &expression, &feature).is_empty());
}
