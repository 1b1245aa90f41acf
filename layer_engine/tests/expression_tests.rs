//! End-to-end expression evaluation through the public API.

use serde_json::{Map, Value, json};

use layer_engine::AppearanceEvaluator;
use layer_engine::expression::{EvalScope, ExprValue, Program};
use layer_engine::model::ConditionsExpression;

fn props(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn eval(source: &str, properties: &Map<String, Value>) -> ExprValue {
    let program = Program::parse(source).unwrap();
    program.evaluate(&EvalScope::new(Some("feature-1"), properties)).unwrap()
}

fn eval_number(source: &str) -> f64 {
    eval(source, &Map::new()).as_number().unwrap()
}

#[test]
fn test_conditions_pick_first_truthy() {
    let evaluator = AppearanceEvaluator::default();
    let conditions = ConditionsExpression::new([("${id} === '2432432'", "2"), ("true", "1")]);

    let matching = props(json!({ "id": "2432432" }));
    let result = evaluator
        .eval_conditions(&conditions, &EvalScope::new(Some("x"), &matching), None)
        .unwrap();
    assert_eq!(result.as_number(), Some(2.0));

    let other = props(json!({ "id": "other" }));
    let result = evaluator
        .eval_conditions(&conditions, &EvalScope::new(Some("x"), &other), None)
        .unwrap();
    assert_eq!(result.as_number(), Some(1.0));
}

#[test]
fn test_no_condition_matches_is_undefined() {
    let evaluator = AppearanceEvaluator::default();
    let conditions = ConditionsExpression::new([("false", "1")]);
    let empty = Map::new();
    let result = evaluator
        .eval_conditions(&conditions, &EvalScope::new(None, &empty), None)
        .unwrap();
    assert!(result.is_undefined());
}

#[test]
fn test_math_builtins() {
    assert!((eval_number("atan2(1, 1)") - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
    assert_eq!(eval_number("Math.max(2, 7) - Math.abs(-1)"), 6.0);
    assert_eq!(eval_number("round(2.5)"), 3.0);
    assert!(eval(" 1 / 0 ", &Map::new()).as_number().is_some_and(f64::is_infinite));
}

#[test]
fn test_placeholders_and_member_access() {
    let properties = props(json!({
        "height": 12,
        "name": "Tokyo Tower",
        "address": { "city": "Tokyo" }
    }));
    assert_eq!(eval("${height} * 2", &properties).as_number(), Some(24.0));
    assert_eq!(eval("${address.city}", &properties).as_str(), Some("Tokyo"));
    assert_eq!(eval("feature.name", &properties).as_str(), Some("Tokyo Tower"));
    assert_eq!(eval("${id}", &properties).as_str(), Some("feature-1"));
    assert!(eval("${missing}", &properties).is_undefined());
}

#[test]
fn test_string_indexing() {
    let properties = props(json!({ "code": "abc" }));
    assert_eq!(eval("${code}[1]", &properties).as_str(), Some("b"));
    assert_eq!(eval("${code}.length", &properties).as_number(), Some(3.0));
    assert!(eval("${code}[-1]", &properties).is_undefined());
    assert!(eval("${code}[0.5]", &properties).is_undefined());
    assert!(eval("${code}[NaN]", &properties).is_undefined());
    assert!(eval("${code}[3]", &properties).is_undefined());
}

#[test]
fn test_spaced_placeholders() {
    let properties = props(json!({ "size": 4 }));
    assert_eq!(eval("${ size } * 2", &properties).as_number(), Some(8.0));
    assert_eq!(eval("${ id }", &properties).as_str(), Some("feature-1"));
}

#[test]
fn test_jsonpath_placeholder() {
    let properties = props(json!({
        "phoneNumbers": [
            { "type": "iPhone", "number": "0123-4567-8888" },
            { "type": "home", "number": "0123-4567-8910" }
        ]
    }));
    assert_eq!(
        eval("${$.phoneNumbers[:1].type}", &properties).as_str(),
        Some("iPhone")
    );
    let ambiguous = Program::parse("${$.phoneNumbers[*].type}").unwrap();
    assert!(ambiguous.evaluate(&EvalScope::new(None, &properties)).is_err());
}

#[test]
fn test_strings_and_colors() {
    let empty = Map::new();
    assert_eq!(eval("'a' + 1", &empty).as_str(), Some("a1"));
    assert_eq!(eval("color('red')", &empty).as_str(), Some("#ff0000"));
    assert_eq!(eval("rgba(255, 0, 0, 0.5)", &empty).as_str(), Some("#ff000080"));
    assert_eq!(
        eval("${height} > 10 ? 'tall' : 'short'", &props(json!({ "height": 3 }))).as_str(),
        Some("short")
    );
}

#[test]
fn test_regexp_methods() {
    let properties = props(json!({ "name": "Tokyo Station" }));
    assert_eq!(
        eval("regExp('tokyo', 'i').test(${name})", &properties).as_bool(),
        Some(true)
    );
    assert_eq!(
        eval("regExp('(\\\\w+) Station').exec(${name})", &properties).as_str(),
        Some("Tokyo")
    );
}

#[test]
fn test_errors_surface_as_results() {
    assert!(Program::parse("1 +").is_err());
    assert!(Program::parse("${a} == 1").is_err());
    let program = Program::parse("!'text'").unwrap();
    assert!(program.evaluate(&EvalScope::new(None, &Map::new())).is_err());
}
