use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde_json::{Map, Number, Value};

use super::functions::Pattern;

/// Runtime value produced by expression evaluation.
#[derive(Clone, Debug)]
pub enum ExprValue {
    Undefined,
    Null,
    Boolean(bool),
    Number(OrderedFloat<f64>),
    String(String),
    Array(Vec<ExprValue>),
    Object(Map<String, Value>),
    RegExp(Arc<Pattern>),
}

impl ExprValue {
    pub fn number(n: f64) -> Self {
        ExprValue::Number(OrderedFloat(n))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ExprValue::Number(n) => Some(n.into_inner()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExprValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExprValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, ExprValue::Undefined)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ExprValue::Undefined => "undefined",
            ExprValue::Null => "null",
            ExprValue::Boolean(_) => "boolean",
            ExprValue::Number(_) => "number",
            ExprValue::String(_) => "string",
            ExprValue::Array(_) => "array",
            ExprValue::Object(_) => "object",
            ExprValue::RegExp(_) => "regexp",
        }
    }

    /// JavaScript truthiness, used to select a matching condition.
    pub fn is_truthy(&self) -> bool {
        match self {
            ExprValue::Undefined | ExprValue::Null => false,
            ExprValue::Boolean(b) => *b,
            ExprValue::Number(n) => {
                let n = n.into_inner();
                n != 0.0 && !n.is_nan()
            }
            ExprValue::String(s) => !s.is_empty(),
            ExprValue::Array(_) | ExprValue::Object(_) | ExprValue::RegExp(_) => true,
        }
    }

    /// `===` semantics: no coercion, `NaN` is never equal to itself.
    pub fn strict_equals(&self, other: &ExprValue) -> bool {
        match (self, other) {
            (ExprValue::Undefined, ExprValue::Undefined) => true,
            (ExprValue::Null, ExprValue::Null) => true,
            (ExprValue::Boolean(a), ExprValue::Boolean(b)) => a == b,
            (ExprValue::Number(a), ExprValue::Number(b)) => a.into_inner() == b.into_inner(),
            (ExprValue::String(a), ExprValue::String(b)) => a == b,
            (ExprValue::Array(a), ExprValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_equals(y))
            }
            (ExprValue::Object(a), ExprValue::Object(b)) => a == b,
            (ExprValue::RegExp(a), ExprValue::RegExp(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `Number(x)` conversion.
    pub fn to_number(&self) -> f64 {
        match self {
            ExprValue::Undefined => f64::NAN,
            ExprValue::Null => 0.0,
            ExprValue::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            ExprValue::Number(n) => n.into_inner(),
            ExprValue::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            ExprValue::Array(items) if items.is_empty() => 0.0,
            ExprValue::Array(items) if items.len() == 1 => items[0].to_number(),
            _ => f64::NAN,
        }
    }

    /// Converts to JSON for storage in an evaluated appearance.
    /// `Undefined` has no JSON form and yields `None`.
    pub fn into_json(self) -> Option<Value> {
        match self {
            ExprValue::Undefined => None,
            ExprValue::Null => Some(Value::Null),
            ExprValue::Boolean(b) => Some(Value::Bool(b)),
            ExprValue::Number(n) => Some(number_to_json(n.into_inner())),
            ExprValue::String(s) => Some(Value::String(s)),
            ExprValue::Array(items) => Some(Value::Array(
                items
                    .into_iter()
                    .map(|item| item.into_json().unwrap_or(Value::Null))
                    .collect(),
            )),
            ExprValue::Object(map) => Some(Value::Object(map)),
            ExprValue::RegExp(re) => Some(Value::String(re.to_string())),
        }
    }
}

fn number_to_json(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= (i64::MAX as f64) {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Formats a number the way `String(n)` does for the common cases.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Undefined => write!(f, "undefined"),
            ExprValue::Null => write!(f, "null"),
            ExprValue::Boolean(b) => write!(f, "{}", b),
            ExprValue::Number(n) => write!(f, "{}", format_number(n.into_inner())),
            ExprValue::String(s) => write!(f, "{}", s),
            ExprValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            ExprValue::Object(_) => write!(f, "[object Object]"),
            ExprValue::RegExp(re) => write!(f, "{}", re),
        }
    }
}

impl PartialEq for ExprValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Structural equality for tests and caching; NaN equals NaN here.
            (ExprValue::Number(a), ExprValue::Number(b)) => a == b,
            (ExprValue::RegExp(a), ExprValue::RegExp(b)) => a == b,
            _ => self.strict_equals(other),
        }
    }
}

impl From<&Value> for ExprValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => ExprValue::Null,
            Value::Bool(b) => ExprValue::Boolean(*b),
            Value::Number(n) => ExprValue::number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => ExprValue::String(s.clone()),
            Value::Array(items) => ExprValue::Array(items.iter().map(ExprValue::from).collect()),
            Value::Object(map) => ExprValue::Object(map.clone()),
        }
    }
}

impl From<f64> for ExprValue {
    fn from(value: f64) -> Self {
        ExprValue::number(value)
    }
}

impl From<bool> for ExprValue {
    fn from(value: bool) -> Self {
        ExprValue::Boolean(value)
    }
}

impl From<String> for ExprValue {
    fn from(value: String) -> Self {
        ExprValue::String(value)
    }
}

impl From<&str> for ExprValue {
    fn from(value: &str) -> Self {
        ExprValue::String(value.to_string())
    }
}
