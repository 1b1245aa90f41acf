use log::warn;
use serde_json::{Map, Value};

use super::ast::{BinaryOp, Node, UnaryOp};
use super::functions::call_builtin;
use super::value::ExprValue;
use crate::error::LayerError;

/// What an expression can see: an id and a property bag.
///
/// For features this is the feature id and properties; for layer-level
/// appearance it is the layer id and the layer's own properties.
#[derive(Clone, Copy, Debug)]
pub struct EvalScope<'a> {
    pub id: Option<&'a str>,
    pub properties: &'a Map<String, Value>,
}

impl<'a> EvalScope<'a> {
    pub fn new(id: Option<&'a str>, properties: &'a Map<String, Value>) -> Self {
        Self { id, properties }
    }

    /// Properties first, then `id` falls back to the scope id, then dotted
    /// paths walk nested objects. Anything else is `undefined`.
    pub fn resolve(&self, name: &str) -> ExprValue {
        if let Some(value) = self.properties.get(name) {
            return ExprValue::from(value);
        }
        if name == "id" {
            if let Some(id) = self.id {
                return ExprValue::from(id);
            }
        }
        if name.contains('.') {
            let mut parts = name.split('.');
            let mut current = parts.next().and_then(|head| self.properties.get(head));
            for part in parts {
                current = current.and_then(|value| child(value, part));
            }
            if let Some(value) = current {
                return ExprValue::from(value);
            }
        }
        ExprValue::Undefined
    }
}

fn child<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

impl Node {
    pub fn evaluate(&self, scope: &EvalScope) -> Result<ExprValue, LayerError> {
        match self {
            Node::Literal(value) => Ok(value.clone()),
            Node::Variable(name) => Ok(scope.resolve(name)),
            Node::JsonPath(path) => {
                let root = Value::Object(scope.properties.clone());
                path.select_one(&root).map(ExprValue::from)
            }
            Node::Feature => Ok(ExprValue::Object(scope.properties.clone())),
            Node::Array(items) => items
                .iter()
                .map(|item| item.evaluate(scope))
                .collect::<Result<Vec<_>, _>>()
                .map(ExprValue::Array),
            Node::Unary(op, operand) => eval_unary(*op, operand.evaluate(scope)?),
            Node::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, scope),
            Node::Conditional {
                test,
                consequent,
                alternate,
            } => match test.evaluate(scope)? {
                ExprValue::Boolean(true) => consequent.evaluate(scope),
                ExprValue::Boolean(false) => alternate.evaluate(scope),
                other => Err(LayerError::expression(format!(
                    "Conditional argument of conditional expression must be a boolean. Argument is {}.",
                    other
                ))),
            },
            Node::Member { object, property } => {
                let key = property.evaluate(scope)?;
                if matches!(object.as_ref(), Node::Feature) {
                    return Ok(member_of_map(scope.properties, &key));
                }
                let target = object.evaluate(scope)?;
                Ok(member(&target, &key))
            }
            Node::Call { name, args } => {
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                call_builtin(name, &args)
            }
            Node::MethodCall { object, name, args } => {
                let target = object.evaluate(scope)?;
                let args = args
                    .iter()
                    .map(|arg| arg.evaluate(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                call_method(&target, name, &args)
            }
        }
    }
}

fn eval_unary(op: UnaryOp, operand: ExprValue) -> Result<ExprValue, LayerError> {
    match (op, operand) {
        (UnaryOp::Not, ExprValue::Boolean(b)) => Ok(ExprValue::Boolean(!b)),
        (UnaryOp::Negate, ExprValue::Number(n)) => Ok(ExprValue::number(-n.into_inner())),
        (UnaryOp::Plus, value @ ExprValue::Number(_)) => Ok(value),
        (UnaryOp::Not, other) => Err(LayerError::expression(format!(
            "Operator \"!\" requires a boolean argument. Argument is {}.",
            other
        ))),
        (UnaryOp::Negate, other) => Err(LayerError::expression(format!(
            "Operator \"-\" requires a number argument. Argument is {}.",
            other
        ))),
        (UnaryOp::Plus, other) => Err(LayerError::expression(format!(
            "Operator \"+\" requires a number argument. Argument is {}.",
            other
        ))),
    }
}

fn eval_logical(
    op: BinaryOp,
    lhs: &Node,
    rhs: &Node,
    scope: &EvalScope,
) -> Result<ExprValue, LayerError> {
    let left = lhs.evaluate(scope)?;
    let Some(left) = left.as_bool() else {
        warn!(
            "Operator \"{}\" requires boolean arguments. First argument is {}.",
            op.symbol(),
            left
        );
        return Ok(ExprValue::Boolean(false));
    };
    if (op == BinaryOp::Or && left) || (op == BinaryOp::And && !left) {
        return Ok(ExprValue::Boolean(left));
    }
    let right = rhs.evaluate(scope)?;
    Ok(ExprValue::Boolean(match right.as_bool() {
        Some(right) => right,
        None => {
            warn!(
                "Operator \"{}\" requires boolean arguments. Second argument is {}.",
                op.symbol(),
                right
            );
            false
        }
    }))
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Node,
    rhs: &Node,
    scope: &EvalScope,
) -> Result<ExprValue, LayerError> {
    if matches!(op, BinaryOp::And | BinaryOp::Or) {
        return eval_logical(op, lhs, rhs, scope);
    }

    let left = lhs.evaluate(scope)?;
    let right = rhs.evaluate(scope)?;
    match op {
        BinaryOp::StrictEq => Ok(ExprValue::Boolean(left.strict_equals(&right))),
        BinaryOp::StrictNe => Ok(ExprValue::Boolean(!left.strict_equals(&right))),
        BinaryOp::Add => match (&left, &right) {
            (ExprValue::Number(a), ExprValue::Number(b)) => {
                Ok(ExprValue::number(a.into_inner() + b.into_inner()))
            }
            (ExprValue::String(_), _) | (_, ExprValue::String(_)) => {
                Ok(ExprValue::String(format!("{}{}", left, right)))
            }
            _ => Err(LayerError::expression(format!(
                "Operator \"+\" requires number arguments, or at least one string argument. Arguments are {} and {}.",
                left, right
            ))),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
            match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => Ok(ExprValue::number(match op {
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    _ => a % b,
                })),
                _ => Err(LayerError::expression(format!(
                    "Operator \"{}\" requires number arguments. Arguments are {} and {}.",
                    op.symbol(),
                    left,
                    right
                ))),
            }
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
                warn!(
                    "Operator \"{}\" requires number arguments. Arguments are {} and {}.",
                    op.symbol(),
                    left,
                    right
                );
                return Ok(ExprValue::Boolean(false));
            };
            Ok(ExprValue::Boolean(match op {
                BinaryOp::Lt => a < b,
                BinaryOp::Le => a <= b,
                BinaryOp::Gt => a > b,
                _ => a >= b,
            }))
        }
        BinaryOp::Match | BinaryOp::NotMatch => {
            let matched = match (&left, &right) {
                (ExprValue::RegExp(re), ExprValue::String(s))
                | (ExprValue::String(s), ExprValue::RegExp(re)) => re.test(s),
                _ => {
                    return Err(LayerError::expression(format!(
                        "Operator \"{}\" requires one RegExp argument and one string argument. Arguments are {} and {}.",
                        op.symbol(),
                        left,
                        right
                    )));
                }
            };
            Ok(ExprValue::Boolean(if op == BinaryOp::Match {
                matched
            } else {
                !matched
            }))
        }
        BinaryOp::And | BinaryOp::Or => Ok(ExprValue::Boolean(
            match (left.as_bool(), right.as_bool()) {
                (Some(a), Some(b)) if op == BinaryOp::And => a && b,
                (Some(a), Some(b)) => a || b,
                _ => false,
            },
        )),
    }
}

fn property_key(key: &ExprValue) -> String {
    key.to_string()
}

fn member_of_map(map: &Map<String, Value>, key: &ExprValue) -> ExprValue {
    map.get(&property_key(key))
        .map(ExprValue::from)
        .unwrap_or(ExprValue::Undefined)
}

fn member(target: &ExprValue, key: &ExprValue) -> ExprValue {
    match target {
        ExprValue::Object(map) => member_of_map(map, key),
        ExprValue::Array(items) => match key {
            ExprValue::Number(n) => {
                let n = n.into_inner();
                if n >= 0.0 && n.fract() == 0.0 {
                    items.get(n as usize).cloned().unwrap_or(ExprValue::Undefined)
                } else {
                    ExprValue::Undefined
                }
            }
            ExprValue::String(s) if s == "length" => ExprValue::number(items.len() as f64),
            _ => ExprValue::Undefined,
        },
        ExprValue::String(s) => match key {
            ExprValue::Number(n) => {
                let n = n.into_inner();
                if n >= 0.0 && n.fract() == 0.0 {
                    s.chars()
                        .nth(n as usize)
                        .map(|c| ExprValue::String(c.to_string()))
                        .unwrap_or(ExprValue::Undefined)
                } else {
                    ExprValue::Undefined
                }
            }
            ExprValue::String(k) if k == "length" => {
                ExprValue::number(s.chars().count() as f64)
            }
            _ => ExprValue::Undefined,
        },
        _ => ExprValue::Undefined,
    }
}

fn call_method(target: &ExprValue, name: &str, args: &[ExprValue]) -> Result<ExprValue, LayerError> {
    match (target, name) {
        (ExprValue::RegExp(re), "toString") => Ok(ExprValue::String(re.to_string())),
        (ExprValue::RegExp(re), "test" | "exec") => {
            let Some(ExprValue::String(haystack)) = args.first() else {
                return Err(LayerError::expression(format!(
                    "RegExp.{} requires the first argument to be a RegExp and the second argument to be a string. Arguments are {} and {}.",
                    name,
                    target,
                    args.first().cloned().unwrap_or(ExprValue::Undefined)
                )));
            };
            Ok(if name == "test" {
                ExprValue::Boolean(re.test(haystack))
            } else {
                re.exec(haystack)
            })
        }
        _ => Err(LayerError::expression(format!(
            "Unexpected function call \"{}\".",
            name
        ))),
    }
}
