//! nom grammar for style expressions.
//!
//! Precedence, loosest first: `?:`, `||`, `&&`, `=== !== =~ !~`,
//! `< <= > >=`, `+ -`, `* / %`, unary `! - +`, postfix member/call.

use std::f64::consts::{E, PI};

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, map, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, tuple},
};

use super::ast::{BinaryOp, Node, UnaryOp};
use super::jsonpath::JsonPath;
use super::value::ExprValue;
use crate::error::LayerError;

pub fn parse(source: &str) -> Result<Node, LayerError> {
    all_consuming(ws(expression))(source)
        .map(|(_, node)| node)
        .map_err(|e| LayerError::expression(format!("failed to parse `{}`: {}", source, e)))
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn fail<O>(input: &str, kind: ErrorKind) -> IResult<&str, O> {
    Err(nom::Err::Error(NomError::new(input, kind)))
}

fn expression(input: &str) -> IResult<&str, Node> {
    conditional(input)
}

fn conditional(input: &str) -> IResult<&str, Node> {
    let (input, test) = logical_or(input)?;
    let (input, branches) = opt(tuple((
        ws(char('?')),
        expression,
        ws(char(':')),
        expression,
    )))(input)?;
    Ok(match branches {
        Some((_, consequent, _, alternate)) => (
            input,
            Node::Conditional {
                test: Box::new(test),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            },
        ),
        None => (input, test),
    })
}

fn left_assoc<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, Node>,
    operator: fn(&'a str) -> IResult<&'a str, BinaryOp>,
) -> IResult<&'a str, Node> {
    let (mut input, mut lhs) = operand(input)?;
    loop {
        match operator(input) {
            Ok((rest, op)) => {
                let (rest, rhs) = operand(rest)?;
                lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, lhs)),
            Err(e) => return Err(e),
        }
    }
}

fn logical_or(input: &str) -> IResult<&str, Node> {
    left_assoc(input, logical_and, |i| {
        ws(value(BinaryOp::Or, tag("||")))(i)
    })
}

fn logical_and(input: &str) -> IResult<&str, Node> {
    left_assoc(input, equality, |i| {
        ws(value(BinaryOp::And, tag("&&")))(i)
    })
}

fn equality(input: &str) -> IResult<&str, Node> {
    left_assoc(input, relational, |i| {
        ws(alt((
            value(BinaryOp::StrictEq, tag("===")),
            value(BinaryOp::StrictNe, tag("!==")),
            value(BinaryOp::Match, tag("=~")),
            value(BinaryOp::NotMatch, tag("!~")),
        )))(i)
    })
}

fn relational(input: &str) -> IResult<&str, Node> {
    left_assoc(input, additive, |i| {
        ws(alt((
            value(BinaryOp::Le, tag("<=")),
            value(BinaryOp::Ge, tag(">=")),
            value(BinaryOp::Lt, tag("<")),
            value(BinaryOp::Gt, tag(">")),
        )))(i)
    })
}

fn additive(input: &str) -> IResult<&str, Node> {
    left_assoc(input, multiplicative, |i| {
        ws(alt((
            value(BinaryOp::Add, char('+')),
            value(BinaryOp::Sub, char('-')),
        )))(i)
    })
}

fn multiplicative(input: &str) -> IResult<&str, Node> {
    left_assoc(input, unary, |i| {
        ws(alt((
            value(BinaryOp::Mul, char('*')),
            value(BinaryOp::Div, char('/')),
            value(BinaryOp::Mod, char('%')),
        )))(i)
    })
}

fn prefixed<'a>(op: UnaryOp, symbol: char) -> impl FnMut(&'a str) -> IResult<&'a str, Node> {
    map(preceded(ws(char(symbol)), unary), move |operand| {
        Node::Unary(op, Box::new(operand))
    })
}

fn unary(input: &str) -> IResult<&str, Node> {
    alt((
        prefixed(UnaryOp::Not, '!'),
        prefixed(UnaryOp::Negate, '-'),
        prefixed(UnaryOp::Plus, '+'),
        postfix,
    ))(input)
}

enum Suffix {
    Member(String),
    Index(Node),
    Method(String, Vec<Node>),
}

fn postfix(input: &str) -> IResult<&str, Node> {
    let (input, base) = ws(primary)(input)?;
    let (input, suffixes) = many0(suffix)(input)?;
    let node = suffixes.into_iter().fold(base, |object, suffix| match suffix {
        Suffix::Member(name) => Node::Member {
            object: Box::new(object),
            property: Box::new(Node::Literal(ExprValue::String(name))),
        },
        Suffix::Index(property) => Node::Member {
            object: Box::new(object),
            property: Box::new(property),
        },
        Suffix::Method(name, args) => Node::MethodCall {
            object: Box::new(object),
            name,
            args,
        },
    });
    Ok((input, node))
}

fn suffix(input: &str) -> IResult<&str, Suffix> {
    alt((
        map(
            pair(preceded(ws(char('.')), identifier), opt(arguments)),
            |(name, args)| match args {
                Some(args) => Suffix::Method(name.to_string(), args),
                None => Suffix::Member(name.to_string()),
            },
        ),
        map(
            delimited(ws(char('[')), expression, ws(char(']'))),
            Suffix::Index,
        ),
    ))(input)
}

fn arguments(input: &str) -> IResult<&str, Vec<Node>> {
    delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), expression),
        ws(char(')')),
    )(input)
}

fn primary(input: &str) -> IResult<&str, Node> {
    alt((
        map(number, |n| Node::Literal(ExprValue::number(n))),
        map(string_literal, |s| Node::Literal(ExprValue::String(s))),
        placeholder,
        map(
            delimited(
                ws(char('[')),
                separated_list0(ws(char(',')), expression),
                ws(char(']')),
            ),
            Node::Array,
        ),
        delimited(ws(char('(')), expression, ws(char(')'))),
        named,
    ))(input)
}

fn number(input: &str) -> IResult<&str, f64> {
    let (rest, text) = recognize(pair(
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    ))(input)?;
    match text.parse::<f64>() {
        Ok(n) => Ok((rest, n)),
        Err(_) => fail(input, ErrorKind::Float),
    }
}

fn string_literal(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, c @ ('\'' | '"'))) => c,
        _ => return fail(input, ErrorKind::Char),
    };
    let mut out = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            out.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((&input[i + c.len_utf8()..], out));
        } else {
            out.push(c);
        }
    }
    // Unterminated literal: nothing else can match here.
    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Char)))
}

fn placeholder(input: &str) -> IResult<&str, Node> {
    let (rest, body) = delimited(tag("${"), take_until("}"), char('}'))(input)?;
    let body = body.trim();
    if body.starts_with('$') {
        let path = JsonPath::parse(body)
            .map_err(|_| nom::Err::Failure(NomError::new(input, ErrorKind::Verify)))?;
        Ok((rest, Node::JsonPath(path)))
    } else {
        Ok((rest, Node::Variable(body.to_string())))
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)
}

/// Keywords, namespaced constants and function calls.
fn named(input: &str) -> IResult<&str, Node> {
    let (rest, name) = identifier(input)?;
    if let Ok((rest, args)) = arguments(rest) {
        return Ok((
            rest,
            Node::Call {
                name: name.to_string(),
                args,
            },
        ));
    }
    let literal = match name {
        "true" => ExprValue::Boolean(true),
        "false" => ExprValue::Boolean(false),
        "null" => ExprValue::Null,
        "undefined" => ExprValue::Undefined,
        "NaN" => ExprValue::number(f64::NAN),
        "Infinity" => ExprValue::number(f64::INFINITY),
        "feature" => return Ok((rest, Node::Feature)),
        "Math" | "Number" => return namespaced(name, rest),
        _ => return fail(input, ErrorKind::Tag),
    };
    Ok((rest, Node::Literal(literal)))
}

fn namespaced<'a>(namespace: &str, input: &'a str) -> IResult<&'a str, Node> {
    let (rest, member) = preceded(ws(char('.')), identifier)(input)?;
    if let Ok((rest, args)) = arguments(rest) {
        // `Math.abs(x)` is the same builtin as `abs(x)`.
        if namespace == "Math" {
            return Ok((
                rest,
                Node::Call {
                    name: member.to_string(),
                    args,
                },
            ));
        }
        return fail(input, ErrorKind::Tag);
    }
    let constant = match (namespace, member) {
        ("Math", "PI") => PI,
        ("Math", "E") => E,
        ("Number", "POSITIVE_INFINITY") => f64::INFINITY,
        ("Number", "NEGATIVE_INFINITY") => f64::NEG_INFINITY,
        ("Number", "MAX_VALUE") => f64::MAX,
        ("Number", "EPSILON") => f64::EPSILON,
        ("Number", "NaN") => f64::NAN,
        _ => return fail(input, ErrorKind::Tag),
    };
    Ok((rest, Node::Literal(ExprValue::number(constant))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(node: &Node) -> (BinaryOp, &Node, &Node) {
        match node {
            Node::Binary(op, lhs, rhs) => (*op, lhs, rhs),
            other => panic!("expected binary node, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let node = parse("1 + 2 * 3").unwrap();
        let (op, lhs, rhs) = binary(&node);
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(lhs, Node::Literal(v) if *v == ExprValue::number(1.0)));
        assert_eq!(binary(rhs).0, BinaryOp::Mul);
    }

    #[test]
    fn placeholder_comparison() {
        let node = parse("${id} === '2432432'").unwrap();
        let (op, lhs, rhs) = binary(&node);
        assert_eq!(op, BinaryOp::StrictEq);
        assert!(matches!(lhs, Node::Variable(name) if name == "id"));
        assert!(matches!(rhs, Node::Literal(ExprValue::String(s)) if s == "2432432"));
    }

    #[test]
    fn jsonpath_placeholder() {
        let node = parse("${$.phoneNumbers[:1].type}").unwrap();
        assert!(matches!(node, Node::JsonPath(_)));
    }

    #[test]
    fn loose_equality_is_rejected() {
        assert!(parse("${a} == 1").is_err());
        assert!(parse("1 +").is_err());
        assert!(parse("'open").is_err());
    }

    #[test]
    fn member_calls_and_constants() {
        let node = parse("regExp('^a', 'i').test(feature['name'])").unwrap();
        match node {
            Node::MethodCall { name, args, .. } => {
                assert_eq!(name, "test");
                assert!(matches!(args[0], Node::Member { .. }));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(parse("Math.PI").unwrap(), Node::Literal(_)));
        assert!(matches!(parse("Math.abs(-1)").unwrap(), Node::Call { .. }));
    }

    #[test]
    fn conditional_and_escapes() {
        let node = parse("true ? 'it\\'s' : \"no\"").unwrap();
        match node {
            Node::Conditional { consequent, .. } => {
                assert!(matches!(*consequent, Node::Literal(ExprValue::String(ref s)) if s == "it's"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
