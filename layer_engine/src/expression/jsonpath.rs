//! The JSONPath subset accepted inside `${$...}` placeholders.
//!
//! Supported: `$`, `.name`, `['name']`/`["name"]`, `[n]` (negative counts from
//! the end), `[start:end:step]`, `*` / `[*]`, and `..name` descent.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, tuple},
};
use serde_json::Value;

use crate::error::LayerError;

#[derive(Clone, PartialEq, Debug)]
pub enum Segment {
    Child(String),
    Index(i64),
    Slice {
        start: Option<i64>,
        end: Option<i64>,
        step: Option<i64>,
    },
    Wildcard,
    Descendant(String),
}

#[derive(Clone, PartialEq, Debug)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(source: &str) -> Result<Self, LayerError> {
        let (_, segments) = all_consuming(path)(source.trim())
            .map_err(|e| LayerError::JsonPath(format!("invalid path `{}`: {}", source, e)))?;
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn select<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                apply_segment(segment, node, &mut next);
            }
            current = next;
        }
        current
    }

    /// Selects exactly one value; zero or several matches are an error.
    pub fn select_one<'a>(&self, root: &'a Value) -> Result<&'a Value, LayerError> {
        let matches = self.select(root);
        match matches.as_slice() {
            [single] => Ok(single),
            [] => Err(LayerError::JsonPath(format!("{} gives none", self.source))),
            _ => Err(LayerError::JsonPath(format!(
                "{} should give only one result, got {}",
                self.source,
                matches.len()
            ))),
        }
    }
}

fn apply_segment<'a>(segment: &Segment, node: &'a Value, out: &mut Vec<&'a Value>) {
    match segment {
        Segment::Child(name) => match node {
            Value::Object(map) => out.extend(map.get(name)),
            Value::Array(items) => {
                if let Ok(index) = name.parse::<usize>() {
                    out.extend(items.get(index));
                }
            }
            _ => {}
        },
        Segment::Index(index) => {
            if let Value::Array(items) = node {
                let len = items.len() as i64;
                let resolved = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&resolved) {
                    out.push(&items[resolved as usize]);
                }
            }
        }
        Segment::Slice { start, end, step } => {
            if let Value::Array(items) = node {
                let len = items.len() as i64;
                let clamp = |i: i64| if i < 0 { (len + i).max(0) } else { i.min(len) };
                let start = start.map(clamp).unwrap_or(0);
                let end = end.map(clamp).unwrap_or(len);
                let step = step.unwrap_or(1).max(1) as usize;
                if start < end {
                    out.extend(items[start as usize..end as usize].iter().step_by(step));
                }
            }
        }
        Segment::Wildcard => match node {
            Value::Object(map) => out.extend(map.values()),
            Value::Array(items) => out.extend(items.iter()),
            _ => {}
        },
        Segment::Descendant(name) => collect_descendants(name, node, out),
    }
}

fn collect_descendants<'a>(name: &str, node: &'a Value, out: &mut Vec<&'a Value>) {
    match node {
        Value::Object(map) => {
            if let Some(found) = map.get(name) {
                out.push(found);
            }
            for child in map.values() {
                collect_descendants(name, child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                collect_descendants(name, child, out);
            }
        }
        _ => {}
    }
}

fn path(input: &str) -> IResult<&str, Vec<Segment>> {
    preceded(char('$'), many0(segment))(input)
}

fn segment(input: &str) -> IResult<&str, Segment> {
    alt((
        map(preceded(tag(".."), name), |n| Segment::Descendant(n.to_string())),
        preceded(char('.'), bracket),
        value(Segment::Wildcard, tag(".*")),
        map(preceded(char('.'), name), |n| Segment::Child(n.to_string())),
        bracket,
    ))(input)
}

fn bracket(input: &str) -> IResult<&str, Segment> {
    delimited(
        pair(char('['), multispace0),
        selector,
        pair(multispace0, char(']')),
    )(input)
}

fn selector(input: &str) -> IResult<&str, Segment> {
    alt((
        value(Segment::Wildcard, char('*')),
        map(quoted, |s| Segment::Child(s.to_string())),
        slice,
        map(integer, Segment::Index),
    ))(input)
}

fn slice(input: &str) -> IResult<&str, Segment> {
    map(
        tuple((
            opt(integer),
            char(':'),
            opt(integer),
            opt(preceded(char(':'), opt(integer))),
        )),
        |(start, _, end, step)| Segment::Slice {
            start,
            end,
            step: step.flatten(),
        },
    )(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))(input)
}

fn name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_' || c == '-' || c == '$')(input)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse::<i64>)(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn person() -> Value {
        json!({
            "age": 26,
            "phoneNumbers": [
                { "type": "iPhone", "number": "0123-4567-8888" },
                { "type": "home", "number": "0123-4567-8910" }
            ],
            "obj": { "arr": [1, 2, 3], "nested": { "a": "A" } }
        })
    }

    #[test]
    fn slice_then_member_selects_one() {
        let path = JsonPath::parse("$.phoneNumbers[:1].type").unwrap();
        assert_eq!(path.select_one(&person()).unwrap(), &json!("iPhone"));
    }

    #[test]
    fn dot_bracket_quoted_child() {
        let path = JsonPath::parse("$.['age']").unwrap();
        assert_eq!(path.select(&person()), vec![&json!(26)]);
    }

    #[test]
    fn negative_index_and_wildcard() {
        let root = person();
        let last = JsonPath::parse("$.obj.arr[-1]").unwrap();
        assert_eq!(last.select(&root), vec![&json!(3)]);

        let all_types = JsonPath::parse("$.phoneNumbers[*].type").unwrap();
        assert_eq!(all_types.select(&root).len(), 2);
        assert!(all_types.select_one(&root).is_err());
    }

    #[test]
    fn descendant_search() {
        let path = JsonPath::parse("$..a").unwrap();
        assert_eq!(path.select(&person()), vec![&json!("A")]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(JsonPath::parse("$.foo[").is_err());
        assert!(JsonPath::parse("foo").is_err());
    }
}
