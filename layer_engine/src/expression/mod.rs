//! The style expression language: parsing, evaluation, reference scanning.

pub mod ast;
mod eval;
pub mod functions;
pub mod jsonpath;
pub mod parser;
pub mod projection;
pub mod references;
pub mod value;

use std::borrow::Cow;
use std::collections::BTreeMap;

pub use ast::Node;
pub use eval::EvalScope;
pub use functions::{Color, Pattern};
pub use jsonpath::JsonPath;
pub use projection::{get_cacheable_properties, project_properties};
pub use references::{REEARTH_ID, REEARTH_JSONPATH, ReferenceExtractor, scan_references};
pub use value::ExprValue;

use crate::error::LayerError;

/// A parsed expression, ready to evaluate against any scope.
#[derive(Clone, Debug)]
pub struct Program {
    source: String,
    root: Node,
}

impl Program {
    pub fn parse(source: &str) -> Result<Self, LayerError> {
        Ok(Self {
            source: source.to_string(),
            root: parser::parse(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn evaluate(&self, scope: &EvalScope) -> Result<ExprValue, LayerError> {
        self.root.evaluate(scope)
    }
}

/// Replaces `${key}` with `(value)` for every key in `defines`. Placeholders
/// naming anything else are left for the evaluator.
pub fn replace_defines<'s>(
    source: &'s str,
    defines: Option<&BTreeMap<String, String>>,
) -> Cow<'s, str> {
    let Some(defines) = defines.filter(|d| !d.is_empty()) else {
        return Cow::Borrowed(source);
    };
    if !source.contains("${") {
        return Cow::Borrowed(source);
    }

    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let key = &after[..end];
        match defines.get(key) {
            Some(value) => {
                out.push('(');
                out.push_str(value);
                out.push(')');
            }
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defines(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defines_are_parenthesised() {
        let d = defines(&[("key", "value")]);
        assert_eq!(replace_defines("${key}", Some(&d)), "(value)");

        let d = defines(&[("key1", "value1"), ("key2", "value2")]);
        assert_eq!(
            replace_defines("${key1} + ${key2}", Some(&d)),
            "(value1) + (value2)"
        );
    }

    #[test]
    fn unknown_placeholders_survive() {
        let d = defines(&[("size", "2 * 3")]);
        assert_eq!(
            replace_defines("${size} + ${height}", Some(&d)),
            "(2 * 3) + ${height}"
        );
        assert_eq!(replace_defines("${size}", None), "${size}");
    }
}
