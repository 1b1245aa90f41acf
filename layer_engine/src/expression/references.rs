//! `${...}` placeholder scanning.

use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use lru::LruCache;

use crate::config::EngineConfig;
use crate::model::StyleExpression;

/// Returned alone when an expression reads `${id}`.
pub const REEARTH_ID: &str = "REEARTH_ID";
/// Returned alone when an expression contains a `${$...}` JSONPath.
pub const REEARTH_JSONPATH: &str = "REEARTH_JSONPATH";

pub type References = Arc<Vec<String>>;

/// Memoizing front end to [`scan_references`], keyed by the exact source.
pub struct ReferenceExtractor {
    cache: Mutex<LruCache<String, References>>,
}

impl ReferenceExtractor {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(EngineConfig::capacity(capacity))),
        }
    }

    pub fn get_references(&self, source: &str) -> References {
        if let Some(hit) = self.lock().get(source) {
            return Arc::clone(hit);
        }
        let references = Arc::new(scan_references(source));
        self.lock()
            .put(source.to_string(), Arc::clone(&references));
        references
    }

    /// For conditions: `refs(cond_i) ++ refs(value_i)` in declaration order,
    /// duplicates kept.
    pub fn get_combined_references(&self, expression: &StyleExpression) -> Vec<String> {
        match expression {
            StyleExpression::Source(source) => self.get_references(source).as_ref().clone(),
            StyleExpression::Conditions(conditions) => conditions
                .conditions
                .iter()
                .flat_map(|(condition, value)| {
                    let mut refs = self.get_references(condition).as_ref().clone();
                    refs.extend(self.get_references(value).iter().cloned());
                    refs
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, References>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ReferenceExtractor {
    fn default() -> Self {
        Self::new(EngineConfig::default().reference_cache_size)
    }
}

/// Uncached scan. Placeholders inside `'...'` or `"..."` are skipped.
pub fn scan_references(source: &str) -> Vec<String> {
    let mut references = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = source.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '$' if matches!(chars.peek(), Some((_, '{'))) => {
                let body_start = i + 2;
                let Some(len) = source[body_start..].find('}') else {
                    warn!("Unmatched `${{` in expression: {}", source);
                    break;
                };
                let body = source[body_start..body_start + len].trim();
                if body == "id" {
                    return vec![REEARTH_ID.to_string()];
                }
                if is_jsonpath(body) {
                    return vec![REEARTH_JSONPATH.to_string()];
                }
                references.push(body.to_string());
                let end = body_start + len;
                while chars.next_if(|(j, _)| *j <= end).is_some() {}
            }
            _ => {}
        }
    }
    references
}

fn is_jsonpath(body: &str) -> bool {
    let mut chars = body.chars();
    chars.next() == Some('$')
        && chars
            .next()
            .is_some_and(|c| !matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_in_order_with_duplicates() {
        assert_eq!(
            scan_references("${a} + ${b} + ${a}"),
            vec!["a".to_string(), "b".to_string(), "a".to_string()]
        );
    }

    #[test]
    fn quoted_placeholders_are_not_references() {
        assert!(scan_references("'${x}' + \"${y}\"").is_empty());
        assert_eq!(scan_references("'it\\'s ${x}' + ${z}"), vec!["z".to_string()]);
    }

    #[test]
    fn placeholder_bodies_are_trimmed() {
        assert_eq!(scan_references("${ size } * 2"), vec!["size".to_string()]);
        assert_eq!(scan_references("${ id }"), vec![REEARTH_ID.to_string()]);
        assert_eq!(scan_references("${ $.a }"), vec![REEARTH_JSONPATH.to_string()]);
    }

    #[test]
    fn line_terminators_do_not_start_a_jsonpath() {
        for body in ["$\n", "$\r", "$\u{2028}", "$\u{2029}"] {
            assert!(!is_jsonpath(body), "{:?}", body);
        }
        assert!(is_jsonpath("$."));
    }

    #[test]
    fn unmatched_placeholder_stops_the_scan() {
        assert_eq!(scan_references("${a} + ${b"), vec!["a".to_string()]);
    }

    #[test]
    fn memo_is_per_instance() {
        let extractor = ReferenceExtractor::new(2);
        extractor.get_references("${a}");
        extractor.get_references("${b}");
        extractor.get_references("${c}");
        assert_eq!(extractor.len(), 2);
        assert!(ReferenceExtractor::default().is_empty());
    }
}
