use std::collections::BTreeMap;
use std::sync::Arc;

use log::error;
use serde_json::{Map, Value};

use crate::cache::{CacheManager, SharedCacheManager};
use crate::config::EngineConfig;
use crate::error::LayerError;
use crate::expression::{
    EvalScope, ExprValue, REEARTH_ID, project_properties, replace_defines,
};
use crate::model::{
    AppearanceType, AppearanceValue, Appearances, ComputedFeature, ConditionsExpression, Feature,
    LayerAppearance, SimpleLayer, StyleExpression,
};

/// Evaluates appearance fields against a feature or layer scope, memoizing
/// parsed programs and results in a shared [`CacheManager`].
pub struct AppearanceEvaluator {
    caches: SharedCacheManager,
    pub(super) parallel_threshold: usize,
}

impl AppearanceEvaluator {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_caches(Arc::new(CacheManager::new(config)), config)
    }

    pub fn with_caches(caches: SharedCacheManager, config: &EngineConfig) -> Self {
        Self {
            caches,
            parallel_threshold: config.parallel_threshold,
        }
    }

    pub fn caches(&self) -> &SharedCacheManager {
        &self.caches
    }

    pub fn eval_expression(
        &self,
        source: &str,
        scope: &EvalScope,
        defines: Option<&BTreeMap<String, String>>,
    ) -> Result<ExprValue, LayerError> {
        let source = replace_defines(source, defines);
        self.caches.program(&source)?.evaluate(scope)
    }

    /// The value of the first condition that is truthy; `undefined` if none is.
    pub fn eval_conditions(
        &self,
        conditions: &ConditionsExpression,
        scope: &EvalScope,
        defines: Option<&BTreeMap<String, String>>,
    ) -> Result<ExprValue, LayerError> {
        for (condition, value) in &conditions.conditions {
            if self.eval_expression(condition, scope, defines)?.is_truthy() {
                return self.eval_expression(value, scope, defines);
            }
        }
        Ok(ExprValue::Undefined)
    }

    pub fn eval_style_expression(
        &self,
        expression: &StyleExpression,
        scope: &EvalScope,
        defines: Option<&BTreeMap<String, String>>,
    ) -> Result<ExprValue, LayerError> {
        match expression {
            StyleExpression::Source(source) => self.eval_expression(source, scope, defines),
            StyleExpression::Conditions(conditions) => {
                self.eval_conditions(conditions, scope, defines)
            }
        }
    }

    /// One appearance field. Literals pass through; failures are logged and
    /// leave the field `None`, as does an `undefined` result.
    pub fn eval_field(
        &self,
        value: &AppearanceValue,
        scope: &EvalScope,
        defines: Option<&BTreeMap<String, String>>,
    ) -> Option<Value> {
        let Some(expression) = value.expression() else {
            return value.as_literal().cloned();
        };

        let key = self.result_key(expression, scope, defines);
        if let Some(hit) = key.as_deref().and_then(|k| self.caches.get_result(k)) {
            return hit.into_json();
        }

        match self.eval_style_expression(expression, scope, defines) {
            Ok(result) => {
                if let Some(key) = key {
                    self.caches.put_result(key, result.clone());
                }
                result.into_json()
            }
            Err(e) => {
                error!("Failed to evaluate {:?}: {}", expression, e);
                None
            }
        }
    }

    fn result_key(
        &self,
        expression: &StyleExpression,
        scope: &EvalScope,
        defines: Option<&BTreeMap<String, String>>,
    ) -> Option<String> {
        let references = self.caches.references().get_combined_references(expression);
        let reads_id = references.iter().any(|r| r == REEARTH_ID);
        // A sentinel hides every other reference in the source, and `feature.x`
        // reads properties without a placeholder.
        let projected = if reads_id || reads_feature_keyword(expression) {
            scope.properties.clone()
        } else {
            project_properties(&references, scope.id.unwrap_or_default(), scope.properties)
        };
        let id = if reads_id { scope.id } else { None };
        serde_json::to_string(&(expression, projected, defines, id)).ok()
    }

    /// Every field of every given category. Without a feature the scope is
    /// the layer's own id and properties.
    pub fn eval_layer_appearances<'l>(
        &self,
        appearances: impl IntoIterator<Item = (AppearanceType, &'l LayerAppearance)>,
        layer: &SimpleLayer,
        feature: Option<&Feature>,
    ) -> Appearances {
        let empty = Map::new();
        let scope = match feature {
            Some(feature) => EvalScope::new(Some(&feature.id), &feature.properties),
            None => EvalScope::new(Some(&layer.id), layer.properties.as_ref().unwrap_or(&empty)),
        };
        let defines = layer.defines.as_ref();

        appearances
            .into_iter()
            .map(|(kind, fields)| {
                let evaluated = fields
                    .iter()
                    .filter_map(|(name, value)| {
                        self.eval_field(value, &scope, defines)
                            .map(|v| (name.clone(), v))
                    })
                    .collect::<Map<String, Value>>();
                (kind, evaluated)
            })
            .collect()
    }

    /// Applies `jsonProperties` and evaluates every category for one feature.
    pub fn eval_simple_layer_feature(&self, layer: &SimpleLayer, feature: &Feature) -> ComputedFeature {
        let json_keys = layer
            .data
            .as_ref()
            .and_then(|data| data.json_properties.as_deref())
            .unwrap_or_default();
        let feature = if json_keys.is_empty() {
            feature.clone()
        } else {
            feature.parse_json_properties(json_keys)
        };
        let appearances = self.eval_layer_appearances(layer.appearances(), layer, Some(&feature));
        ComputedFeature::new(feature, appearances)
    }
}

impl Default for AppearanceEvaluator {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn reads_feature_keyword(expression: &StyleExpression) -> bool {
    let mentions = |source: &str| source.contains("feature");
    match expression {
        StyleExpression::Source(source) => mentions(source),
        StyleExpression::Conditions(conditions) => conditions
            .conditions
            .iter()
            .any(|(condition, value)| mentions(condition) || mentions(value)),
    }
}
