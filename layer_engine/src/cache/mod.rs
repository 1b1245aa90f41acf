use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;

use crate::config::EngineConfig;
use crate::error::LayerError;
use crate::expression::{ExprValue, Program, ReferenceExtractor};

pub type SharedCacheManager = Arc<CacheManager>;

/// Process-wide memo tables. Each entry is a pure function of its key, so
/// concurrent readers and writers never observe an inconsistent value.
pub struct CacheManager {
    references: ReferenceExtractor,
    program_cache: Mutex<LruCache<String, Arc<Program>>>,
    result_cache: Mutex<LruCache<String, ExprValue>>,
}

impl CacheManager {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            references: ReferenceExtractor::new(config.reference_cache_size),
            program_cache: Mutex::new(LruCache::new(EngineConfig::capacity(
                config.program_cache_size,
            ))),
            result_cache: Mutex::new(LruCache::new(EngineConfig::capacity(
                config.result_cache_size,
            ))),
        }
    }

    pub fn references(&self) -> &ReferenceExtractor {
        &self.references
    }

    /// Parsed program for `source`. Parse failures are not cached.
    pub fn program(&self, source: &str) -> Result<Arc<Program>, LayerError> {
        if let Some(program) = lock(&self.program_cache).get(source) {
            return Ok(Arc::clone(program));
        }
        let program = Arc::new(Program::parse(source)?);
        lock(&self.program_cache).put(source.to_string(), Arc::clone(&program));
        Ok(program)
    }

    pub fn get_result(&self, key: &str) -> Option<ExprValue> {
        lock(&self.result_cache).get(key).cloned()
    }

    pub fn put_result(&self, key: String, value: ExprValue) {
        lock(&self.result_cache).put(key, value);
    }

    pub fn clear(&self) {
        self.references.clear();
        lock(&self.program_cache).clear();
        lock(&self.result_cache).clear();
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programs_are_shared_and_errors_are_not_cached() {
        let caches = CacheManager::default();
        let a = caches.program("1 + 1").unwrap();
        let b = caches.program("1 + 1").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(caches.program("1 +").is_err());
        assert!(caches.program("1 +").is_err());
    }

    #[test]
    fn result_cache_respects_capacity() {
        let config = EngineConfig {
            result_cache_size: 1,
            ..EngineConfig::default()
        };
        let caches = CacheManager::new(&config);
        caches.put_result("a".into(), ExprValue::number(1.0));
        caches.put_result("b".into(), ExprValue::number(2.0));
        assert!(caches.get_result("a").is_none());
        assert_eq!(caches.get_result("b"), Some(ExprValue::number(2.0)));
        caches.clear();
        assert!(caches.get_result("b").is_none());
    }
}
