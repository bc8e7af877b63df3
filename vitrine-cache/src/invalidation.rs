//! Manual cache invalidation.
//!
//! There is no dependency tracking between reads and writes. Whoever
//! performs a mutation names the keys or key pattern it makes stale.

use regex::Regex;
use std::sync::Arc;

use vitrine_core::{CacheError, RequestParams};

use crate::key::CacheKey;
use crate::store::CacheStore;

#[derive(Debug, Clone)]
pub struct InvalidationController {
    store: Arc<CacheStore>,
}

impl InvalidationController {
    pub fn new(store: Arc<CacheStore>) -> Self {
        Self { store }
    }

    /// Delete one key. Returns whether it was cached.
    pub fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let removed = self.store.delete(key)?;
        tracing::debug!(key = %key, removed, "cache key invalidated");
        Ok(removed)
    }

    /// Delete the entry a read of `address` with `params` would use.
    pub fn invalidate_request(
        &self,
        address: &str,
        params: Option<&RequestParams>,
    ) -> Result<bool, CacheError> {
        self.invalidate(&CacheKey::derive(address, params))
    }

    /// Delete every key `pattern` matches, or everything without a pattern.
    pub fn clear(&self, pattern: Option<&Regex>) -> Result<usize, CacheError> {
        let removed = self.store.clear(pattern)?;
        tracing::info!(
            pattern = pattern.map(Regex::as_str).unwrap_or("*"),
            removed,
            "cache cleared"
        );
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn seeded() -> (InvalidationController, Arc<CacheStore>) {
        let store = Arc::new(CacheStore::new());
        let age = Duration::from_secs(60);
        for key in ["/products/1", "/products/2", "/categories/1"] {
            store.set(&CacheKey::from_raw(key), &json!(key), age).unwrap();
        }
        (InvalidationController::new(store.clone()), store)
    }

    #[test]
    fn test_invalidate_single_key() {
        let (controller, store) = seeded();
        assert!(controller.invalidate(&"/products/1".into()).unwrap());
        assert!(!controller.invalidate(&"/products/1".into()).unwrap());
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_clear_pattern_leaves_other_keys() {
        let (controller, store) = seeded();
        let removed = controller
            .clear(Some(&Regex::new(r"/products").unwrap()))
            .unwrap();
        assert_eq!(removed, 2);
        assert!(store.contains(&"/categories/1".into()).unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_clear_everything() {
        let (controller, store) = seeded();
        assert_eq!(controller.clear(None).unwrap(), 3);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_invalidate_request_uses_derived_key() {
        let store = Arc::new(CacheStore::new());
        let params: RequestParams = [("id".to_string(), json!(7))].into_iter().collect();
        let key = CacheKey::derive("/products", Some(&params));
        store.set(&key, &1, Duration::from_secs(60)).unwrap();

        let controller = InvalidationController::new(store.clone());
        assert!(controller.invalidate_request("/products", Some(&params)).unwrap());
        assert!(store.is_empty().unwrap());
    }
}
