//! # Validator Cache
//!
//! Compiled JSON Schema validators keyed by route, shared across requests.
//!
//! Compiling a validator is expensive compared to running it, so every
//! route's input schema is compiled once at registration
//! ([`ValidatorCache::compile`]) and looked up per request
//! ([`ValidatorCache::get`]). A lookup miss compiles lazily and caches the
//! result.
//!
//! ## Cache Keys
//!
//! Keys are formatted as `{name}:{schema_hash}`, where `schema_hash` is the
//! first 16 hex characters of the SHA-256 of the serialized schema. One cache
//! shared by several contracts never hands a route another route's validator,
//! even when both use the same operationId.
//!
//! ## Thread Safety
//!
//! The cache uses `Arc<RwLock<HashMap>>`:
//! - Request-time lookups only take the read lock
//! - Registration takes the write lock to insert
//! - Validators are `Arc`-wrapped so a lookup is a reference count bump

use crate::error::ContractError;
use jsonschema::Validator;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Thread-safe cache of compiled validators.
///
/// # Example
///
/// ```rust
/// use brrtbind::validation::ValidatorCache;
/// use serde_json::json;
///
/// let cache = ValidatorCache::new();
/// let schema = json!({"type": "object", "properties": {"page": {"minimum": 1}}});
/// cache.compile("list-users", &schema).unwrap();
/// assert!(cache.get("list-users", &schema).is_some());
/// assert!(cache.get("list-users", &json!({"type": "object"})).is_none());
/// ```
#[derive(Clone, Default)]
pub struct ValidatorCache {
    cache: Arc<RwLock<HashMap<String, Arc<Validator>>>>,
}

impl std::fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("size", &self.size())
            .finish()
    }
}

impl ValidatorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for validating `name` against `schema`.
    ///
    /// # Returns
    ///
    /// `"{name}:{schema_hash}"`
    #[must_use]
    pub fn cache_key(name: &str, schema: &Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(schema).unwrap_or_default());
        let result = hasher.finalize();
        let hash = format!("{:x}", result);
        format!("{name}:{}", hash.chars().take(16).collect::<String>())
    }

    /// Compile `schema` and store it for `name`, replacing any previous entry
    /// for the same schema.
    ///
    /// # Errors
    ///
    /// [`ContractError::Validator`] when the schema does not compile.
    pub fn compile(&self, name: &str, schema: &Value) -> Result<Arc<Validator>, ContractError> {
        let validator = jsonschema::validator_for(schema)
            .map(Arc::new)
            .map_err(|e| ContractError::Validator {
                key: name.to_string(),
                message: e.to_string(),
            })?;
        let key = Self::cache_key(name, schema);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        info!(
            cache_key = %key,
            cache_size = cache.len() + 1,
            "Schema validator compiled and cached"
        );
        cache.insert(key, Arc::clone(&validator));
        Ok(validator)
    }

    /// Cached validator for `name` and `schema`.
    #[must_use]
    pub fn get(&self, name: &str, schema: &Value) -> Option<Arc<Validator>> {
        let key = Self::cache_key(name, schema);
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(&key).map(Arc::clone)
    }

    /// Cached validator, compiling on a miss.
    ///
    /// # Errors
    ///
    /// [`ContractError::Validator`] when a missing entry does not compile.
    pub fn get_or_compile(&self, name: &str, schema: &Value) -> Result<Arc<Validator>, ContractError> {
        if let Some(validator) = self.get(name, schema) {
            return Ok(validator);
        }
        debug!(name = %name, "Schema validator cache miss");
        self.compile(name, schema)
    }

    /// Number of cached validators.
    #[must_use]
    pub fn size(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop every cached validator.
    pub fn clear(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("Schema validator cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compile_and_reuse() {
        let cache = ValidatorCache::new();
        let schema = json!({"type": "integer", "minimum": 1});
        let first = cache.compile("a", &schema).unwrap();
        let second = cache.get_or_compile("a", &schema).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second.is_valid(&json!(3)));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_same_name_different_schema_is_a_separate_entry() {
        let cache = ValidatorCache::new();
        let strict = json!({"type": "integer", "minimum": 100});
        let loose = json!({"type": "integer", "minimum": 1});
        cache.compile("list", &strict).unwrap();
        let validator = cache.get_or_compile("list", &loose).unwrap();
        assert!(validator.is_valid(&json!(5)));
        assert!(!cache.get("list", &strict).unwrap().is_valid(&json!(5)));
        assert_eq!(cache.size(), 2);
    }

    #[test]
    fn test_cache_key_format() {
        let key = ValidatorCache::cache_key("list", &json!({"type": "integer"}));
        let (name, hash) = key.split_once(':').unwrap();
        assert_eq!(name, "list");
        assert_eq!(hash.len(), 16);
        assert_eq!(key, ValidatorCache::cache_key("list", &json!({"type": "integer"})));
        assert_ne!(key, ValidatorCache::cache_key("list", &json!({"type": "string"})));
    }

    #[test]
    fn test_invalid_schema_is_contract_error() {
        let cache = ValidatorCache::new();
        let err = cache.compile("bad", &json!({"type": 12})).unwrap_err();
        assert!(matches!(err, ContractError::Validator { ref key, .. } if key == "bad"));
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_clear() {
        let cache = ValidatorCache::new();
        cache.compile("a", &json!({})).unwrap();
        cache.clear();
        assert!(cache.get("a", &json!({})).is_none());
    }
}
