use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::alloc::Allocator;

/// Configuration for a root store and every transaction derived from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Allocation budget in bytes. `None` means unlimited.
    pub max_alloc_bytes: Option<u64>,
    /// Check each loaded object against its recorded hash.
    pub verify_object_hashes: bool,
    /// Keep decoded objects in the in-memory object cache.
    pub cache_objects: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_alloc_bytes: None,
            verify_object_hashes: true,
            cache_objects: true,
        }
    }
}

impl StoreConfig {
    /// A configuration with the given allocation budget.
    pub fn with_max_alloc(max_bytes: u64) -> Self {
        Self {
            max_alloc_bytes: Some(max_bytes),
            ..Default::default()
        }
    }

    /// Build the allocator this configuration describes.
    pub fn allocator(&self) -> Arc<Allocator> {
        Arc::new(match self.max_alloc_bytes {
            Some(max) => Allocator::new(max),
            None => Allocator::unlimited(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unlimited_and_verifying() {
        let config = StoreConfig::default();
        assert!(config.max_alloc_bytes.is_none());
        assert!(config.verify_object_hashes);
        assert!(config.cache_objects);
        assert_eq!(config.allocator().max(), u64::MAX);
    }

    #[test]
    fn budgeted_allocator() {
        let config = StoreConfig::with_max_alloc(4096);
        assert_eq!(config.allocator().max(), 4096);
    }

    #[test]
    fn deserializes_from_json() {
        let json = r#"{"max_alloc_bytes":1024,"verify_object_hashes":false,"cache_objects":true}"#;
        let config: StoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_alloc_bytes, Some(1024));
        assert!(!config.verify_object_hashes);
    }
}
