//! Store registry for resolving adapters by provider name.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use cloudstore_common::{Error, Result};

use crate::dropbox::{DropboxConfig, DropboxStore};
use crate::gdrive::{GDriveConfig, GDriveStore};
use crate::store::Store;

/// Factory function type for creating stores.
pub type StoreFactory = Box<dyn Fn(Value) -> Result<Arc<dyn Store>> + Send + Sync>;

/// Registry for store factories.
///
/// Allows registration and resolution of store adapters by provider name
/// and JSON configuration.
pub struct StoreRegistry {
    factories: HashMap<String, StoreFactory>,
}

impl StoreRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a store factory.
    ///
    /// # Errors
    /// - Returns error if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: StoreFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::InvalidInput(format!(
                "Store '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a store by provider name and configuration.
    ///
    /// # Errors
    /// - Provider not registered
    /// - Configuration invalid for the provider
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn Store>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            Error::InvalidInput(format!("Store '{}' is not registered", name))
        })?;
        factory(config)
    }

    /// Get list of registered provider names.
    pub fn providers(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Check if a provider is registered.
    pub fn has_provider(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.factories.insert(
            "gdrive".to_string(),
            Box::new(|config| {
                let config: GDriveConfig = serde_json::from_value(config)
                    .map_err(|e| Error::InvalidInput(format!("Invalid gdrive config: {}", e)))?;
                Ok(Arc::new(GDriveStore::new(config)?) as Arc<dyn Store>)
            }),
        );
        registry.factories.insert(
            "dropbox".to_string(),
            Box::new(|config| {
                let config: DropboxConfig = serde_json::from_value(config)
                    .map_err(|e| Error::InvalidInput(format!("Invalid dropbox config: {}", e)))?;
                Ok(Arc::new(DropboxStore::new(config)?) as Arc<dyn Store>)
            }),
        );
        registry
    }
}
