//! Provider registry resolving a host provider to a store adapter.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::RemoteStore;
use gitkv_common::{Error, Result};

/// Factory function type for creating stores.
pub type StoreFactory = Box<dyn Fn(Value) -> Result<Arc<dyn RemoteStore>> + Send + Sync>;

/// Registry for store factories, keyed by provider domain.
///
/// A host string like `git@github.com:owner/repo.git` names its provider
/// (`github.com`); the registry maps that name to an adapter constructor.
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
    /// # Preconditions
    /// - `name` must be unique within the registry
    ///
    /// # Errors
    /// - `AlreadyExists` if name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: StoreFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::AlreadyExists(format!(
                "Provider '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Resolve a store by provider name and configuration.
    ///
    /// # Postconditions
    /// - Returns a store bound to the namespace in `config`
    ///
    /// # Errors
    /// - `UnsupportedProvider` if no factory is registered for `name`
    /// - Configuration invalid
    pub fn resolve(&self, name: &str, config: Value) -> Result<Arc<dyn RemoteStore>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnsupportedProvider(name.to_string()))?;
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
        Self::new()
    }
}

/// Create a registry with default providers.
pub fn create_default_registry() -> StoreRegistry {
    let mut registry = StoreRegistry::new();

    registry
        .register("github.com", Box::new(crate::github::create_github_store))
        .expect("Failed to register github.com provider");

    // In-process backend (for testing)
    registry
        .register("memory", Box::new(crate::memory::create_memory_store))
        .expect("Failed to register memory provider");

    registry
}
