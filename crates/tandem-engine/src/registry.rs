//! Store registry: store instances keyed by unique name.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use tandem_core::error::AppError;
use tandem_core::result::AppResult;
use tandem_core::traits::store::StoreCapability;

/// Registry of every store available to the engine.
///
/// Built once at setup and read-only afterwards. Registration order carries
/// no meaning; the execution order decides which stores run and when.
#[derive(Debug, Default, Clone)]
pub struct StoreRegistry {
    /// Store name → store instance.
    stores: HashMap<String, Arc<dyn StoreCapability>>,
}

impl StoreRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a store under `name`. Names must be unique.
    pub fn register(&mut self, name: &str, store: Arc<dyn StoreCapability>) -> AppResult<()> {
        if name.trim().is_empty() {
            return Err(AppError::configuration("Store name must not be empty"));
        }
        if self.stores.contains_key(name) {
            return Err(AppError::configuration(format!(
                "Store '{name}' is already registered"
            )));
        }

        info!(store = %name, store_type = %store.store_type(), "Registering store");
        self.stores.insert(name.to_string(), store);
        Ok(())
    }

    /// Builder form of [`StoreRegistry::register`].
    pub fn with_store(mut self, name: &str, store: Arc<dyn StoreCapability>) -> AppResult<Self> {
        self.register(name, store)?;
        Ok(self)
    }

    /// Gets a store by name.
    pub fn get(&self, name: &str) -> AppResult<&Arc<dyn StoreCapability>> {
        self.stores
            .get(name)
            .ok_or_else(|| AppError::unknown_store(format!("Store '{name}' is not registered")))
    }

    /// Checks whether a store is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    /// Registered store names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Returns store count.
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Returns `true` if no store is registered.
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}
