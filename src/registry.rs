//! Hardware model factory registry.
//!
//! Models are allocated by name so the device can be chosen from
//! configuration. Allocating a device is `create`; freeing it is dropping
//! the returned box.
//!
//! # Example
//!
//! ```
//! use rtlbridge::device::HardwareModel;
//! use rtlbridge::registry::ModelRegistry;
//! use rtlbridge::models::ScalarAdder;
//! use std::collections::HashMap;
//!
//! let mut registry = ModelRegistry::new();
//! registry.register("adder", |_attrs| Box::new(ScalarAdder::new()));
//!
//! let model = registry.create("adder", &HashMap::new()).unwrap();
//! assert_eq!(model.name(), "scalar_adder");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::device::HardwareModel;
use crate::error::{Error, Result};

/// Type alias for model factory functions.
pub type ModelFactory =
    Arc<dyn Fn(&HashMap<String, String>) -> Box<dyn HardwareModel> + Send + Sync>;

/// A registry of hardware model factories.
#[derive(Default, Clone)]
pub struct ModelRegistry {
    factories: HashMap<String, ModelFactory>,
}

impl ModelRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&HashMap<String, String>) -> Box<dyn HardwareModel> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Allocates a model instance by name.
    pub fn create(
        &self,
        name: &str,
        attrs: &HashMap<String, String>,
    ) -> Result<Box<dyn HardwareModel>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))?;
        tracing::debug!(model = name, "allocating hardware model");
        Ok(factory(attrs))
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Returns the number of registered models.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns true if no models are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Returns an iterator over registered names.
    pub fn type_names(&self) -> impl Iterator<Item = &String> {
        self.factories.keys()
    }

    /// Unregisters a model.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.factories.remove(name).is_some()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("registered_models", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Creates a registry holding the built-in models.
///
/// Includes:
/// - `scalar_adder` - [`ScalarAdder`](crate::models::ScalarAdder)
pub fn create_default_registry() -> ModelRegistry {
    use crate::models::ScalarAdder;

    let mut registry = ModelRegistry::new();
    registry.register("scalar_adder", |_| Box::new(ScalarAdder::new()));
    registry
}
