//! Catalog of the plugins the daemon can load.
//!
//! The [`PluginCatalog`] maps plugin names to factories producing fresh
//! plugin instances. Duplicate registrations for the same name are
//! rejected.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::PluginError;
use crate::plugin::Plugin;

/// Produces a fresh plugin instance.
pub type PluginFactory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Registry of loadable plugins keyed by name.
#[derive(Default)]
pub struct PluginCatalog {
    factories: BTreeMap<String, PluginFactory>,
}

impl PluginCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::AlreadyRegistered`] when `name` is taken.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<(), PluginError>
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(PluginError::AlreadyRegistered { name });
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    /// Returns `true` when `name` can be loaded.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Creates a new instance of `name`.
    #[must_use]
    pub fn instantiate(&self, name: &str) -> Option<Box<dyn Plugin>> {
        self.factories.get(name).map(|factory| factory())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` when no plugins are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("plugins", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests;
