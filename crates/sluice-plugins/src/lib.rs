//! Plugin loading for the `sluiced` daemon.
//!
//! Plugins are compiled into the daemon and registered in a
//! [`PluginCatalog`] under the names accepted by the `plugins` option. The
//! [`PluginLoader`] instantiates the configured names in order, producing a
//! [`PluginSet`] that contributes plugin options before the strict
//! command-line pass and later starts and stops each plugin around the main
//! loop.
//!
//! # Lifecycle
//!
//! 1. [`PluginLoader::load`] instantiates every listed plugin.
//! 2. [`PluginSet::option_descriptors`] feeds the option registry.
//! 3. [`PluginSet::init_all`] runs once file-based values are applied.
//! 4. [`PluginSet::capture_options`] copies the final option values.
//! 5. [`PluginSet::start_all`] and [`PluginSet::stop_all`] bracket serving.
//! 6. [`PluginSet::unload_all`] (or dropping the set) destroys the plugins
//!    in reverse load order.

pub mod catalog;
pub mod error;
pub mod loader;
pub mod plugin;

#[cfg(test)]
mod tests;

pub use self::catalog::{PluginCatalog, PluginFactory};
pub use self::error::PluginError;
pub use self::loader::{PluginHandle, PluginLoader, PluginSet};
pub use self::plugin::{Plugin, PluginContext, PluginOptions};
