//! The contract every plugin implements.

use std::collections::BTreeMap;

use sluice_config::{OptionDescriptor, OptionValue, ResolvedConfig};

use crate::error::PluginError;

/// An extension loaded by name from the `plugins` list.
///
/// The lifecycle is: [`Plugin::options`] while options are registered,
/// [`Plugin::init`] once file-based values are applied, then
/// [`Plugin::start`] and [`Plugin::stop`] around the main loop.
pub trait Plugin: Send {
    /// Name the plugin is loaded under.
    fn name(&self) -> &str;

    /// Version reported by `--version`.
    fn version(&self) -> &str;

    /// Options the plugin contributes before the strict parse.
    fn options(&self) -> Vec<OptionDescriptor> {
        Vec::new()
    }

    /// Prepares the plugin after its options are registered.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Init`] when the plugin cannot be prepared.
    fn init(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Starts serving with the final configuration.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Start`] when the plugin cannot start.
    fn start(&mut self, context: &PluginContext<'_>) -> Result<(), PluginError>;

    /// Stops serving. Only called after a successful [`Plugin::start`].
    fn stop(&mut self);
}

/// Final values of the options a plugin contributed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginOptions {
    values: BTreeMap<String, OptionValue>,
}

impl PluginOptions {
    /// Records the value of `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: OptionValue) {
        self.values.insert(name.into(), value);
    }

    /// Value of `name`, if it has one.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Value of the string option `name`.
    #[must_use]
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(OptionValue::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Value of the string-list option `name`; empty when unset.
    #[must_use]
    pub fn string_list(&self, name: &str) -> &[String] {
        match self.values.get(name) {
            Some(OptionValue::StringList(values)) => values,
            _ => &[],
        }
    }

    /// Number of recorded values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` when no value is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Everything a plugin sees when it starts.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    config: &'a ResolvedConfig,
    options: &'a PluginOptions,
}

impl<'a> PluginContext<'a> {
    /// Bundles the daemon configuration with the plugin's own options.
    #[must_use]
    pub const fn new(config: &'a ResolvedConfig, options: &'a PluginOptions) -> Self {
        Self { config, options }
    }

    /// The daemon configuration.
    #[must_use]
    pub const fn config(&self) -> &'a ResolvedConfig {
        self.config
    }

    /// The plugin's own option values.
    #[must_use]
    pub const fn options(&self) -> &'a PluginOptions {
        self.options
    }
}
