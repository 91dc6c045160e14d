//! Loading plugins by name and driving them as an ordered set.
//!
//! [`PluginLoader`] turns the configured `plugins` list into a [`PluginSet`]
//! of [`PluginHandle`]s in list order. The set starts plugins in load order
//! and always stops and destroys them in reverse load order, including when
//! it is dropped.

use camino::{Utf8Path, Utf8PathBuf};
use sluice_config::{OptionDescriptor, OptionGroup, OptionRegistry, ResolvedConfig};
use tracing::{debug, info, warn};

use crate::catalog::PluginCatalog;
use crate::error::PluginError;
use crate::plugin::{Plugin, PluginContext, PluginOptions};

const LOADER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::loader");

/// Resolves plugin names against a [`PluginCatalog`].
#[derive(Debug, Clone, Copy)]
pub struct PluginLoader<'a> {
    catalog: &'a PluginCatalog,
    plugin_dir: Option<&'a Utf8Path>,
}

impl<'a> PluginLoader<'a> {
    /// Creates a loader for `catalog`. `plugin_dir` is reported in errors.
    #[must_use]
    pub const fn new(catalog: &'a PluginCatalog, plugin_dir: Option<&'a Utf8Path>) -> Self {
        Self {
            catalog,
            plugin_dir,
        }
    }

    /// Loads `names` in order.
    ///
    /// Plugins loaded before a failure are destroyed in reverse order before
    /// the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::NotFound`] for unknown names,
    /// [`PluginError::Duplicate`] for repeated names, and
    /// [`PluginError::NameMismatch`] when a plugin misreports its name.
    pub fn load(&self, names: &[String]) -> Result<PluginSet, PluginError> {
        let mut set = PluginSet::default();
        for name in names {
            if set.contains(name) {
                return Err(PluginError::Duplicate { name: name.clone() });
            }
            let plugin = self
                .catalog
                .instantiate(name)
                .ok_or_else(|| PluginError::NotFound {
                    name: name.clone(),
                    plugin_dir: self.plugin_dir.map(Utf8Path::to_path_buf),
                })?;
            if plugin.name() != name {
                return Err(PluginError::NameMismatch {
                    name: name.clone(),
                    reported: plugin.name().to_owned(),
                });
            }
            debug!(
                target: LOADER_TARGET,
                plugin = %name,
                version = plugin.version(),
                position = set.len(),
                "plugin loaded"
            );
            set.push(PluginHandle::new(
                name.clone(),
                set.len(),
                plugin,
                self.plugin_dir.map(|dir| dir.join(name)),
            ));
        }
        Ok(set)
    }
}

/// A loaded plugin and its place in the load order.
pub struct PluginHandle {
    name: String,
    position: usize,
    location: Option<Utf8PathBuf>,
    plugin: Box<dyn Plugin>,
    options: PluginOptions,
    running: bool,
}

impl PluginHandle {
    fn new(
        name: String,
        position: usize,
        plugin: Box<dyn Plugin>,
        location: Option<Utf8PathBuf>,
    ) -> Self {
        Self {
            name,
            position,
            location,
            plugin,
            options: PluginOptions::default(),
            running: false,
        }
    }

    /// Name the plugin was loaded under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Zero-based load position.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Where the plugin was loaded from, relative to the plugin directory.
    #[must_use]
    pub fn location(&self) -> Option<&Utf8Path> {
        self.location.as_deref()
    }

    /// Version reported by the plugin.
    #[must_use]
    pub fn version(&self) -> &str {
        self.plugin.version()
    }

    /// Option values captured after the strict parse.
    #[must_use]
    pub const fn options(&self) -> &PluginOptions {
        &self.options
    }

    /// Returns `true` between a successful start and the matching stop.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    fn stop(&mut self) {
        if self.running {
            self.plugin.stop();
            self.running = false;
            info!(target: LOADER_TARGET, plugin = %self.name, "plugin stopped");
        }
    }
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

/// Plugins in load order.
#[derive(Debug, Default)]
pub struct PluginSet {
    handles: Vec<PluginHandle>,
}

impl PluginSet {
    fn push(&mut self, handle: PluginHandle) {
        self.handles.push(handle);
    }

    /// Returns `true` when a plugin named `name` is loaded.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handles.iter().any(|handle| handle.name == name)
    }

    /// Number of loaded plugins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` when no plugin is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handles in load order.
    pub fn iter(&self) -> impl Iterator<Item = &PluginHandle> {
        self.handles.iter()
    }

    /// Options contributed by every plugin, grouped under the plugin name.
    #[must_use]
    pub fn option_descriptors(&self) -> Vec<OptionDescriptor> {
        self.handles
            .iter()
            .flat_map(|handle| {
                let group = OptionGroup::Plugin(handle.name.clone());
                handle
                    .plugin
                    .options()
                    .into_iter()
                    .map(move |descriptor| descriptor.in_group(group.clone()))
            })
            .collect()
    }

    /// Initialises every plugin in load order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates the first [`Plugin::init`] failure.
    pub fn init_all(&mut self) -> Result<(), PluginError> {
        self.handles
            .iter_mut()
            .try_for_each(|handle| handle.plugin.init())
    }

    /// Copies each plugin's option values out of `registry`.
    pub fn capture_options(&mut self, registry: &OptionRegistry) {
        for handle in &mut self.handles {
            let mut options = PluginOptions::default();
            for descriptor in handle.plugin.options() {
                if let Some(value) = registry.value(descriptor.name()) {
                    options.insert(descriptor.name(), value.clone());
                }
            }
            handle.options = options;
        }
    }

    /// Starts every plugin in load order.
    ///
    /// When a plugin fails to start, the plugins already started are stopped
    /// in reverse order before the error is returned.
    ///
    /// # Errors
    ///
    /// Propagates the first [`Plugin::start`] failure.
    pub fn start_all(&mut self, config: &ResolvedConfig) -> Result<(), PluginError> {
        for index in 0..self.handles.len() {
            let Some(handle) = self.handles.get_mut(index) else {
                break;
            };
            let context = PluginContext::new(config, &handle.options);
            if let Err(error) = handle.plugin.start(&context) {
                warn!(
                    target: LOADER_TARGET,
                    plugin = %handle.name,
                    error = %error,
                    "plugin failed to start"
                );
                self.stop_all();
                return Err(error);
            }
            handle.running = true;
            info!(target: LOADER_TARGET, plugin = %handle.name, "plugin started");
        }
        Ok(())
    }

    /// Stops every running plugin in reverse load order.
    pub fn stop_all(&mut self) {
        for handle in self.handles.iter_mut().rev() {
            handle.stop();
        }
    }

    /// Stops and destroys every plugin in reverse load order, returning
    /// their names in destruction order.
    pub fn unload_all(&mut self) -> Vec<String> {
        let mut unloaded = Vec::with_capacity(self.handles.len());
        while let Some(mut handle) = self.handles.pop() {
            handle.stop();
            debug!(target: LOADER_TARGET, plugin = %handle.name, "plugin unloaded");
            unloaded.push(handle.name.clone());
            drop(handle);
        }
        unloaded
    }
}

impl Drop for PluginSet {
    fn drop(&mut self) {
        self.unload_all();
    }
}
