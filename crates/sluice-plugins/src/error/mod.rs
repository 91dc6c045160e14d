//! Domain errors raised while loading and driving plugins.
//!
//! All errors use `thiserror`-derived enums with structured context so the
//! orchestrator can report which plugin failed and at which step.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors arising from plugin operations.
#[derive(Debug, Error)]
pub enum PluginError {
    /// No plugin of that name is known.
    #[error("plugin '{name}' not found{}", location_suffix(.plugin_dir.as_ref()))]
    NotFound {
        /// Requested plugin name.
        name: String,
        /// Plugin directory that was searched.
        plugin_dir: Option<Utf8PathBuf>,
    },

    /// The catalog already holds a plugin of that name.
    #[error("plugin '{name}' is already registered")]
    AlreadyRegistered {
        /// Plugin name.
        name: String,
    },

    /// The `plugins` list names the same plugin twice.
    #[error("plugin '{name}' is listed more than once")]
    Duplicate {
        /// Plugin name.
        name: String,
    },

    /// The catalog produced a plugin reporting a different name.
    #[error("plugin '{name}' identifies itself as '{reported}'")]
    NameMismatch {
        /// Name the plugin was loaded under.
        name: String,
        /// Name returned by the plugin.
        reported: String,
    },

    /// The plugin rejected its configuration.
    #[error("plugin '{name}' failed to initialise: {message}")]
    Init {
        /// Plugin name.
        name: String,
        /// Human-readable failure description.
        message: String,
    },

    /// The plugin could not start serving.
    #[error("plugin '{name}' failed to start: {message}")]
    Start {
        /// Plugin name.
        name: String,
        /// Human-readable failure description.
        message: String,
    },
}

fn location_suffix(plugin_dir: Option<&Utf8PathBuf>) -> String {
    plugin_dir.map_or_else(String::new, |dir| format!(" in {dir}"))
}
