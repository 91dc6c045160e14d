//! Plugins compiled into the daemon.
//!
//! `proxy` and `shard` front the backend pool in the two mutually exclusive
//! operating modes; `admin` exposes the administrative listener. Each
//! contributes its options and reports lifecycle events; the wire protocol
//! itself lives in the engine.

use sluice_config::{OptionDescriptor, OptionKind, OptionValue, PROXY_PLUGIN, SHARD_PLUGIN};
use sluice_plugins::{Plugin, PluginCatalog, PluginContext, PluginError};
use tracing::info;

const PLUGIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::plugins");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the administrative plugin.
pub const ADMIN_PLUGIN: &str = "admin";

const DEFAULT_PROXY_ADDRESS: &str = ":4040";
const DEFAULT_ADMIN_ADDRESS: &str = ":4041";

/// Registers every built-in plugin.
///
/// # Errors
///
/// Fails only if two built-ins share a name.
pub fn builtin_catalog() -> Result<PluginCatalog, PluginError> {
    let mut catalog = PluginCatalog::new();
    catalog.register(PROXY_PLUGIN, || Box::new(ListenerPlugin::proxy()) as Box<dyn Plugin>)?;
    catalog.register(SHARD_PLUGIN, || Box::new(ListenerPlugin::shard()) as Box<dyn Plugin>)?;
    catalog.register(ADMIN_PLUGIN, || Box::new(AdminPlugin::default()) as Box<dyn Plugin>)?;
    Ok(catalog)
}

/// Client-facing listener in proxy or sharding mode.
#[derive(Debug)]
struct ListenerPlugin {
    name: &'static str,
    listening: Option<String>,
}

impl ListenerPlugin {
    const fn proxy() -> Self {
        Self {
            name: PROXY_PLUGIN,
            listening: None,
        }
    }

    const fn shard() -> Self {
        Self {
            name: SHARD_PLUGIN,
            listening: None,
        }
    }

    fn option(&self, suffix: &str) -> String {
        format!("{}-{suffix}", self.name)
    }
}

impl Plugin for ListenerPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn options(&self) -> Vec<OptionDescriptor> {
        vec![
            OptionDescriptor::new(
                self.option("address"),
                OptionKind::String,
                "listening address:port of the proxy server",
            )
            .with_default(OptionValue::String(DEFAULT_PROXY_ADDRESS.to_owned()))
            .with_value_hint("<host:port>"),
            OptionDescriptor::new(
                self.option("backend-addresses"),
                OptionKind::StringList,
                "address:port of the read-write backends",
            )
            .with_value_hint("<host:port>"),
            OptionDescriptor::new(
                self.option("read-only-backend-addresses"),
                OptionKind::StringList,
                "address:port of the read-only backends",
            )
            .with_value_hint("<host:port>"),
        ]
    }

    fn start(&mut self, context: &PluginContext<'_>) -> Result<(), PluginError> {
        let options = context.options();
        let address = options
            .string(&self.option("address"))
            .filter(|address| !address.is_empty())
            .ok_or_else(|| PluginError::Start {
                name: self.name.to_owned(),
                message: "no listening address configured".to_owned(),
            })?;
        let backends = options.string_list(&self.option("backend-addresses"));
        let replicas = options.string_list(&self.option("read-only-backend-addresses"));
        let config = context.config();
        info!(
            target: PLUGIN_TARGET,
            plugin = self.name,
            address,
            backends = backends.len(),
            read_only_backends = replicas.len(),
            min_idle = config.pool.min_idle,
            max_idle = config.pool.max_idle,
            "listener started"
        );
        self.listening = Some(address.to_owned());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(address) = self.listening.take() {
            info!(target: PLUGIN_TARGET, plugin = self.name, address, "listener stopped");
        }
    }
}

/// Administrative listener.
#[derive(Debug, Default)]
struct AdminPlugin {
    listening: Option<String>,
}

impl Plugin for AdminPlugin {
    fn name(&self) -> &str {
        ADMIN_PLUGIN
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn options(&self) -> Vec<OptionDescriptor> {
        vec![
            OptionDescriptor::new(
                "admin-address",
                OptionKind::String,
                "listening address:port of the admin server",
            )
            .with_default(OptionValue::String(DEFAULT_ADMIN_ADDRESS.to_owned()))
            .with_value_hint("<host:port>"),
            OptionDescriptor::new("admin-username", OptionKind::String, "username for the admin server"),
            OptionDescriptor::new("admin-password", OptionKind::String, "password for the admin server"),
        ]
    }

    fn start(&mut self, context: &PluginContext<'_>) -> Result<(), PluginError> {
        let options = context.options();
        let username = options.string("admin-username");
        let password = options.string("admin-password");
        if username.is_some() != password.is_some() {
            return Err(PluginError::Start {
                name: ADMIN_PLUGIN.to_owned(),
                message: "admin-username and admin-password must be set together".to_owned(),
            });
        }
        let address = options.string("admin-address").unwrap_or(DEFAULT_ADMIN_ADDRESS);
        info!(
            target: PLUGIN_TARGET,
            plugin = ADMIN_PLUGIN,
            address,
            authenticated = username.is_some(),
            "admin listener started"
        );
        self.listening = Some(address.to_owned());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(address) = self.listening.take() {
            info!(target: PLUGIN_TARGET, plugin = ADMIN_PLUGIN, address, "admin listener stopped");
        }
    }
}
