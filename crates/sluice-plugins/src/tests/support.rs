//! Recording plugin doubles shared by the unit and behavioural tests.

use std::sync::{Arc, Mutex};

use sluice_config::{
    OptionDescriptor, OptionKind, OptionValue, RawConfig, ResolvedConfig, derive,
};

use crate::catalog::PluginCatalog;
use crate::error::PluginError;
use crate::plugin::{Plugin, PluginContext};

/// Ordered record of plugin lifecycle calls.
#[derive(Clone, Debug, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub(crate) fn record(&self, event: String) {
        self.0.lock().expect("event log mutex poisoned").push(event);
    }

    pub(crate) fn events(&self) -> Vec<String> {
        self.0.lock().expect("event log mutex poisoned").clone()
    }
}

/// How a recording plugin reacts to lifecycle calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum Behaviour {
    #[default]
    Succeed,
    FailInit,
    FailStart,
    WrongName,
}

pub(crate) struct RecordingPlugin {
    name: String,
    behaviour: Behaviour,
    log: EventLog,
}

impl RecordingPlugin {
    pub(crate) fn new(name: &str, behaviour: Behaviour, log: EventLog) -> Self {
        Self {
            name: name.to_owned(),
            behaviour,
            log,
        }
    }

    fn address_option(&self) -> String {
        format!("{}-address", self.name)
    }
}

impl Plugin for RecordingPlugin {
    fn name(&self) -> &str {
        if self.behaviour == Behaviour::WrongName {
            "impostor"
        } else {
            &self.name
        }
    }

    fn version(&self) -> &str {
        "1.2.3"
    }

    fn options(&self) -> Vec<OptionDescriptor> {
        vec![
            OptionDescriptor::new(self.address_option(), OptionKind::String, "listen address")
                .with_default(OptionValue::String(":4040".to_owned())),
        ]
    }

    fn init(&mut self) -> Result<(), PluginError> {
        self.log.record(format!("init:{}", self.name));
        if self.behaviour == Behaviour::FailInit {
            return Err(PluginError::Init {
                name: self.name.clone(),
                message: "refused".to_owned(),
            });
        }
        Ok(())
    }

    fn start(&mut self, context: &PluginContext<'_>) -> Result<(), PluginError> {
        if self.behaviour == Behaviour::FailStart {
            self.log.record(format!("start-failed:{}", self.name));
            return Err(PluginError::Start {
                name: self.name.clone(),
                message: "address in use".to_owned(),
            });
        }
        let address = context
            .options()
            .string(&self.address_option())
            .unwrap_or("unset")
            .to_owned();
        self.log.record(format!("start:{}@{address}", self.name));
        Ok(())
    }

    fn stop(&mut self) {
        self.log.record(format!("stop:{}", self.name));
    }
}

impl Drop for RecordingPlugin {
    fn drop(&mut self) {
        self.log.record(format!("drop:{}", self.name));
    }
}

/// Builds a catalog whose plugins record into `log`.
pub(crate) fn catalog_with(log: &EventLog, plugins: &[(&str, Behaviour)]) -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    for (name, behaviour) in plugins {
        let name = (*name).to_owned();
        let behaviour = *behaviour;
        let log = log.clone();
        let key = name.clone();
        catalog
            .register(key, move || {
                Box::new(RecordingPlugin::new(&name, behaviour, log.clone())) as Box<dyn Plugin>
            })
            .expect("register test plugin");
    }
    catalog
}

/// A valid resolved configuration for starting plugins.
pub(crate) fn resolved_config() -> ResolvedConfig {
    derive(RawConfig {
        plugins: vec!["proxy".to_owned()],
        default_username: Some("app".to_owned()),
        ..RawConfig::default()
    })
    .expect("derive test configuration")
}
