//! Unit tests for the plugin catalog.

use rstest::{fixture, rstest};

use super::*;
use crate::tests::support::{Behaviour, EventLog, RecordingPlugin, catalog_with};

#[fixture]
fn log() -> EventLog {
    EventLog::default()
}

#[test]
fn new_catalog_is_empty() {
    let catalog = PluginCatalog::new();
    assert!(catalog.is_empty());
    assert_eq!(catalog.len(), 0);
}

#[rstest]
fn names_are_sorted(log: EventLog) {
    let catalog = catalog_with(
        &log,
        &[("shard", Behaviour::Succeed), ("admin", Behaviour::Succeed)],
    );
    assert_eq!(catalog.names().collect::<Vec<_>>(), ["admin", "shard"]);
    assert!(catalog.contains("admin"));
    assert!(!catalog.contains("proxy"));
}

#[rstest]
fn duplicate_registration_is_rejected(log: EventLog) {
    let mut catalog = catalog_with(&log, &[("proxy", Behaviour::Succeed)]);
    let error = catalog
        .register("proxy", || {
            Box::new(RecordingPlugin::new("proxy", Behaviour::Succeed, EventLog::default()))
                as Box<dyn Plugin>
        })
        .expect_err("duplicate");
    assert!(matches!(error, PluginError::AlreadyRegistered { name } if name == "proxy"));
    assert_eq!(catalog.len(), 1);
}

#[rstest]
fn instantiate_creates_fresh_instances(log: EventLog) {
    let catalog = catalog_with(&log, &[("proxy", Behaviour::Succeed)]);
    let first = catalog.instantiate("proxy").expect("proxy plugin");
    let second = catalog.instantiate("proxy").expect("proxy plugin");
    drop(first);
    drop(second);
    assert_eq!(log.events(), ["drop:proxy", "drop:proxy"]);
    assert!(catalog.instantiate("missing").is_none());
}

#[rstest]
fn debug_lists_plugin_names(log: EventLog) {
    let catalog = catalog_with(&log, &[("admin", Behaviour::Succeed)]);
    assert_eq!(format!("{catalog:?}"), "PluginCatalog { plugins: [\"admin\"] }");
}
