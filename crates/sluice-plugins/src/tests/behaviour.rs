//! Behaviour-driven tests for plugin loading.

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

use crate::catalog::PluginCatalog;
use crate::error::PluginError;
use crate::loader::{PluginLoader, PluginSet};

use super::support::{Behaviour, EventLog, catalog_with, resolved_config};

#[derive(Default)]
struct TestWorld {
    log: EventLog,
    catalog: PluginCatalog,
    loaded: Option<Result<PluginSet, PluginError>>,
    started: Option<Result<(), PluginError>>,
}

#[fixture]
fn world() -> TestWorld {
    TestWorld::default()
}

fn list(text: &str) -> Vec<String> {
    text.trim_matches('"')
        .split(',')
        .filter(|item| !item.is_empty())
        .map(str::to_owned)
        .collect()
}

fn loaded_set(world: &mut TestWorld) -> &mut PluginSet {
    world
        .loaded
        .as_mut()
        .expect("no load attempted")
        .as_mut()
        .expect("expected plugins to load")
}

fn events_with_prefix(world: &TestWorld, prefix: &str) -> Vec<String> {
    world
        .log
        .events()
        .into_iter()
        .filter_map(|event| event.strip_prefix(prefix).map(str::to_owned))
        .collect()
}

#[given("a catalog offering \"proxy\", \"admin\" and \"stats\"")]
fn given_catalog(world: &mut TestWorld) {
    world.catalog = catalog_with(
        &world.log,
        &[
            ("proxy", Behaviour::Succeed),
            ("admin", Behaviour::Succeed),
            ("stats", Behaviour::Succeed),
        ],
    );
}

#[given("a catalog offering \"proxy\", \"admin\" and a failing \"stats\"")]
fn given_failing_catalog(world: &mut TestWorld) {
    world.catalog = catalog_with(
        &world.log,
        &[
            ("proxy", Behaviour::Succeed),
            ("admin", Behaviour::Succeed),
            ("stats", Behaviour::FailStart),
        ],
    );
}

#[when("the plugins {names} are loaded")]
fn when_loaded(world: &mut TestWorld, names: String) {
    let loader = PluginLoader::new(&world.catalog, None);
    world.loaded = Some(loader.load(&list(&names)));
}

#[when("the plugins are started")]
fn when_started(world: &mut TestWorld) {
    let config = resolved_config();
    let result = loaded_set(world).start_all(&config);
    world.started = Some(result);
}

#[when("the plugins are unloaded")]
fn when_unloaded(world: &mut TestWorld) {
    loaded_set(world).unload_all();
}

#[then("loading succeeds")]
fn then_loading_succeeds(world: &mut TestWorld) {
    let outcome = world.loaded.as_ref().expect("no load attempted");
    assert!(outcome.is_ok(), "expected success, got {outcome:?}");
}

#[then("the loaded plugins are {names}")]
fn then_loaded(world: &mut TestWorld, names: String) {
    let loaded: Vec<_> = loaded_set(world)
        .iter()
        .map(|handle| handle.name().to_owned())
        .collect();
    assert_eq!(loaded, list(&names));
}

#[then("loading fails because {name} is not found")]
fn then_not_found(world: &mut TestWorld, name: String) {
    let error = world
        .loaded
        .as_ref()
        .expect("no load attempted")
        .as_ref()
        .expect_err("expected loading to fail");
    let expected = name.trim_matches('"');
    assert!(
        matches!(error, PluginError::NotFound { name, .. } if name == expected),
        "expected NotFound for {expected}, got: {error}"
    );
}

#[then("starting fails for {name}")]
fn then_start_fails(world: &mut TestWorld, name: String) {
    let error = world
        .started
        .as_ref()
        .expect("no start attempted")
        .as_ref()
        .expect_err("expected start to fail");
    let expected = name.trim_matches('"');
    assert!(
        matches!(error, PluginError::Start { name, .. } if name == expected),
        "expected Start failure for {expected}, got: {error}"
    );
}

#[then("the plugins stopped are {names}")]
fn then_stopped(world: &mut TestWorld, names: String) {
    assert_eq!(events_with_prefix(world, "stop:"), list(&names));
}

#[then("the plugins destroyed are {names}")]
fn then_destroyed(world: &mut TestWorld, names: String) {
    assert_eq!(events_with_prefix(world, "drop:"), list(&names));
}

#[scenario(path = "tests/features/plugin_loading.feature")]
fn plugin_loading_behaviour(world: TestWorld) {
    let _ = world;
}
