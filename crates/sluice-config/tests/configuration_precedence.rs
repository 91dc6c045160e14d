use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;

use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;
use url::Url;

use sluice_config::{ConfigurationResolver, RawConfig, RemoteConfigError, RemoteSource};

/// Serves one in-memory document regardless of the URL.
struct StaticRemote {
    body: String,
}

impl RemoteSource for StaticRemote {
    fn fetch(&self, _url: &Url) -> Result<String, RemoteConfigError> {
        Ok(self.body.clone())
    }
}

struct Harness {
    temp_dir: TempDir,
    cli_args: RefCell<Vec<OsString>>,
    key_file: RefCell<Vec<String>>,
    remote: RefCell<Vec<String>>,
    outcome: RefCell<Option<Result<RawConfig, String>>>,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            cli_args: RefCell::new(vec![OsString::from("sluiced")]),
            key_file: RefCell::new(Vec::new()),
            remote: RefCell::new(Vec::new()),
            outcome: RefCell::new(None),
        }
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn document(lines: &[String]) -> String {
        format!("[sluice]\n{}\n", lines.join("\n"))
    }

    fn resolve(&self) -> std::cell::Ref<'_, Option<Result<RawConfig, String>>> {
        if self.outcome.borrow().is_none() {
            let mut args = self.cli_args.borrow().clone();
            if !self.key_file.borrow().is_empty() {
                let path = self.temp_dir.path().join("sluice.toml");
                if let Err(error) = fs::write(&path, Self::document(&self.key_file.borrow())) {
                    panic!("failed to write key-file: {error}");
                }
                args.push(OsString::from("--defaults-file"));
                args.push(path.into_os_string());
            }
            let remote = StaticRemote {
                body: Self::document(&self.remote.borrow()),
            };
            if !self.remote.borrow().is_empty() {
                args.push(OsString::from("--remote-conf-url=http://config.test/sluice.toml"));
            }
            let outcome =
                ConfigurationResolver::resolve(args, &remote).map_err(|error| error.to_string());
            *self.outcome.borrow_mut() = Some(outcome);
        }
        self.outcome.borrow()
    }

    fn resolved(&self) -> RawConfig {
        match self.resolve().as_ref() {
            Some(Ok(config)) => config.clone(),
            Some(Err(error)) => panic!("configuration failed to resolve: {error}"),
            None => panic!("configuration was not resolved"),
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a key-file setting \"{key}\" to \"{value}\"")]
fn given_key_file(harness: &Harness, key: String, value: String) {
    harness.key_file.borrow_mut().push(format!("{key} = \"{value}\""));
}

#[given("a remote document setting \"{key}\" to \"{value}\"")]
fn given_remote(harness: &Harness, key: String, value: String) {
    harness.remote.borrow_mut().push(format!("{key} = \"{value}\""));
}

#[when("the command line sets \"{key}\" to \"{value}\"")]
fn when_cli_sets(harness: &Harness, key: String, value: String) {
    harness.push_cli_arg(format!("--{key}"));
    harness.push_cli_arg(value);
}

#[when("the command line passes \"{token}\"")]
fn when_cli_passes(harness: &Harness, token: String) {
    harness.push_cli_arg(token);
}

#[then("the resolved default username is \"{expected}\"")]
fn then_username(harness: &Harness, expected: String) {
    let config = harness.resolved();
    assert_eq!(config.default_username.as_deref(), Some(expected.as_str()));
}

#[then("the resolved pool size is {size} and the plugins are \"{plugins}\"")]
fn then_defaults(harness: &Harness, size: i64, plugins: String) {
    let config = harness.resolved();
    assert_eq!(config.default_pool_size, Some(size));
    assert_eq!(config.plugins, [plugins]);
    assert_eq!(config.log_level, None);
}

#[then("resolution fails mentioning \"{message}\"")]
fn then_fails(harness: &Harness, message: String) {
    match harness.resolve().as_ref() {
        Some(Err(error)) => assert!(
            error.contains(&message),
            "expected '{message}' in '{error}'"
        ),
        Some(Ok(config)) => panic!("expected failure, resolved {config:?}"),
        None => panic!("configuration was not resolved"),
    }
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Command line overrides the key-file"
)]
fn command_line_overrides_key_file(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Key-file fills options absent from the command line"
)]
fn key_file_fills_unset_options(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Key-file overrides the remote document"
)]
fn key_file_overrides_remote(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Remote document fills options unset elsewhere"
)]
fn remote_fills_unset_options(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Compiled-in defaults apply without any source"
)]
fn defaults_apply(#[from(harness)] harness: Harness) {
    let _ = harness;
}

#[scenario(
    path = "tests/features/configuration_precedence.feature",
    name = "Unknown options fail the strict pass"
)]
fn unknown_options_fail(#[from(harness)] harness: Harness) {
    let _ = harness;
}
