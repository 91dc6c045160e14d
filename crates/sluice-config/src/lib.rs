//! Configuration layer for the sluice proxy daemon.
//!
//! The crate owns the typed option catalog, the merge of the command line
//! with the local key-file and an optional remote document, path
//! normalisation against the installation base directory, and the derivation
//! of the immutable [`ResolvedConfig`] consumed by the daemon.
//!
//! Precedence, highest first: command line, key-file, remote document,
//! compiled-in default.

mod catalog;
mod derive;
mod document;
mod error;
mod logging;
mod options;
mod paths;
mod raw;
mod remote;
mod resolved;
mod resolver;

pub use catalog::{
    DEFAULT_CONF_DIR, DEFAULT_PLUGIN, DEFAULT_PLUGIN_DIR, DEFAULT_XA_LOG_FILE, names,
    register_base_options, register_core_options,
};
pub use derive::{
    MAX_ALLOWED_PACKET_CEIL, MAX_ALLOWED_PACKET_DEFAULT, MAX_ALLOWED_PACKET_FLOOR, MAX_QUERY_TIME,
    PROXY_PLUGIN, SHARD_PLUGIN, derive, validate_mode_and_defaults,
};
pub use document::{ConfigDocument, SERVICE_TABLE};
pub use error::{
    ConfigError, KeyFileError, OptionError, PathError, RemoteConfigError, ValidationError,
};
pub use logging::{LogLevel, LogLevelParseError};
pub use options::{
    OptionDescriptor, OptionGroup, OptionKind, OptionRegistry, OptionSource, OptionValue,
};
pub use paths::{check_base_dir, resolve, resolve_base_dir, resolve_paths};
pub use raw::RawConfig;
pub use remote::{RemoteSource, UrlRemoteSource};
pub use resolved::{
    BackendDefaults, BufferLimits, ConfigPaths, DerivationWarning, FeatureFlags, PoolBounds,
    ProcessSettings, QueryCache, ReplicaDelay, ResolvedConfig,
};
pub use resolver::ConfigurationResolver;
