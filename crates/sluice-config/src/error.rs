//! Error types raised while building and validating the configuration.

use std::io;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::options::OptionKind;

/// Errors raised by the option registry.
#[derive(Debug, Error)]
pub enum OptionError {
    /// An option with the same long name is already registered.
    #[error("option '--{name}' is already registered")]
    DuplicateOption {
        /// Long option name.
        name: String,
    },
    /// An option with the same short flag is already registered.
    #[error("short flag '-{short}' of '--{name}' is already registered")]
    DuplicateShortFlag {
        /// Short flag character.
        short: char,
        /// Long name of the option being registered.
        name: String,
    },
    /// The descriptor's default value does not match its declared kind.
    #[error("default value of '--{name}' is not a {expected}")]
    DefaultKind {
        /// Long option name.
        name: String,
        /// Kind declared by the descriptor.
        expected: OptionKind,
    },
    /// The strict pass found a token that matches no registered option.
    #[error("unknown option '{token}'")]
    UnknownOption {
        /// Offending command-line token.
        token: String,
    },
    /// The strict pass found a positional argument.
    #[error("unexpected argument '{token}'")]
    UnexpectedArgument {
        /// Offending command-line token.
        token: String,
    },
    /// A command-line argument was not valid UTF-8.
    #[error("argument '{lossy}' is not valid UTF-8")]
    NonUtf8Argument {
        /// Lossy rendering of the argument.
        lossy: String,
    },
    /// An option requiring a value was given none.
    #[error("option '--{name}' requires a value")]
    MissingValue {
        /// Long option name.
        name: String,
    },
    /// A flag option was given an explicit value.
    #[error("option '--{name}' does not take a value")]
    UnexpectedValue {
        /// Long option name.
        name: String,
    },
    /// A value could not be parsed for the option's kind.
    #[error("cannot parse '{value}' for '--{name}' as {expected}")]
    InvalidValue {
        /// Long option name.
        name: String,
        /// Raw text supplied by the user.
        value: String,
        /// Kind the option expects.
        expected: OptionKind,
    },
    /// A lookup named an option that was never registered.
    #[error("option '--{name}' is not registered")]
    NotRegistered {
        /// Long option name.
        name: String,
    },
    /// A typed lookup or write used the wrong kind.
    #[error("option '--{name}' holds a {actual}, not a {expected}")]
    KindMismatch {
        /// Long option name.
        name: String,
        /// Kind requested by the caller.
        expected: OptionKind,
        /// Kind declared by the descriptor.
        actual: OptionKind,
    },
}

/// Errors raised while reading a TOML configuration document.
#[derive(Debug, Error)]
pub enum KeyFileError {
    /// The key-file could not be read.
    #[error("failed to read key-file {path}: {source}")]
    Read {
        /// Path of the key-file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The document is not valid TOML.
    #[error("failed to parse {origin}: {source}")]
    Parse {
        /// Where the document came from.
        origin: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
    /// The document has no service table.
    #[error("{origin} has no [{table}] table")]
    MissingTable {
        /// Where the document came from.
        origin: String,
        /// Name of the expected table.
        table: &'static str,
    },
    /// A key holds a value of the wrong type for its option.
    #[error("{origin}: key '{key}' must be a {expected}")]
    Type {
        /// Where the document came from.
        origin: String,
        /// Offending key.
        key: String,
        /// Kind the option expects.
        expected: OptionKind,
    },
}

/// Errors raised while fetching the remote configuration document.
#[derive(Debug, Error)]
pub enum RemoteConfigError {
    /// The configured URL does not parse.
    #[error("invalid remote configuration URL '{url}': {source}")]
    InvalidUrl {
        /// URL text as configured.
        url: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The URL uses a scheme no fetcher understands.
    #[error("unsupported remote configuration scheme '{scheme}'")]
    UnsupportedScheme {
        /// URL scheme.
        scheme: String,
    },
    /// A `file://` URL does not name a local path.
    #[error("remote configuration URL '{url}' does not name a local file")]
    InvalidFilePath {
        /// URL text.
        url: String,
    },
    /// Reading a `file://` document failed.
    #[error("failed to read remote configuration {path}: {source}")]
    Read {
        /// Local path behind the URL.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Fetching an `http(s)://` document failed.
    #[error("failed to fetch remote configuration {url}: {source}")]
    Http {
        /// URL text.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The fetched document is malformed.
    #[error(transparent)]
    Document(#[from] KeyFileError),
}

/// Errors raised while determining filesystem locations.
#[derive(Debug, Error)]
pub enum PathError {
    /// `basedir` was configured as a relative path.
    #[error("--basedir must be an absolute path, got '{path}'")]
    RelativeBaseDir {
        /// Configured value.
        path: Utf8PathBuf,
    },
    /// The running executable's path is unknown.
    #[error("cannot determine the running executable")]
    UnknownExecutable,
    /// The executable path is not valid UTF-8.
    #[error("executable path {path:?} is not valid UTF-8")]
    NonUtf8Executable {
        /// Path as reported by the OS.
        path: PathBuf,
    },
    /// The executable does not sit two levels below an installation prefix.
    #[error("cannot derive an installation prefix from {path}")]
    NoInstallPrefix {
        /// Executable path.
        path: Utf8PathBuf,
    },
    /// The base directory cannot be inspected.
    #[error("base directory {path} is not accessible: {source}")]
    BaseDirUnavailable {
        /// Base directory.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The base directory exists but is not a directory.
    #[error("base directory {path} is not a directory")]
    BaseDirNotADirectory {
        /// Base directory.
        path: Utf8PathBuf,
    },
}

/// Errors raised while assembling the raw configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The option registry rejected a registration, token or lookup.
    #[error(transparent)]
    Option(#[from] OptionError),
    /// The local key-file could not be used.
    #[error(transparent)]
    KeyFile(#[from] KeyFileError),
    /// The remote document could not be used.
    #[error(transparent)]
    Remote(#[from] RemoteConfigError),
    /// A filesystem location could not be determined.
    #[error(transparent)]
    Path(#[from] PathError),
    /// `log-level` names no known level.
    #[error("--log-level={value} failed, level unknown")]
    InvalidLogLevel {
        /// Configured value.
        value: String,
    },
}

/// Errors raised while validating and deriving the resolved configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The sharding and generic proxy plugins were both requested.
    #[error("plugins '{sharding}' and '{proxy}' are mutually exclusive")]
    ModeConflict {
        /// Name of the sharding plugin.
        sharding: &'static str,
        /// Name of the generic proxy plugin.
        proxy: &'static str,
    },
    /// No default backend username was configured.
    #[error("proxy needs default username")]
    MissingDefaultUsername,
    /// A numeric setting is outside the range that can be clamped.
    #[error("--{option}={value} is out of range: {reason}")]
    OutOfRange {
        /// Option name.
        option: &'static str,
        /// Configured value rendered as text.
        value: String,
        /// Constraint that was violated.
        reason: &'static str,
    },
}
