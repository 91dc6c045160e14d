//! Declarations of the daemon's own options.

use crate::derive::{MAX_ALLOWED_PACKET_DEFAULT, MAX_QUERY_TIME};
use crate::error::OptionError;
use crate::options::{OptionDescriptor, OptionGroup, OptionKind, OptionRegistry, OptionValue};

/// Plugin loaded when `plugins` is not configured.
pub const DEFAULT_PLUGIN: &str = "proxy";
/// Configuration directory relative to the base directory.
pub const DEFAULT_CONF_DIR: &str = "conf";
/// Plugin directory relative to the base directory.
pub const DEFAULT_PLUGIN_DIR: &str = "lib/sluice/plugins";
/// Transaction log relative to the base directory.
pub const DEFAULT_XA_LOG_FILE: &str = "logs/xa.log";

pub(crate) const DEFAULT_POOL_SIZE: i64 = 100;
pub(crate) const DEFAULT_MAX_RESP_SIZE: i64 = 10 * 1024 * 1024;
pub(crate) const DEFAULT_MERGED_OUTPUT_SIZE: i64 = 8192;
pub(crate) const DEFAULT_MAX_HEADER_SIZE: i64 = 65536;
pub(crate) const DEFAULT_SLAVE_DELAY_DOWN: f64 = 60.0;
pub(crate) const DEFAULT_QUERY_CACHE_TIMEOUT: i64 = 100;

/// Option names understood by the daemon.
pub mod names {
    /// `-V`, `--version`.
    pub const VERSION: &str = "version";
    /// `--defaults-file`.
    pub const DEFAULTS_FILE: &str = "defaults-file";
    /// `-h`, `--help`.
    pub const HELP: &str = "help";
    /// `--verbose-shutdown`.
    pub const VERBOSE_SHUTDOWN: &str = "verbose-shutdown";
    /// `--daemon`.
    pub const DAEMON: &str = "daemon";
    /// `--user`.
    pub const USER: &str = "user";
    /// `--basedir`.
    pub const BASE_DIR: &str = "basedir";
    /// `--conf-dir`.
    pub const CONF_DIR: &str = "conf-dir";
    /// `--pid-file`.
    pub const PID_FILE: &str = "pid-file";
    /// `--plugin-dir`.
    pub const PLUGIN_DIR: &str = "plugin-dir";
    /// `--plugins`.
    pub const PLUGINS: &str = "plugins";
    /// `--log-level`.
    pub const LOG_LEVEL: &str = "log-level";
    /// `--log-file`.
    pub const LOG_FILE: &str = "log-file";
    /// `--log-xa-file`.
    pub const LOG_XA_FILE: &str = "log-xa-file";
    /// `--log-backtrace-on-crash`.
    pub const LOG_BACKTRACE_ON_CRASH: &str = "log-backtrace-on-crash";
    /// `--keepalive`.
    pub const KEEPALIVE: &str = "keepalive";
    /// `--max-open-files`.
    pub const MAX_OPEN_FILES: &str = "max-open-files";
    /// `--default-charset`.
    pub const DEFAULT_CHARSET: &str = "default-charset";
    /// `--default-username`.
    pub const DEFAULT_USERNAME: &str = "default-username";
    /// `--default-db`.
    pub const DEFAULT_DB: &str = "default-db";
    /// `--default-pool-size`.
    pub const DEFAULT_POOL_SIZE: &str = "default-pool-size";
    /// `--max-pool-size`.
    pub const MAX_POOL_SIZE: &str = "max-pool-size";
    /// `--max-resp-size`.
    pub const MAX_RESP_SIZE: &str = "max-resp-size";
    /// `--merged-output-size`.
    pub const MERGED_OUTPUT_SIZE: &str = "merged-output-size";
    /// `--max-header-size`.
    pub const MAX_HEADER_SIZE: &str = "max-header-size";
    /// `--worker_id`.
    pub const WORKER_ID: &str = "worker_id";
    /// `--disable-threads`.
    pub const DISABLE_THREADS: &str = "disable-threads";
    /// `--enable-back-compress`.
    pub const ENABLE_BACK_COMPRESS: &str = "enable-back-compress";
    /// `--enable-client-compress`.
    pub const ENABLE_CLIENT_COMPRESS: &str = "enable-client-compress";
    /// `--check-slave-delay`.
    pub const CHECK_SLAVE_DELAY: &str = "check-slave-delay";
    /// `--slave-delay-down`.
    pub const SLAVE_DELAY_DOWN: &str = "slave-delay-down";
    /// `--slave-delay-recover`.
    pub const SLAVE_DELAY_RECOVER: &str = "slave-delay-recover";
    /// `--default-query-cache-timeout`.
    pub const DEFAULT_QUERY_CACHE_TIMEOUT: &str = "default-query-cache-timeout";
    /// `--long-query-time`.
    pub const LONG_QUERY_TIME: &str = "long-query-time";
    /// `--enable-client-found-rows`.
    pub const ENABLE_CLIENT_FOUND_ROWS: &str = "enable-client-found-rows";
    /// `--reduce-connections`.
    pub const REDUCE_CONNECTIONS: &str = "reduce-connections";
    /// `--enable-reset-connection`.
    pub const ENABLE_RESET_CONNECTION: &str = "enable-reset-connection";
    /// `--enable-query-cache`.
    pub const ENABLE_QUERY_CACHE: &str = "enable-query-cache";
    /// `--enable-tcp-stream`.
    pub const ENABLE_TCP_STREAM: &str = "enable-tcp-stream";
    /// `--log-xa-in-detail`.
    pub const LOG_XA_IN_DETAIL: &str = "log-xa-in-detail";
    /// `--disable-dns-cache`.
    pub const DISABLE_DNS_CACHE: &str = "disable-dns-cache";
    /// `--master-preferred`.
    pub const MASTER_PREFERRED: &str = "master-preferred";
    /// `--max-allowed-packet`.
    pub const MAX_ALLOWED_PACKET: &str = "max-allowed-packet";
    /// `--remote-conf-url`.
    pub const REMOTE_CONF_URL: &str = "remote-conf-url";
}

/// Registers `--version`, `--defaults-file` and `--help`.
///
/// # Errors
///
/// Fails when any of them is already registered.
pub fn register_base_options(registry: &mut OptionRegistry) -> Result<(), OptionError> {
    registry.register_all(
        [
            OptionDescriptor::new(names::VERSION, OptionKind::Flag, "Show version")
                .with_short('V'),
            OptionDescriptor::new(
                names::DEFAULTS_FILE,
                OptionKind::String,
                "configuration file",
            )
            .with_value_hint("<file>"),
            OptionDescriptor::new(names::HELP, OptionKind::Flag, "Show help options")
                .with_short('h'),
        ]
        .map(|descriptor| descriptor.in_group(OptionGroup::Base)),
    )
}

/// Registers every daemon option with its compiled-in default.
///
/// # Errors
///
/// Fails when any of them is already registered.
pub fn register_core_options(registry: &mut OptionRegistry) -> Result<(), OptionError> {
    use OptionKind::{Double, Flag, Int, StringList};
    let text = OptionKind::String;

    let flag = |name: &str, help: &str| OptionDescriptor::new(name, Flag, help);
    let path = |name: &str, help: &str| {
        OptionDescriptor::new(name, text, help).with_value_hint("<path>")
    };
    let int = |name: &str, help: &str, default: Option<i64>| {
        let descriptor = OptionDescriptor::new(name, Int, help);
        match default {
            Some(value) => descriptor.with_default(OptionValue::Int(value)),
            None => descriptor,
        }
    };

    registry.register_all([
        flag(names::VERBOSE_SHUTDOWN, "Always log the exit code when shutting down"),
        flag(names::DAEMON, "Start in daemon mode"),
        OptionDescriptor::new(names::USER, text, "Run the daemon as user")
            .with_value_hint("<user>"),
        path(names::BASE_DIR, "Base directory to prepend to relative paths in the config"),
        path(names::CONF_DIR, "Configuration directory")
            .with_default(OptionValue::String(DEFAULT_CONF_DIR.to_owned())),
        path(names::PID_FILE, "PID file in case we are started as daemon"),
        path(names::PLUGIN_DIR, "Path to the plugins"),
        OptionDescriptor::new(names::PLUGINS, StringList, "Plugins to load")
            .with_value_hint("<name>")
            .with_default(OptionValue::StringList(vec![DEFAULT_PLUGIN.to_owned()])),
        OptionDescriptor::new(
            names::LOG_LEVEL,
            text,
            "Log all messages of level ... or higher",
        )
        .with_value_hint("(error|warning|info|message|debug)"),
        path(names::LOG_FILE, "Log all messages in a file"),
        path(names::LOG_XA_FILE, "Log XA transactions in a file")
            .with_default(OptionValue::String(DEFAULT_XA_LOG_FILE.to_owned())),
        flag(names::LOG_BACKTRACE_ON_CRASH, "Log the call stack on crash (always on)"),
        flag(names::KEEPALIVE, "Try to restart the proxy if it crashed"),
        int(names::MAX_OPEN_FILES, "Maximum number of open files (ulimit -n)", None),
        OptionDescriptor::new(names::DEFAULT_CHARSET, text, "Default character set for backends"),
        OptionDescriptor::new(names::DEFAULT_USERNAME, text, "Default username for backends"),
        OptionDescriptor::new(names::DEFAULT_DB, text, "Default database for backends"),
        int(names::DEFAULT_POOL_SIZE, "Default pool size per backend", Some(DEFAULT_POOL_SIZE)),
        int(names::MAX_POOL_SIZE, "Max pool size per backend", None),
        int(names::MAX_RESP_SIZE, "Max response size in bytes", Some(DEFAULT_MAX_RESP_SIZE)),
        int(
            names::MERGED_OUTPUT_SIZE,
            "Packet size for merged output",
            Some(DEFAULT_MERGED_OUTPUT_SIZE),
        ),
        int(names::MAX_HEADER_SIZE, "Max header size in bytes", Some(DEFAULT_MAX_HEADER_SIZE)),
        int(names::WORKER_ID, "Current worker id (1-63)", None),
        flag(names::DISABLE_THREADS, "Disable all threads creation"),
        flag(names::ENABLE_BACK_COMPRESS, "Compress backend traffic"),
        flag(names::ENABLE_CLIENT_COMPRESS, "Compress client traffic"),
        flag(names::CHECK_SLAVE_DELAY, "Check replica lag"),
        OptionDescriptor::new(names::SLAVE_DELAY_DOWN, Double, "Replica lag down threshold in seconds")
            .with_default(OptionValue::Double(DEFAULT_SLAVE_DELAY_DOWN)),
        OptionDescriptor::new(
            names::SLAVE_DELAY_RECOVER,
            Double,
            "Replica lag recover threshold in seconds",
        ),
        int(
            names::DEFAULT_QUERY_CACHE_TIMEOUT,
            "Query cache timeout in milliseconds",
            Some(DEFAULT_QUERY_CACHE_TIMEOUT),
        ),
        int(names::LONG_QUERY_TIME, "Long query time in milliseconds", Some(MAX_QUERY_TIME)),
        flag(names::ENABLE_CLIENT_FOUND_ROWS, "Use CLIENT_FOUND_ROWS flag"),
        flag(names::REDUCE_CONNECTIONS, "Reduce connections when idle connections are too many"),
        flag(names::ENABLE_RESET_CONNECTION, "Reset connections when they are reused"),
        flag(names::ENABLE_QUERY_CACHE, "Enable the query cache"),
        flag(names::ENABLE_TCP_STREAM, "Stream large results over TCP"),
        flag(names::LOG_XA_IN_DETAIL, "Log XA transactions in detail"),
        flag(names::DISABLE_DNS_CACHE, "Do not cache resolved backend addresses"),
        flag(names::MASTER_PREFERRED, "Route read-only traffic to the primary"),
        int(
            names::MAX_ALLOWED_PACKET,
            "Max allowed packet as in the backend server",
            Some(MAX_ALLOWED_PACKET_DEFAULT),
        ),
        OptionDescriptor::new(names::REMOTE_CONF_URL, text, "Remote configuration URL")
            .with_value_hint("<scheme://...>"),
    ])
}
