//! Values read out of the option registry before derivation.

use camino::Utf8PathBuf;

use crate::catalog::names;
use crate::error::ConfigError;
use crate::logging::LogLevel;
use crate::options::OptionRegistry;

/// Merged option values prior to path resolution and derivation.
///
/// Fields without a compiled-in default are `None` until some source sets
/// them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawConfig {
    /// `--version` was given.
    pub print_version: bool,
    /// `--help` was given.
    pub show_help: bool,
    /// Key-file to read.
    pub defaults_file: Option<Utf8PathBuf>,
    /// Log the exit code at error severity on shutdown.
    pub verbose_shutdown: bool,
    /// Detach from the terminal.
    pub daemon: bool,
    /// Account to switch to.
    pub user: Option<String>,
    /// Installation base directory.
    pub base_dir: Option<Utf8PathBuf>,
    /// Configuration directory.
    pub conf_dir: Option<Utf8PathBuf>,
    /// Pid file.
    pub pid_file: Option<Utf8PathBuf>,
    /// Plugin directory.
    pub plugin_dir: Option<Utf8PathBuf>,
    /// Plugins to load, in order.
    pub plugins: Vec<String>,
    /// Log severity threshold.
    pub log_level: Option<LogLevel>,
    /// Log file.
    pub log_file: Option<Utf8PathBuf>,
    /// Transaction log file.
    pub log_xa_file: Option<Utf8PathBuf>,
    /// Accepted for compatibility. The crash handler always logs the call
    /// stack.
    pub log_backtrace_on_crash: bool,
    /// Run under a restarting supervisor.
    pub keepalive: bool,
    /// Open file limit to apply.
    pub max_open_files: Option<i64>,
    /// Default backend character set.
    pub default_charset: Option<String>,
    /// Default backend username.
    pub default_username: Option<String>,
    /// Default backend database.
    pub default_db: Option<String>,
    /// Minimum idle connections per backend.
    pub default_pool_size: Option<i64>,
    /// Maximum idle connections per backend.
    pub max_pool_size: Option<i64>,
    /// Maximum response size in bytes.
    pub max_resp_size: Option<i64>,
    /// Merged output packet size.
    pub merged_output_size: Option<i64>,
    /// Maximum header size in bytes.
    pub max_header_size: Option<i64>,
    /// Worker identifier.
    pub worker_id: Option<i64>,
    /// Disable helper threads.
    pub disable_threads: bool,
    /// Compress backend traffic.
    pub enable_back_compress: bool,
    /// Compress client traffic.
    pub enable_client_compress: bool,
    /// Monitor replica lag.
    pub check_slave_delay: bool,
    /// Replica lag down threshold in seconds.
    pub slave_delay_down: Option<f64>,
    /// Replica lag recover threshold in seconds.
    pub slave_delay_recover: Option<f64>,
    /// Query cache timeout in milliseconds.
    pub default_query_cache_timeout: Option<i64>,
    /// Long query threshold in milliseconds.
    pub long_query_time: Option<i64>,
    /// Use the found-rows client flag.
    pub enable_client_found_rows: bool,
    /// Shrink idle pools.
    pub reduce_connections: bool,
    /// Reset reused connections.
    pub enable_reset_connection: bool,
    /// Enable the query cache.
    pub enable_query_cache: bool,
    /// Stream large results.
    pub enable_tcp_stream: bool,
    /// Log transactions in detail.
    pub log_xa_in_detail: bool,
    /// Disable backend address caching.
    pub disable_dns_cache: bool,
    /// Prefer the primary for reads.
    pub master_preferred: bool,
    /// Maximum packet size.
    pub max_allowed_packet: Option<i64>,
    /// Remote configuration URL.
    pub remote_conf_url: Option<String>,
}

impl RawConfig {
    /// Reads the daemon options out of `registry`.
    ///
    /// # Errors
    ///
    /// Fails when a daemon option is missing from the registry or
    /// `log-level` names no known level.
    pub fn from_registry(registry: &OptionRegistry) -> Result<Self, ConfigError> {
        let path = |name: &str| -> Result<Option<Utf8PathBuf>, ConfigError> {
            Ok(registry.string(name)?.map(Utf8PathBuf::from))
        };
        let text = |name: &str| -> Result<Option<String>, ConfigError> {
            Ok(registry.string(name)?.map(ToOwned::to_owned))
        };
        let log_level = registry
            .string(names::LOG_LEVEL)?
            .map(|value| {
                value.parse::<LogLevel>().map_err(|_| ConfigError::InvalidLogLevel {
                    value: value.to_owned(),
                })
            })
            .transpose()?;

        Ok(Self {
            print_version: registry.flag(names::VERSION)?,
            show_help: registry.flag(names::HELP)?,
            defaults_file: path(names::DEFAULTS_FILE)?,
            verbose_shutdown: registry.flag(names::VERBOSE_SHUTDOWN)?,
            daemon: registry.flag(names::DAEMON)?,
            user: text(names::USER)?,
            base_dir: path(names::BASE_DIR)?,
            conf_dir: path(names::CONF_DIR)?,
            pid_file: path(names::PID_FILE)?,
            plugin_dir: path(names::PLUGIN_DIR)?,
            plugins: registry.string_list(names::PLUGINS)?.to_vec(),
            log_level,
            log_file: path(names::LOG_FILE)?,
            log_xa_file: path(names::LOG_XA_FILE)?,
            log_backtrace_on_crash: registry.flag(names::LOG_BACKTRACE_ON_CRASH)?,
            keepalive: registry.flag(names::KEEPALIVE)?,
            max_open_files: registry.int(names::MAX_OPEN_FILES)?,
            default_charset: text(names::DEFAULT_CHARSET)?,
            default_username: text(names::DEFAULT_USERNAME)?,
            default_db: text(names::DEFAULT_DB)?,
            default_pool_size: registry.int(names::DEFAULT_POOL_SIZE)?,
            max_pool_size: registry.int(names::MAX_POOL_SIZE)?,
            max_resp_size: registry.int(names::MAX_RESP_SIZE)?,
            merged_output_size: registry.int(names::MERGED_OUTPUT_SIZE)?,
            max_header_size: registry.int(names::MAX_HEADER_SIZE)?,
            worker_id: registry.int(names::WORKER_ID)?,
            disable_threads: registry.flag(names::DISABLE_THREADS)?,
            enable_back_compress: registry.flag(names::ENABLE_BACK_COMPRESS)?,
            enable_client_compress: registry.flag(names::ENABLE_CLIENT_COMPRESS)?,
            check_slave_delay: registry.flag(names::CHECK_SLAVE_DELAY)?,
            slave_delay_down: registry.double(names::SLAVE_DELAY_DOWN)?,
            slave_delay_recover: registry.double(names::SLAVE_DELAY_RECOVER)?,
            default_query_cache_timeout: registry.int(names::DEFAULT_QUERY_CACHE_TIMEOUT)?,
            long_query_time: registry.int(names::LONG_QUERY_TIME)?,
            enable_client_found_rows: registry.flag(names::ENABLE_CLIENT_FOUND_ROWS)?,
            reduce_connections: registry.flag(names::REDUCE_CONNECTIONS)?,
            enable_reset_connection: registry.flag(names::ENABLE_RESET_CONNECTION)?,
            enable_query_cache: registry.flag(names::ENABLE_QUERY_CACHE)?,
            enable_tcp_stream: registry.flag(names::ENABLE_TCP_STREAM)?,
            log_xa_in_detail: registry.flag(names::LOG_XA_IN_DETAIL)?,
            disable_dns_cache: registry.flag(names::DISABLE_DNS_CACHE)?,
            master_preferred: registry.flag(names::MASTER_PREFERRED)?,
            max_allowed_packet: registry.int(names::MAX_ALLOWED_PACKET)?,
            remote_conf_url: text(names::REMOTE_CONF_URL)?,
        })
    }
}
