//! The immutable configuration handed to the rest of the daemon.

use std::fmt;

use camino::Utf8PathBuf;

use crate::logging::LogLevel;

/// Fully merged and validated settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    /// Filesystem locations.
    pub paths: ConfigPaths,
    /// Process-level behaviour.
    pub process: ProcessSettings,
    /// Plugins to load, in order.
    pub plugins: Vec<String>,
    /// Defaults applied to backend sessions.
    pub backend: BackendDefaults,
    /// Idle connection bounds per backend.
    pub pool: PoolBounds,
    /// Buffer and packet limits.
    pub buffers: BufferLimits,
    /// Replica lag thresholds.
    pub replica_delay: ReplicaDelay,
    /// Query cache behaviour.
    pub query_cache: QueryCache,
    /// Long query threshold in milliseconds.
    pub long_query_time_ms: i64,
    /// Six-bit worker identifier, when configured.
    pub worker_id: Option<u8>,
    /// Feature switches.
    pub features: FeatureFlags,
    /// Remote configuration URL the settings were merged from.
    pub remote_conf_url: Option<String>,
    /// Adjustments made while deriving the settings.
    pub warnings: Vec<DerivationWarning>,
}

/// Resolved filesystem locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    /// Installation base directory.
    pub base_dir: Option<Utf8PathBuf>,
    /// Configuration directory.
    pub conf_dir: Option<Utf8PathBuf>,
    /// Pid file.
    pub pid_file: Option<Utf8PathBuf>,
    /// Plugin directory.
    pub plugin_dir: Option<Utf8PathBuf>,
    /// Log file; stderr when absent.
    pub log_file: Option<Utf8PathBuf>,
    /// Transaction log file.
    pub xa_log_file: Option<Utf8PathBuf>,
}

/// Process-level behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSettings {
    /// Detach from the terminal.
    pub daemon: bool,
    /// Run under a restarting supervisor.
    pub keepalive: bool,
    /// Account to run as.
    pub user: Option<String>,
    /// Log the exit code at error severity.
    pub verbose_shutdown: bool,
    /// Log severity threshold.
    pub log_level: LogLevel,
    /// Open file limit to apply.
    pub max_open_files: Option<u64>,
}

/// Defaults applied to backend sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendDefaults {
    /// Username; always present once validated.
    pub username: String,
    /// Character set.
    pub charset: Option<String>,
    /// Database.
    pub database: Option<String>,
}

/// Idle connection bounds per backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolBounds {
    /// Minimum idle connections.
    pub min_idle: u64,
    /// Maximum idle connections.
    pub max_idle: u64,
}

/// Buffer and packet limits, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferLimits {
    /// Largest response relayed to a client.
    pub max_resp_size: u64,
    /// Merged output packet size.
    pub merged_output_size: u64,
    /// Compressed merged output buffer size.
    pub compressed_merged_output_size: u64,
    /// Largest accepted header.
    pub max_header_size: u64,
    /// Largest accepted packet.
    pub max_allowed_packet: u64,
}

/// Replica lag thresholds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReplicaDelay {
    /// Monitor replica lag.
    pub check: bool,
    /// Lag in seconds above which a replica is marked down.
    pub down_secs: f64,
    /// Lag in seconds below which a replica is marked up again.
    pub recover_secs: f64,
    /// Route read-only traffic to the primary.
    pub master_preferred: bool,
}

/// Query cache behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryCache {
    /// Cache enabled.
    pub enabled: bool,
    /// Entry lifetime in milliseconds, at least 1.
    pub timeout_ms: u64,
}

/// Feature switches passed through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Disable helper threads.
    pub disable_threads: bool,
    /// Compress backend traffic.
    pub back_compress: bool,
    /// Compress client traffic.
    pub client_compress: bool,
    /// Use the found-rows client flag.
    pub client_found_rows: bool,
    /// Shrink idle pools.
    pub reduce_connections: bool,
    /// Reset reused connections.
    pub reset_connection: bool,
    /// Stream large results.
    pub tcp_stream: bool,
    /// Log transactions in detail.
    pub xa_log_in_detail: bool,
    /// Disable backend address caching.
    pub disable_dns_cache: bool,
}

/// A setting that was adjusted rather than rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivationWarning {
    /// The recover threshold exceeded the down threshold.
    RecoverAboveDown {
        /// Configured recover threshold.
        recover_secs: f64,
        /// Down threshold it was clamped to.
        down_secs: f64,
    },
    /// `max-allowed-packet` was outside the accepted range.
    PacketClamped {
        /// Configured value.
        requested: i64,
        /// Value applied.
        applied: u64,
    },
    /// `long-query-time` exceeded its upper bound.
    LongQueryTimeClamped {
        /// Configured value.
        requested: i64,
        /// Value applied.
        applied: i64,
    },
}

impl fmt::Display for DerivationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RecoverAboveDown {
                recover_secs,
                down_secs,
            } => write!(
                f,
                "slave-delay-recover={recover_secs} is greater than slave-delay-down, set to {down_secs}"
            ),
            Self::PacketClamped { requested, applied } => {
                write!(f, "max-allowed-packet={requested} is out of range, set to {applied}")
            }
            Self::LongQueryTimeClamped { requested, applied } => {
                write!(f, "long-query-time={requested} is too large, set to {applied}")
            }
        }
    }
}
