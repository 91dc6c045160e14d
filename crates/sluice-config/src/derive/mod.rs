//! Validation and derivation of the resolved configuration.

use crate::catalog::{
    DEFAULT_MAX_HEADER_SIZE, DEFAULT_MAX_RESP_SIZE, DEFAULT_MERGED_OUTPUT_SIZE,
    DEFAULT_POOL_SIZE, DEFAULT_QUERY_CACHE_TIMEOUT, DEFAULT_SLAVE_DELAY_DOWN, names,
};
use crate::error::ValidationError;
use crate::raw::RawConfig;
use crate::resolved::{
    BackendDefaults, BufferLimits, ConfigPaths, DerivationWarning, FeatureFlags, PoolBounds,
    ProcessSettings, QueryCache, ReplicaDelay, ResolvedConfig,
};

/// Name of the generic proxy plugin.
pub const PROXY_PLUGIN: &str = "proxy";
/// Name of the sharding plugin.
pub const SHARD_PLUGIN: &str = "shard";

/// Upper bound of `long-query-time`, in milliseconds.
pub const MAX_QUERY_TIME: i64 = 1000;
/// Smallest accepted `max-allowed-packet`.
pub const MAX_ALLOWED_PACKET_FLOOR: i64 = 1024;
/// Largest accepted `max-allowed-packet`.
pub const MAX_ALLOWED_PACKET_CEIL: i64 = 1024 * 1024 * 1024;
/// `max-allowed-packet` when none is configured.
pub const MAX_ALLOWED_PACKET_DEFAULT: i64 = 32 * 1024 * 1024;

const WORKER_ID_MASK: i64 = 0x3f;
const COMPRESSED_OUTPUT_FACTOR: u64 = 8;

/// Checks the plugin mode and the mandatory backend username.
///
/// # Errors
///
/// Returns [`ValidationError::ModeConflict`] when both the sharding and the
/// generic proxy plugin are requested, and
/// [`ValidationError::MissingDefaultUsername`] when no non-empty username is
/// configured.
pub fn validate_mode_and_defaults(raw: &RawConfig) -> Result<(), ValidationError> {
    let requested = |name: &str| raw.plugins.iter().any(|plugin| plugin == name);
    if requested(SHARD_PLUGIN) && requested(PROXY_PLUGIN) {
        return Err(ValidationError::ModeConflict {
            sharding: SHARD_PLUGIN,
            proxy: PROXY_PLUGIN,
        });
    }
    match raw.default_username.as_deref() {
        Some(username) if !username.is_empty() => Ok(()),
        _ => Err(ValidationError::MissingDefaultUsername),
    }
}

/// Validates `raw` and computes the derived settings.
///
/// Adjustments that are not fatal are recorded in
/// [`ResolvedConfig::warnings`].
///
/// # Errors
///
/// Fails with the [`validate_mode_and_defaults`] errors and with
/// [`ValidationError::OutOfRange`] for settings that cannot be clamped.
pub fn derive(raw: RawConfig) -> Result<ResolvedConfig, ValidationError> {
    validate_mode_and_defaults(&raw)?;
    let mut warnings = Vec::new();

    let pool = derive_pool(&raw)?;
    let buffers = derive_buffers(&raw, &mut warnings)?;
    let replica_delay = derive_replica_delay(&raw, &mut warnings)?;

    let timeout = raw
        .default_query_cache_timeout
        .unwrap_or(DEFAULT_QUERY_CACHE_TIMEOUT)
        .max(1);
    let query_cache = QueryCache {
        enabled: raw.enable_query_cache,
        timeout_ms: non_negative(names::DEFAULT_QUERY_CACHE_TIMEOUT, timeout)?,
    };

    let requested_long_query_time = raw.long_query_time.unwrap_or(MAX_QUERY_TIME);
    let long_query_time_ms = requested_long_query_time.min(MAX_QUERY_TIME);
    if long_query_time_ms != requested_long_query_time {
        warnings.push(DerivationWarning::LongQueryTimeClamped {
            requested: requested_long_query_time,
            applied: long_query_time_ms,
        });
    }

    let worker_id = raw
        .worker_id
        .filter(|id| *id > 0)
        .and_then(|id| u8::try_from(id & WORKER_ID_MASK).ok());

    let max_open_files = match raw.max_open_files {
        Some(0) | None => None,
        Some(limit) => Some(non_negative(names::MAX_OPEN_FILES, limit)?),
    };

    Ok(ResolvedConfig {
        paths: ConfigPaths {
            base_dir: raw.base_dir,
            conf_dir: raw.conf_dir,
            pid_file: raw.pid_file,
            plugin_dir: raw.plugin_dir,
            log_file: raw.log_file,
            xa_log_file: raw.log_xa_file,
        },
        process: ProcessSettings {
            daemon: raw.daemon,
            keepalive: raw.keepalive,
            user: raw.user,
            verbose_shutdown: raw.verbose_shutdown,
            log_level: raw.log_level.unwrap_or_default(),
            max_open_files,
        },
        plugins: raw.plugins,
        backend: BackendDefaults {
            username: raw.default_username.unwrap_or_default(),
            charset: raw.default_charset,
            database: raw.default_db,
        },
        pool,
        buffers,
        replica_delay,
        query_cache,
        long_query_time_ms,
        worker_id,
        features: FeatureFlags {
            disable_threads: raw.disable_threads,
            back_compress: raw.enable_back_compress,
            client_compress: raw.enable_client_compress,
            client_found_rows: raw.enable_client_found_rows,
            reduce_connections: raw.reduce_connections,
            reset_connection: raw.enable_reset_connection,
            tcp_stream: raw.enable_tcp_stream,
            xa_log_in_detail: raw.log_xa_in_detail,
            disable_dns_cache: raw.disable_dns_cache,
        },
        remote_conf_url: raw.remote_conf_url,
        warnings,
    })
}

fn derive_pool(raw: &RawConfig) -> Result<PoolBounds, ValidationError> {
    let min_idle = non_negative(
        names::DEFAULT_POOL_SIZE,
        raw.default_pool_size.unwrap_or(DEFAULT_POOL_SIZE),
    )?;
    let configured_max = raw
        .max_pool_size
        .map(|max| non_negative(names::MAX_POOL_SIZE, max))
        .transpose()?
        .unwrap_or(0);
    let max_idle = if configured_max >= min_idle {
        configured_max
    } else {
        min_idle.saturating_mul(2)
    };
    Ok(PoolBounds { min_idle, max_idle })
}

fn derive_buffers(
    raw: &RawConfig,
    warnings: &mut Vec<DerivationWarning>,
) -> Result<BufferLimits, ValidationError> {
    let merged_output_size = positive(
        names::MERGED_OUTPUT_SIZE,
        raw.merged_output_size.unwrap_or(DEFAULT_MERGED_OUTPUT_SIZE),
    )?;
    let compressed_merged_output_size = merged_output_size
        .checked_mul(COMPRESSED_OUTPUT_FACTOR)
        .ok_or_else(|| ValidationError::OutOfRange {
            option: names::MERGED_OUTPUT_SIZE,
            value: merged_output_size.to_string(),
            reason: "compressed buffer size overflows",
        })?;

    let requested_packet = raw.max_allowed_packet.unwrap_or(MAX_ALLOWED_PACKET_DEFAULT);
    let packet = requested_packet.clamp(MAX_ALLOWED_PACKET_FLOOR, MAX_ALLOWED_PACKET_CEIL);
    let max_allowed_packet = non_negative(names::MAX_ALLOWED_PACKET, packet)?;
    if packet != requested_packet {
        warnings.push(DerivationWarning::PacketClamped {
            requested: requested_packet,
            applied: max_allowed_packet,
        });
    }

    Ok(BufferLimits {
        max_resp_size: positive(
            names::MAX_RESP_SIZE,
            raw.max_resp_size.unwrap_or(DEFAULT_MAX_RESP_SIZE),
        )?,
        merged_output_size,
        compressed_merged_output_size,
        max_header_size: positive(
            names::MAX_HEADER_SIZE,
            raw.max_header_size.unwrap_or(DEFAULT_MAX_HEADER_SIZE),
        )?,
        max_allowed_packet,
    })
}

fn derive_replica_delay(
    raw: &RawConfig,
    warnings: &mut Vec<DerivationWarning>,
) -> Result<ReplicaDelay, ValidationError> {
    let down_secs = raw.slave_delay_down.unwrap_or(DEFAULT_SLAVE_DELAY_DOWN);
    if !down_secs.is_finite() || down_secs <= 0.0 {
        return Err(ValidationError::OutOfRange {
            option: names::SLAVE_DELAY_DOWN,
            value: down_secs.to_string(),
            reason: "must be a positive number of seconds",
        });
    }

    let recover_secs = match raw.slave_delay_recover {
        Some(recover) if recover > down_secs => {
            warnings.push(DerivationWarning::RecoverAboveDown {
                recover_secs: recover,
                down_secs,
            });
            down_secs
        }
        Some(recover) if recover > 0.0 => recover,
        _ => down_secs / 2.0,
    };

    Ok(ReplicaDelay {
        check: raw.check_slave_delay,
        down_secs,
        recover_secs,
        master_preferred: raw.master_preferred,
    })
}

fn non_negative(option: &'static str, value: i64) -> Result<u64, ValidationError> {
    u64::try_from(value).map_err(|_| ValidationError::OutOfRange {
        option,
        value: value.to_string(),
        reason: "must not be negative",
    })
}

fn positive(option: &'static str, value: i64) -> Result<u64, ValidationError> {
    match u64::try_from(value) {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(ValidationError::OutOfRange {
            option,
            value: value.to_string(),
            reason: "must be positive",
        }),
    }
}
