//! Proxy Configuration Module
//!
//! Everything the proxy process needs at startup: the upstream origin, the
//! listener address, LMDB locations and sizes, and the offline policy shared
//! with the core. Values come from `SHABAKA_*` environment variables with
//! defaults suitable for a kiosk running next to its player server.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use shabaka_core::{ConfigError, OfflineConfig, PlayerError, PlayerResult};

use crate::constants::{
    DEFAULT_BIND, DEFAULT_CACHE_MAX_SIZE_MB, DEFAULT_DATA_DIR, DEFAULT_MAX_BODY_BYTES,
    DEFAULT_PORT, DEFAULT_QUEUE_MAX_SIZE_MB, DEFAULT_UPSTREAM_URL,
};
use crate::telemetry::LogFormat;

// ============================================================================
// PROXY CONFIGURATION
// ============================================================================

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    // ========================================================================
    // Network
    // ========================================================================
    /// Origin of the player server, e.g. `http://127.0.0.1:5000`.
    pub upstream_url: String,

    /// Listener address the display connects to.
    pub bind: String,

    pub port: u16,

    /// Per-request upstream timeout. `None` waits for the transport to fail.
    pub upstream_timeout: Option<Duration>,

    /// Largest request body accepted from the display.
    pub max_body_bytes: usize,

    // ========================================================================
    // Storage
    // ========================================================================
    /// Directory holding the `cache` and `queue` LMDB environments.
    pub data_dir: PathBuf,

    pub cache_max_size_mb: usize,

    pub queue_max_size_mb: usize,

    // ========================================================================
    // Policy
    // ========================================================================
    pub log_format: LogFormat,

    pub offline: OfflineConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            upstream_timeout: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            cache_max_size_mb: DEFAULT_CACHE_MAX_SIZE_MB,
            queue_max_size_mb: DEFAULT_QUEUE_MAX_SIZE_MB,
            log_format: LogFormat::Json,
            offline: OfflineConfig::default(),
        }
    }
}

impl ProxyConfig {
    /// Create ProxyConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SHABAKA_UPSTREAM_URL`: Player server origin (default: http://127.0.0.1:5000)
    /// - `SHABAKA_BIND` / `SHABAKA_PORT`: Listener (default: 127.0.0.1:8787)
    /// - `SHABAKA_DATA_DIR`: LMDB directory (default: ./shabaka-data)
    /// - `SHABAKA_CACHE_MAX_SIZE_MB` / `SHABAKA_QUEUE_MAX_SIZE_MB`: Map sizes
    /// - `SHABAKA_CACHE_VERSION`: Partition version tag (default: v1)
    /// - `SHABAKA_MAX_PENDING_EVENTS`: Queue cap (default: 10000)
    /// - `SHABAKA_DRAIN_BATCH_SIZE`: Drain page size (default: 100)
    /// - `SHABAKA_PROBE_INTERVAL_SECS` / `SHABAKA_PROBE_PATH`: Connectivity probe
    /// - `SHABAKA_INSTALL_RETRY_SECS`: Install retry period (default: 60)
    /// - `SHABAKA_UPSTREAM_TIMEOUT_SECS`: Upstream timeout (default: unset)
    /// - `SHABAKA_MAX_BODY_BYTES`: Request body limit (default: 256 MiB)
    /// - `SHABAKA_LOG_FORMAT`: `json` or `pretty` (default: json)
    pub fn from_env() -> PlayerResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    ///
    /// Unset variables take their default. Set but unparseable variables are
    /// rejected rather than silently replaced.
    pub fn from_lookup<F>(lookup: F) -> PlayerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let policy = OfflineConfig::default();
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let offline = OfflineConfig {
            cache_version: var("SHABAKA_CACHE_VERSION").unwrap_or(policy.cache_version),
            shell_assets: policy.shell_assets,
            max_pending_events: parse_or(
                &var,
                "SHABAKA_MAX_PENDING_EVENTS",
                policy.max_pending_events,
            )?,
            drain_batch_size: parse_or(&var, "SHABAKA_DRAIN_BATCH_SIZE", policy.drain_batch_size)?,
            probe_interval: Duration::from_secs(parse_or(
                &var,
                "SHABAKA_PROBE_INTERVAL_SECS",
                policy.probe_interval.as_secs(),
            )?),
            probe_path: var("SHABAKA_PROBE_PATH").unwrap_or(policy.probe_path),
            install_retry_interval: Duration::from_secs(parse_or(
                &var,
                "SHABAKA_INSTALL_RETRY_SECS",
                policy.install_retry_interval.as_secs(),
            )?),
        };

        let upstream_timeout = match var("SHABAKA_UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(parse_value(
                "SHABAKA_UPSTREAM_TIMEOUT_SECS",
                &raw,
            )?)),
            None => None,
        };

        let log_format = match var("SHABAKA_LOG_FORMAT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| invalid("SHABAKA_LOG_FORMAT", &raw, "expected json or pretty"))?,
            None => defaults.log_format,
        };

        Ok(Self {
            upstream_url: var("SHABAKA_UPSTREAM_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.upstream_url),
            bind: var("SHABAKA_BIND").unwrap_or(defaults.bind),
            port: parse_or(&var, "SHABAKA_PORT", defaults.port)?,
            upstream_timeout,
            max_body_bytes: parse_or(&var, "SHABAKA_MAX_BODY_BYTES", defaults.max_body_bytes)?,
            data_dir: var("SHABAKA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            cache_max_size_mb: parse_or(
                &var,
                "SHABAKA_CACHE_MAX_SIZE_MB",
                defaults.cache_max_size_mb,
            )?,
            queue_max_size_mb: parse_or(
                &var,
                "SHABAKA_QUEUE_MAX_SIZE_MB",
                defaults.queue_max_size_mb,
            )?,
            log_format,
            offline,
        })
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - upstream_url is an absolute http(s) origin
    /// - bind parses as an IP address
    /// - LMDB map sizes and the body limit are positive
    /// - the offline policy (see [`OfflineConfig::validate`])
    pub fn validate(&self) -> PlayerResult<()> {
        if !(self.upstream_url.starts_with("http://") || self.upstream_url.starts_with("https://"))
        {
            return Err(invalid(
                "upstream_url",
                &self.upstream_url,
                "upstream_url must start with http:// or https://",
            ));
        }

        if self.bind.parse::<IpAddr>().is_err() {
            return Err(invalid("bind", &self.bind, "bind must be an IP address"));
        }

        if self.cache_max_size_mb == 0 || self.queue_max_size_mb == 0 {
            return Err(invalid(
                "max_size_mb",
                &format!("{}/{}", self.cache_max_size_mb, self.queue_max_size_mb),
                "LMDB map sizes must be greater than 0",
            ));
        }

        if self.max_body_bytes == 0 {
            return Err(invalid(
                "max_body_bytes",
                "0",
                "max_body_bytes must be greater than 0",
            ));
        }

        if matches!(self.upstream_timeout, Some(timeout) if timeout.is_zero()) {
            return Err(invalid(
                "upstream_timeout",
                "0s",
                "upstream_timeout must be positive when set",
            ));
        }

        self.offline.validate()
    }

    /// Socket address for the listener.
    pub fn bind_addr(&self) -> PlayerResult<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .map_err(|_| invalid("bind", &self.bind, "bind must be an IP address"))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.data_dir.join("queue")
    }
}

fn parse_or<T, F>(var: &F, name: &str, default: T) -> PlayerResult<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> PlayerResult<T> {
    raw.parse()
        .map_err(|_| invalid(name, raw, "value could not be parsed"))
}

fn invalid(field: &str, value: &str, reason: &str) -> PlayerError {
    PlayerError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}
