//! Offline policy configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PlayerError, PlayerResult};
use crate::partition::PartitionSet;

/// Static assets that make up the player shell of one version.
pub const DEFAULT_SHELL_ASSETS: [&str; 4] = [
    "/player/display",
    "/static/js/hls.min.js",
    "/static/js/mpegts.min.js",
    "/static/favicon-player.svg",
];

/// Policy values shared by the router, the sync coordinator and the lifecycle
/// manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Version tag embedded in every partition name.
    pub cache_version: String,
    /// Shell assets fetched at install time.
    pub shell_assets: Vec<String>,
    /// Queue cap; the oldest event is dropped once it is reached.
    pub max_pending_events: usize,
    /// Events read per page while draining.
    pub drain_batch_size: usize,
    /// How often connectivity is probed while offline.
    pub probe_interval: Duration,
    /// Path requested by the connectivity probe.
    pub probe_path: String,
    /// How often a failed install is retried.
    pub install_retry_interval: Duration,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            cache_version: "v1".to_string(),
            shell_assets: DEFAULT_SHELL_ASSETS.iter().map(|a| a.to_string()).collect(),
            max_pending_events: 10_000,
            drain_batch_size: 100,
            probe_interval: Duration::from_secs(30),
            probe_path: "/static/favicon-player.svg".to_string(),
            install_retry_interval: Duration::from_secs(60),
        }
    }
}

impl OfflineConfig {
    /// Partition names for the configured version.
    pub fn partitions(&self) -> PartitionSet {
        PartitionSet::new(self.cache_version.clone())
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - cache_version is non-empty and has no whitespace
    /// - max_pending_events > 0
    /// - drain_batch_size > 0
    /// - probe_interval and install_retry_interval are positive
    /// - probe_path and every shell asset start with `/`
    pub fn validate(&self) -> PlayerResult<()> {
        if self.cache_version.is_empty() || self.cache_version.contains(char::is_whitespace) {
            return Err(invalid(
                "cache_version",
                &self.cache_version,
                "cache_version must be a non-empty token without whitespace",
            ));
        }

        if self.max_pending_events == 0 {
            return Err(invalid(
                "max_pending_events",
                &self.max_pending_events.to_string(),
                "max_pending_events must be greater than 0",
            ));
        }

        if self.drain_batch_size == 0 {
            return Err(invalid(
                "drain_batch_size",
                &self.drain_batch_size.to_string(),
                "drain_batch_size must be greater than 0",
            ));
        }

        if self.probe_interval.is_zero() {
            return Err(invalid("probe_interval", "0s", "probe_interval must be positive"));
        }

        if self.install_retry_interval.is_zero() {
            return Err(invalid(
                "install_retry_interval",
                "0s",
                "install_retry_interval must be positive",
            ));
        }

        if !self.probe_path.starts_with('/') {
            return Err(invalid(
                "probe_path",
                &self.probe_path,
                "probe_path must be origin-relative",
            ));
        }

        if let Some(asset) = self.shell_assets.iter().find(|a| !a.starts_with('/')) {
            return Err(invalid(
                "shell_assets",
                asset,
                "shell assets must be origin-relative",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: &str, reason: &str) -> PlayerError {
    PlayerError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}
