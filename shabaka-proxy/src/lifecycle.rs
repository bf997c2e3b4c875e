//! Version install, activation, and startup bootstrap.
//!
//! Install fills the shell partition of a version with every boot asset, all
//! or nothing. Activation drops every partition of other versions and points
//! the router at the new set.

use chrono::{DateTime, Utc};
use shabaka_core::{CacheEntry, LifecycleError, PartitionSet, PlayerError, PlayerResult};

use crate::state::ProxyState;

/// How startup ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The configured version was already installed.
    Activated { version: String },
    /// The configured version was installed now.
    Installed { version: String },
    /// Install failed; `serving` is the older version still in use, if any.
    Fallback {
        serving: Option<String>,
        pending: String,
    },
}

impl BootstrapOutcome {
    pub fn needs_retry(&self) -> bool {
        matches!(self, BootstrapOutcome::Fallback { .. })
    }
}

#[derive(Clone)]
pub struct LifecycleManager {
    state: ProxyState,
}

impl LifecycleManager {
    pub fn new(state: ProxyState) -> Self {
        Self { state }
    }

    /// Capture every shell asset of `set`.
    ///
    /// All assets are fetched before anything is written, so a failed
    /// install leaves no partial shell partition behind.
    pub async fn install(&self, set: &PartitionSet) -> PlayerResult<usize> {
        let mut entries = Vec::with_capacity(self.state.config.shell_assets.len());

        for asset in &self.state.config.shell_assets {
            let failed = |reason: String| LifecycleError::InstallFailed {
                version: set.version().to_string(),
                asset: asset.clone(),
                reason,
            };
            let response = self
                .state
                .background_get(asset)
                .await
                .map_err(|e| failed(e.to_string()))?;
            if !response.is_cacheable() {
                return Err(failed(format!("HTTP {}", response.status)).into());
            }
            entries.push(CacheEntry::from_response(asset.clone(), &response));
        }

        self.state.cache.put_many(&set.shell(), &entries).await?;
        tracing::info!(version = set.version(), assets = entries.len(), "Shell installed");
        Ok(entries.len())
    }

    /// Make `set` the active version and drop every other partition.
    ///
    /// Returns the names of the dropped partitions.
    pub async fn activate(&self, set: PartitionSet) -> PlayerResult<Vec<String>> {
        let mut dropped = Vec::new();
        for partition in self.state.cache.partitions().await? {
            if set.contains(&partition) {
                continue;
            }
            let removed = self.state.cache.drop_partition(&partition).await?;
            tracing::info!(partition = %partition, removed, "Dropped superseded partition");
            dropped.push(partition);
        }

        tracing::info!(version = set.version(), "Version activated");
        self.state.partitions.replace(set);
        Ok(dropped)
    }

    /// The most recently installed version other than `exclude`, if any.
    ///
    /// Recency is the creation time of each version's shell partition.
    pub async fn previous_version(&self, exclude: &str) -> PlayerResult<Option<String>> {
        let mut newest: Option<(DateTime<Utc>, String)> = None;
        for name in self.state.cache.partitions().await? {
            let Some(version) = PartitionSet::version_from_shell_name(&name) else {
                continue;
            };
            if version == exclude {
                continue;
            }
            let Some(created_at) = self.state.cache.partition_created_at(&name).await? else {
                continue;
            };
            if newest.as_ref().map_or(true, |(seen, _)| created_at > *seen) {
                newest = Some((created_at, version.to_string()));
            }
        }
        Ok(newest.map(|(_, version)| version))
    }

    /// Bring the configured version into service.
    ///
    /// Storage failures are fatal. Install failures fall back to an older
    /// installed version, left untouched, until a retry succeeds.
    pub async fn bootstrap(&self) -> PlayerResult<BootstrapOutcome> {
        let target = self.state.config.partitions();
        let version = target.version().to_string();

        if self.state.cache.has_partition(&target.shell()).await? {
            self.activate(target).await?;
            return Ok(BootstrapOutcome::Activated { version });
        }

        match self.install(&target).await {
            Ok(_) => {
                self.activate(target).await?;
                Ok(BootstrapOutcome::Installed { version })
            }
            Err(e @ (PlayerError::Lifecycle(_) | PlayerError::Upstream(_))) => {
                let serving = self.previous_version(&version).await?;
                tracing::warn!(
                    error = %e,
                    pending = %version,
                    serving = ?serving,
                    "Install failed, keeping previous version"
                );
                if let Some(previous) = &serving {
                    self.state.partitions.replace(PartitionSet::new(previous.clone()));
                }
                Ok(BootstrapOutcome::Fallback {
                    serving,
                    pending: version,
                })
            }
            Err(e) => Err(e),
        }
    }
}
