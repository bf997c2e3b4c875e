//! Versioned cache partition naming.
//!
//! Every installed version of the proxy owns exactly three partitions. Their
//! names embed the version so that activation can tell current partitions
//! apart from superseded ones by name alone.

use serde::{Deserialize, Serialize};

/// Common prefix of every partition this subsystem creates.
pub const PARTITION_PREFIX: &str = "shabaka";

/// The three kinds of cache partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitionKind {
    /// Static application assets needed to boot the display offline.
    Shell,
    /// Binary playlist assets under the uploads namespace.
    Media,
    /// Small JSON API responses (the playlist).
    Api,
}

impl PartitionKind {
    pub const ALL: [PartitionKind; 3] = [PartitionKind::Shell, PartitionKind::Media, PartitionKind::Api];

    /// Label used inside the partition name.
    pub fn label(self) -> &'static str {
        match self {
            // The shell partition keeps the historical "player" label.
            PartitionKind::Shell => "player",
            PartitionKind::Media => "media",
            PartitionKind::Api => "api",
        }
    }
}

/// The partition names belonging to one installed version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionSet {
    version: String,
}

impl PartitionSet {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Full partition name for a kind, e.g. `shabaka-media-v1`.
    pub fn name(&self, kind: PartitionKind) -> String {
        format!("{}-{}-{}", PARTITION_PREFIX, kind.label(), self.version)
    }

    pub fn shell(&self) -> String {
        self.name(PartitionKind::Shell)
    }

    pub fn media(&self) -> String {
        self.name(PartitionKind::Media)
    }

    pub fn api(&self) -> String {
        self.name(PartitionKind::Api)
    }

    /// All three names of this version.
    pub fn names(&self) -> [String; 3] {
        PartitionKind::ALL.map(|kind| self.name(kind))
    }

    /// Whether `partition` is one of this version's three names.
    pub fn contains(&self, partition: &str) -> bool {
        PartitionKind::ALL
            .iter()
            .any(|kind| self.name(*kind) == partition)
    }

    /// Recover the version from a shell partition name.
    ///
    /// Returns `None` for names that are not shell partitions of this
    /// subsystem.
    pub fn version_from_shell_name(partition: &str) -> Option<&str> {
        let prefix = format!("{}-{}-", PARTITION_PREFIX, PartitionKind::Shell.label());
        partition
            .strip_prefix(prefix.as_str())
            .filter(|version| !version.is_empty())
    }
}
