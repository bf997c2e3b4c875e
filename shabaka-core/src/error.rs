//! Error types for Shabaka offline operations

use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Partition not found: {partition}")]
    PartitionNotFound { partition: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Encoding failed for {key}: {reason}")]
    EncodingFailed { key: String, reason: String },

    #[error("Decoding failed for {key}: {reason}")]
    DecodingFailed { key: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Failures talking to the upstream player server.
///
/// Only transport-level failures live here. An upstream that answers with a
/// non-2xx status is still a delivered response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Upstream unreachable for {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Upstream timed out for {url}")]
    TimedOut { url: String },

    #[error("Failed to read upstream body for {url}: {reason}")]
    BodyRead { url: String, reason: String },

    #[error("Invalid upstream request for {url}: {reason}")]
    InvalidRequest { url: String, reason: String },
}

/// Install / activate errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("Install of {version} failed on asset {asset}: {reason}")]
    InstallFailed {
        version: String,
        asset: String,
        reason: String,
    },

    #[error("Version {version} is not installed")]
    NotInstalled { version: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Control protocol errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("Malformed control message: {reason}")]
    Malformed { reason: String },

    #[error("Control service is not running")]
    ServiceStopped,
}

/// Master error type for all Shabaka errors.
#[derive(Debug, Clone, Error)]
pub enum PlayerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),
}

/// Result type alias for Shabaka operations.
pub type PlayerResult<T> = Result<T, PlayerError>;

// =============================================================================
// TESTS
// =============================================================================
