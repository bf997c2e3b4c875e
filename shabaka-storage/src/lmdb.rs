//! Shared LMDB plumbing for the cache and queue backends.

use std::path::Path;

use heed::{Env, EnvOpenOptions};
use shabaka_core::{PlayerError, StorageError};

/// Error type for LMDB operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open a named database within the environment.
    #[error("Failed to open database {name}: {reason}")]
    DbOpen { name: String, reason: String },

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<heed::Error> for LmdbStoreError {
    fn from(e: heed::Error) -> Self {
        LmdbStoreError::Transaction(e.to_string())
    }
}

/// Convert LmdbStoreError to PlayerError.
impl From<LmdbStoreError> for PlayerError {
    fn from(e: LmdbStoreError) -> Self {
        PlayerError::Storage(StorageError::TransactionFailed {
            reason: e.to_string(),
        })
    }
}

/// Open (creating if needed) an LMDB environment directory.
pub(crate) fn open_env(
    path: &Path,
    max_size_mb: usize,
    max_dbs: u32,
) -> Result<Env, LmdbStoreError> {
    std::fs::create_dir_all(path)?;

    // SAFETY: each environment directory is opened once per process; the
    // backends own their Env for their whole lifetime.
    unsafe {
        EnvOpenOptions::new()
            .map_size(max_size_mb * 1024 * 1024)
            .max_dbs(max_dbs)
            .open(path)
    }
    .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))
}
