//! Background Jobs for the Shabaka proxy
//!
//! Periodic tasks that run beside request handling:
//!
//! - `connectivity`: probes the player server while offline so queued play
//!   logs drain as soon as it is back
//! - `install_retry`: retries a failed version install until it succeeds
//!
//! # Usage
//!
//! ```ignore
//! use shabaka_proxy::jobs::{connectivity_probe_task, ProbeConfig};
//! use tokio::sync::watch;
//!
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(connectivity_probe_task(state, tracker, ProbeConfig::default(), shutdown_rx));
//!
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod connectivity;
pub mod install_retry;

pub use connectivity::{connectivity_probe_task, ProbeConfig, ProbeMetrics, ProbeSnapshot};
pub use install_retry::{
    install_retry_task, InstallRetryConfig, InstallRetryMetrics, InstallRetrySnapshot,
};
