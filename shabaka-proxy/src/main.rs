//! Shabaka Offline Proxy Entry Point
//!
//! Reads configuration from the environment and serves the display until
//! interrupted.

use shabaka_proxy::telemetry::{init_tracing, TelemetryConfig};
use shabaka_proxy::{runtime, ProxyConfig, ProxyResult};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ProxyResult<()> {
    let telemetry_config = TelemetryConfig::from_env();
    init_tracing(&telemetry_config)?;

    let config = ProxyConfig::from_env()?;
    runtime::run(config).await
}
