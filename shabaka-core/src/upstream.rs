//! The network seam between the proxy and the player server.

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::exchange::{InterceptedRequest, PlayerResponse};

/// Sends requests to the upstream player server.
///
/// `Err` means the request never produced a response (transport failure).
/// Any HTTP status, including 4xx and 5xx, comes back as `Ok`.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn send(&self, request: &InterceptedRequest) -> Result<PlayerResponse, UpstreamError>;

    /// Origin of the upstream server, e.g. `http://127.0.0.1:5000`.
    fn origin(&self) -> &str;
}
