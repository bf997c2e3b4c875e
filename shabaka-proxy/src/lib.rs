//! Shabaka Offline Proxy
//!
//! A local HTTP proxy that sits between a kiosk display and its player
//! server. It keeps the display playing its assigned media and reporting
//! play events while the server is unreachable:
//!
//! - shell assets are installed per version and served offline
//! - media is served cache-first and refreshed in the background
//! - playlists are network-first with the last good copy as fallback
//! - failed play logs are queued durably and replayed in order
//!
//! Display traffic is classified by [`router::RouteKind`] and handled by one
//! of four strategies in [`handlers`]. Administrative requests use the
//! [`control`] protocol under the reserved `/__offline` prefix.

pub mod background;
pub mod config;
pub mod constants;
pub mod control;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod lifecycle;
pub mod precache;
pub mod router;
pub mod runtime;
pub mod server;
pub mod session;
pub mod state;
pub mod sync;
pub mod telemetry;
pub mod upstream;

pub use background::BackgroundTasks;
pub use config::ProxyConfig;
pub use control::{
    signal_channel, signal_listener_task, ControlHandle, ControlMessage, ControlReply,
    ControlService, SyncSignal,
};
pub use error::{ErrorCode, ProxyError, ProxyResult};
pub use lifecycle::{BootstrapOutcome, LifecycleManager};
pub use precache::{MediaPrecacher, PrecacheReport};
pub use router::{RequestRouter, RouteKind, TelemetryKind};
pub use server::{create_router, AppState, HealthResponse};
pub use session::SessionHeaders;
pub use state::{ActivePartitions, ProxyState};
pub use sync::{DrainReport, SyncCoordinator};
pub use upstream::{ConnectivityTracker, HttpUpstream, ObservedUpstream};
