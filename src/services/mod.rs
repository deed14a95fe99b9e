use std::future;

use tokio::time::{Instant, sleep_until};

/// Controller-facing operations exposed to the admin routes.
pub mod admin_service;
/// Authoritative settings writer and phase owner.
pub mod broadcaster;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Join-link delivery after registration.
pub mod notifier;
/// Registration and login.
pub mod player_service;
/// Public service for read-only game information.
pub mod public_service;
/// Fan-out of store notifications onto the SSE hubs.
pub mod relay;
/// Presence check applied at registration and login.
pub mod session_guard;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Store health monitoring and degraded mode.
pub mod storage_supervisor;
/// Per-player state synchronization.
pub mod synchronizer;
/// WebSocket connection and message handling service.
pub mod websocket_service;

/// Sleep until `deadline`, or forever when there is none.
pub(crate) async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}
