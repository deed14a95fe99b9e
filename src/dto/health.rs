use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Player sessions currently attached over WebSocket.
    pub attached_sessions: usize,
    /// Store subscriptions currently open.
    pub store_subscriptions: usize,
}

impl HealthResponse {
    /// Create a health response indicating the system is operational.
    pub fn ok(attached_sessions: usize, store_subscriptions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            attached_sessions,
            store_subscriptions,
        }
    }

    /// Create a health response indicating the store is unreachable.
    pub fn degraded(attached_sessions: usize, store_subscriptions: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            attached_sessions,
            store_subscriptions,
        }
    }
}
