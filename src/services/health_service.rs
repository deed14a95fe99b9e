use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report store reachability together with live session counts.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let store = state.store();
    let reachable = match store.health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            false
        }
    };

    let attached = state.sessions().len();
    let subscriptions = store.active_subscriptions();

    if reachable && !state.is_degraded() {
        HealthResponse::ok(attached, subscriptions)
    } else {
        HealthResponse::degraded(attached, subscriptions)
    }
}
