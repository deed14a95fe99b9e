use axum::{Router, extract::State, routing::get};

use crate::{
    error::AppError,
    services::sse_service::{self, LiveSse},
    state::SharedState,
};

/// Live screen feed; opens with the current status, settings and leaderboard.
#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    responses((
        status = 200,
        description = "`system.status`, `settings.changed` and `leaderboard` events",
        content_type = "text/event-stream",
        body = String
    ))
)]
pub async fn spectator_stream(State(state): State<SharedState>) -> LiveSse {
    sse_service::spectator_stream(state)
}

/// Controller feed; the first `admin_token` event authorizes the admin routes.
#[utoipa::path(
    get,
    path = "/sse/admin",
    tag = "sse",
    responses(
        (
            status = 200,
            description = "`admin_token`, then the full leaderboard, settings and status events",
            content_type = "text/event-stream",
            body = String
        ),
        (status = 401, description = "Another controller stream is open")
    )
)]
pub async fn controller_stream(State(state): State<SharedState>) -> Result<LiveSse, AppError> {
    Ok(sse_service::controller_stream(state)?)
}

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/sse/public", get(spectator_stream))
        .route("/sse/admin", get(controller_stream))
}
