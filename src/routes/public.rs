use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::public::{LeaderboardResponse, SettingsResponse},
    error::AppError,
    services::public_service,
    state::SharedState,
};

/// Read-only endpoints for the live screen.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/leaderboard", get(get_leaderboard))
        .route("/public/settings", get(get_settings))
}

/// Top of the leaderboard.
#[utoipa::path(
    get,
    path = "/public/leaderboard",
    tag = "public",
    responses((status = 200, description = "Ranked players", body = LeaderboardResponse))
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(public_service::get_leaderboard(&state).await?))
}

/// Current phase, signal and target position.
#[utoipa::path(
    get,
    path = "/public/settings",
    tag = "public",
    responses((status = 200, description = "Current settings", body = SettingsResponse))
)]
pub async fn get_settings(
    State(state): State<SharedState>,
) -> Result<Json<SettingsResponse>, AppError> {
    Ok(Json(public_service::get_settings(&state).await?))
}
