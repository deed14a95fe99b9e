use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use axum_valid::Valid;

use crate::{
    dto::player::{JoinResponse, LoginRequest, RegisterRequest},
    error::AppError,
    services::player_service,
    state::SharedState,
};

/// Registration and login endpoints used by the player front end.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players/register", post(register))
        .route("/players/login", post(login))
}

/// Register a new player and email them their join link.
#[utoipa::path(
    post,
    path = "/players/register",
    tag = "players",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Player registered", body = JoinResponse),
        (status = 400, description = "Invalid registration form"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RegisterRequest>>,
) -> Result<(StatusCode, Json<JoinResponse>), AppError> {
    let joined = player_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(joined)))
}

/// Resume a registered player by email.
#[utoipa::path(
    post,
    path = "/players/login",
    tag = "players",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Player found", body = JoinResponse),
        (status = 404, description = "Email not registered"),
        (status = 423, description = "Player active on another device")
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<LoginRequest>>,
) -> Result<Json<JoinResponse>, AppError> {
    Ok(Json(player_service::login(&state, payload).await?))
}
