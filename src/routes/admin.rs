use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};

use crate::{
    dto::admin::{
        AdminPlayer, PhaseResponse, PositionRequest, ResetResponse, SignalRequest,
        TickIntervalRequest, WriteResponse,
    },
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Controller endpoints driving the round.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/phase/countdown", post(start_countdown))
        .route("/admin/phase/play", post(force_play))
        .route("/admin/phase/end", post(end_game))
        .route("/admin/tick-interval", put(set_tick_interval))
        .route("/admin/signal", put(set_signal))
        .route("/admin/position", put(set_position))
        .route("/admin/reset", post(reset))
        .route("/admin/players", get(list_players))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Start the countdown from the lobby.
#[utoipa::path(
    post,
    path = "/admin/phase/countdown",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Countdown started", body = PhaseResponse),
        (status = 409, description = "Not in the lobby")
    )
)]
pub async fn start_countdown(
    State(state): State<SharedState>,
) -> Result<Json<PhaseResponse>, AppError> {
    Ok(Json(admin_service::start_countdown(&state).await?))
}

/// Skip the rest of the countdown.
#[utoipa::path(
    post,
    path = "/admin/phase/play",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Round started", body = PhaseResponse),
        (status = 409, description = "No countdown running")
    )
)]
pub async fn force_play(State(state): State<SharedState>) -> Result<Json<PhaseResponse>, AppError> {
    Ok(Json(admin_service::force_play(&state).await?))
}

/// End the round, keeping final scores.
#[utoipa::path(
    post,
    path = "/admin/phase/end",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Round ended", body = PhaseResponse),
        (status = 409, description = "No round running")
    )
)]
pub async fn end_game(State(state): State<SharedState>) -> Result<Json<PhaseResponse>, AppError> {
    Ok(Json(admin_service::end_game(&state).await?))
}

/// Fix the broadcaster tick interval, or clear it to randomize ticks.
#[utoipa::path(
    put,
    path = "/admin/tick-interval",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = TickIntervalRequest,
    responses(
        (status = 200, description = "Interval stored", body = WriteResponse),
        (status = 400, description = "Interval out of range")
    )
)]
pub async fn set_tick_interval(
    State(state): State<SharedState>,
    Json(payload): Json<TickIntervalRequest>,
) -> Result<Json<WriteResponse>, AppError> {
    Ok(Json(admin_service::set_tick_interval(&state, payload).await?))
}

/// Override the signal; the next tick draws a new one.
#[utoipa::path(
    put,
    path = "/admin/signal",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = SignalRequest,
    responses((status = 200, description = "Signal stored", body = WriteResponse))
)]
pub async fn set_signal(
    State(state): State<SharedState>,
    Json(payload): Json<SignalRequest>,
) -> Result<Json<WriteResponse>, AppError> {
    Ok(Json(admin_service::set_signal(&state, payload).await?))
}

/// Move the target; the next spatial tick draws a new position.
#[utoipa::path(
    put,
    path = "/admin/position",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = PositionRequest,
    responses(
        (status = 200, description = "Position stored", body = WriteResponse),
        (status = 400, description = "Coordinates are not finite")
    )
)]
pub async fn set_position(
    State(state): State<SharedState>,
    Json(payload): Json<PositionRequest>,
) -> Result<Json<WriteResponse>, AppError> {
    Ok(Json(admin_service::set_position(&state, payload).await?))
}

/// Back to the lobby with every score at zero.
#[utoipa::path(
    post,
    path = "/admin/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Game reset", body = ResetResponse),
        (status = 503, description = "Some scores could not be reset; retry")
    )
)]
pub async fn reset(State(state): State<SharedState>) -> Result<Json<ResetResponse>, AppError> {
    Ok(Json(admin_service::reset(&state).await?))
}

/// Every registered player with contact details.
#[utoipa::path(
    get,
    path = "/admin/players",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Registered players", body = [AdminPlayer]))
)]
pub async fn list_players(
    State(state): State<SharedState>,
) -> Result<Json<Vec<AdminPlayer>>, AppError> {
    Ok(Json(admin_service::list_players(&state).await?))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let seat = state.controller_seat();
    if seat.admits(&provided) {
        Ok(next.run(req).await)
    } else if seat.is_taken() {
        Err(AppError::Unauthorized("invalid admin token".into()))
    } else {
        Err(AppError::Unauthorized(
            "no controller stream open; connect to /sse/admin first".into(),
        ))
    }
}
