use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{services::websocket_service, state::SharedState};

/// Query string of the player socket.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PlayQuery {
    /// Player returned by registration or login.
    pub player_id: Uuid,
}

#[utoipa::path(
    get,
    path = "/ws/play",
    tag = "players",
    params(PlayQuery),
    responses((status = 101, description = "Switching protocols to WebSocket"))
)]
/// Upgrade the HTTP connection into a player game session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Query(query): Query<PlayQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket, query.player_id))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws/play", get(ws_handler))
}
