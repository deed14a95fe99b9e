use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Tap Arena backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::spectator_stream,
        crate::routes::sse::controller_stream,
        crate::routes::websocket::ws_handler,
        crate::routes::player::register,
        crate::routes::player::login,
        crate::routes::public::get_leaderboard,
        crate::routes::public::get_settings,
        crate::routes::admin::start_countdown,
        crate::routes::admin::force_play,
        crate::routes::admin::end_game,
        crate::routes::admin::set_tick_interval,
        crate::routes::admin::set_signal,
        crate::routes::admin::set_position,
        crate::routes::admin::reset,
        crate::routes::admin::list_players,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::player::RegisterRequest,
            crate::dto::player::LoginRequest,
            crate::dto::player::JoinResponse,
            crate::dto::public::LeaderboardEntry,
            crate::dto::public::LeaderboardResponse,
            crate::dto::public::SettingsResponse,
            crate::dto::admin::TickIntervalRequest,
            crate::dto::admin::SignalRequest,
            crate::dto::admin::PositionRequest,
            crate::dto::admin::PhaseResponse,
            crate::dto::admin::WriteResponse,
            crate::dto::admin::ResetResponse,
            crate::dto::admin::AdminPlayer,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::PlayerOutboundMessage,
            crate::dto::sse::AdminHandshake,
            crate::dto::sse::SystemStatus,
            crate::dto::sse::SettingsChangedEvent,
            crate::dto::sse::LeaderboardEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "Registration, login and the player socket"),
        (name = "public", description = "Read-only data for the live screen"),
        (name = "admin", description = "Controller operations"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/players/register",
            "/players/login",
            "/ws/play",
            "/admin/tick-interval",
            "/admin/position",
            "/public/leaderboard",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
