use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dao::models::PlayerEntity,
    dto::format_system_time,
    services::broadcaster::ResetSummary,
    state::{game::Signal, phase::Phase},
};

/// Payload of `PUT /admin/tick-interval`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct TickIntervalRequest {
    /// Fixed interval in milliseconds; `null` restores randomized ticks.
    pub interval_ms: Option<u64>,
}

/// Payload of `PUT /admin/signal`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SignalRequest {
    pub signal: Signal,
}

/// Payload of `PUT /admin/position`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PositionRequest {
    pub x: f64,
    pub y: f64,
}

/// Phase reached by a controller command.
#[derive(Debug, Serialize, ToSchema)]
pub struct PhaseResponse {
    pub phase: Phase,
}

/// Acknowledgement of a settings write.
#[derive(Debug, Serialize, ToSchema)]
pub struct WriteResponse {
    /// Store version of the write.
    pub version: u64,
}

/// Outcome of `POST /admin/reset`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    pub phase: Phase,
    pub players_reset: usize,
    pub total_players: usize,
}

impl From<ResetSummary> for ResetResponse {
    fn from(summary: ResetSummary) -> Self {
        Self {
            phase: summary.phase,
            players_reset: summary.players_reset,
            total_players: summary.total_players,
        }
    }
}

/// Full player record shown to the controller.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminPlayer {
    pub id: Uuid,
    pub display_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub score: i64,
    /// RFC 3339 timestamp of the last heartbeat.
    pub last_seen_at: Option<String>,
    /// RFC 3339 registration timestamp.
    pub registered_at: String,
    /// Whether a heartbeat arrived within the presence threshold.
    pub online: bool,
}

impl AdminPlayer {
    /// Project `player`, judging presence against `now` and `threshold`.
    pub fn from_entity(
        player: PlayerEntity,
        now: SystemTime,
        threshold: std::time::Duration,
    ) -> Self {
        let online = player.last_seen_at.is_some_and(|seen| {
            now.duration_since(seen)
                .map_or(true, |age| age < threshold)
        });
        Self {
            id: player.id,
            display_name: player.display_name,
            email: player.email,
            phone: player.phone,
            full_name: player.full_name,
            score: player.score,
            last_seen_at: player.last_seen_at.map(format_system_time),
            registered_at: format_system_time(player.registered_at),
            online,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn presence_follows_the_threshold() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let player = |seen: Option<SystemTime>| PlayerEntity {
            id: Uuid::nil(),
            display_name: "ana".into(),
            email: "ana@example.com".into(),
            phone: None,
            full_name: None,
            score: 4,
            last_seen_at: seen,
            registered_at: SystemTime::UNIX_EPOCH,
            registration_seq: 0,
            version: 2,
        };
        let threshold = Duration::from_secs(20);

        assert!(AdminPlayer::from_entity(player(Some(now - Duration::from_secs(3))), now, threshold).online);
        assert!(!AdminPlayer::from_entity(player(Some(now - Duration::from_secs(30))), now, threshold).online);

        let never = AdminPlayer::from_entity(player(None), now, threshold);
        assert!(!never.online);
        assert_eq!(never.registered_at, "1970-01-01T00:00:00Z");
    }
}
