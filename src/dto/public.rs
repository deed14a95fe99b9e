use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::{
    game::{GameSettings, Position, Signal},
    leaderboard::Standing,
    phase::Phase,
};

/// One leaderboard row as rendered by the screens.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: Uuid,
    pub display_name: String,
    pub score: i64,
    /// Set for scores below zero, which the screens highlight.
    pub negative: bool,
}

impl From<Standing> for LeaderboardEntry {
    fn from(standing: Standing) -> Self {
        Self {
            rank: standing.rank,
            player_id: standing.player_id,
            display_name: standing.display_name,
            score: standing.score,
            negative: standing.score < 0,
        }
    }
}

/// Response of `GET /public/leaderboard`.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntry>,
    pub total_players: usize,
}

/// Current settings as seen by spectators.
#[derive(Debug, Serialize, ToSchema)]
pub struct SettingsResponse {
    pub phase: Phase,
    pub signal: Signal,
    pub position: Position,
    /// Fixed tick interval, `null` when ticks are randomized.
    pub tick_interval_ms: Option<u64>,
    pub degraded: bool,
}

impl SettingsResponse {
    pub fn new(settings: GameSettings, degraded: bool) -> Self {
        Self {
            phase: settings.phase,
            signal: settings.signal,
            position: settings.position,
            tick_interval_ms: settings
                .tick_interval
                .map(|interval| interval.as_millis() as u64),
            degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_scores_are_flagged() {
        let entry = LeaderboardEntry::from(Standing {
            rank: 3,
            player_id: Uuid::nil(),
            display_name: "bo".into(),
            score: -3,
        });
        assert!(entry.negative);
        assert_eq!(entry.rank, 3);
    }
}
