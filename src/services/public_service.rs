//! Read-only projections for the live screen.

use crate::{
    dto::public::{LeaderboardResponse, SettingsResponse},
    error::ServiceError,
    state::{SharedState, game::GameSettings, leaderboard::Leaderboard},
};

/// Top of the leaderboard as shown on the live screen.
pub async fn get_leaderboard(state: &SharedState) -> Result<LeaderboardResponse, ServiceError> {
    let players = state.store().list_players().await?;
    let leaderboard = Leaderboard::from_players(&players);
    Ok(LeaderboardResponse {
        entries: leaderboard
            .top(state.config().game.live_leaderboard_size)
            .into_iter()
            .map(Into::into)
            .collect(),
        total_players: leaderboard.len(),
    })
}

/// Current phase, signal and target position.
pub async fn get_settings(state: &SharedState) -> Result<SettingsResponse, ServiceError> {
    let settings = state.store().read_settings().await?;
    Ok(SettingsResponse::new(
        GameSettings::from(settings),
        state.is_degraded(),
    ))
}
