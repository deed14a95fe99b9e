use crate::{
    dao::models::{GameSettingsEntity, SettingsChange},
    dto::sse::{LeaderboardEvent, LiveEvent, SettingsChangedEvent, SystemStatus},
    state::{SharedState, leaderboard::Leaderboard},
};

/// Publish the fields written by a settings change.
pub fn broadcast_settings_changed(state: &SharedState, change: &SettingsChange) {
    publish_everywhere(state, LiveEvent::Settings(SettingsChangedEvent::from(change)));
}

/// Publish the whole settings row, used after the relay missed notifications.
pub fn broadcast_settings_snapshot(state: &SharedState, settings: &GameSettingsEntity) {
    publish_everywhere(state, LiveEvent::Settings(SettingsChangedEvent::from(settings)));
}

/// Publish the ranking: the top rows to spectators, every row to the controller.
pub fn broadcast_leaderboard(state: &SharedState, leaderboard: &Leaderboard) {
    let total_players = leaderboard.len();
    let top = leaderboard.top(state.config().game.live_leaderboard_size);
    state
        .spectator_feed()
        .publish(LiveEvent::Leaderboard(LeaderboardEvent {
            entries: top.into_iter().map(Into::into).collect(),
            total_players,
        }));
    state
        .controller_feed()
        .publish(LiveEvent::Leaderboard(LeaderboardEvent {
            entries: leaderboard.ranked().into_iter().map(Into::into).collect(),
            total_players,
        }));
}

/// Publish the degraded flag on both streams.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    publish_everywhere(state, LiveEvent::Status(SystemStatus { degraded }));
}

fn publish_everywhere(state: &SharedState, event: LiveEvent) {
    state.controller_feed().publish(event.clone());
    state.spectator_feed().publish(event);
}
