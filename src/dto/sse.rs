use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dao::models::{GameSettingsEntity, SettingsChange, Version},
    dto::public::LeaderboardEntry,
    state::{
        game::{Position, Signal},
        phase::Phase,
    },
};

/// Event fanned out to the live screen or the controller stream.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// `settings.changed`
    Settings(SettingsChangedEvent),
    /// `leaderboard`
    Leaderboard(LeaderboardEvent),
    /// `system.status`
    Status(SystemStatus),
}

impl LiveEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            LiveEvent::Settings(_) => "settings.changed",
            LiveEvent::Leaderboard(_) => "leaderboard",
            LiveEvent::Status(_) => "system.status",
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// First event of the controller stream; the token authorizes admin requests.
pub struct AdminHandshake {
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    pub degraded: bool,
}

/// Fields written by one settings change; absent fields were not touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct SettingsChangedEvent {
    pub version: Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Present when the tick interval changed; `null` means randomized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tick_interval_ms: Option<Option<u64>>,
}

impl SettingsChangedEvent {
    /// Fold the next change, in publication order, into this one.
    pub fn absorb(&mut self, later: &SettingsChangedEvent) {
        self.version = self.version.max(later.version);
        if later.phase.is_some() {
            self.phase = later.phase;
        }
        if later.signal.is_some() {
            self.signal = later.signal;
        }
        if later.position.is_some() {
            self.position = later.position;
        }
        if later.tick_interval_ms.is_some() {
            self.tick_interval_ms = later.tick_interval_ms;
        }
    }
}

impl From<&SettingsChange> for SettingsChangedEvent {
    fn from(change: &SettingsChange) -> Self {
        Self {
            version: change.version,
            phase: change.patch.phase,
            signal: change.patch.signal,
            position: change.patch.position,
            tick_interval_ms: change.patch.tick_interval_ms,
        }
    }
}

impl From<&GameSettingsEntity> for SettingsChangedEvent {
    /// Every field at once, used after a resync.
    fn from(settings: &GameSettingsEntity) -> Self {
        Self {
            version: settings.version(),
            phase: Some(settings.phase.value),
            signal: Some(settings.signal.value),
            position: Some(settings.position.value),
            tick_interval_ms: Some(settings.tick_interval_ms.value),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
/// Ranked rows pushed whenever a player record changes.
pub struct LeaderboardEvent {
    pub entries: Vec<LeaderboardEntry>,
    pub total_players: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::SettingsPatch;

    #[test]
    fn settings_event_only_carries_written_fields() {
        let change = SettingsChange {
            version: 9,
            patch: SettingsPatch::phase(Phase::Ended).with(SettingsPatch::parked()),
        };
        let value = serde_json::to_value(SettingsChangedEvent::from(&change)).unwrap();

        assert_eq!(value["version"], 9);
        assert_eq!(value["phase"], "ended");
        assert_eq!(value["signal"], "inactive");
        assert_eq!(value["position"]["x"], 0.0);
        assert!(value.get("tick_interval_ms").is_none());
    }

    #[test]
    fn absorb_overwrites_only_written_fields() {
        let mut folded = SettingsChangedEvent {
            version: 4,
            phase: Some(Phase::Playing),
            signal: Some(Signal::Inactive),
            ..SettingsChangedEvent::default()
        };
        folded.absorb(&SettingsChangedEvent {
            version: 6,
            signal: Some(Signal::Active),
            ..SettingsChangedEvent::default()
        });
        folded.absorb(&SettingsChangedEvent {
            version: 7,
            tick_interval_ms: Some(None),
            ..SettingsChangedEvent::default()
        });

        assert_eq!(folded.version, 7);
        assert_eq!(folded.phase, Some(Phase::Playing));
        assert_eq!(folded.signal, Some(Signal::Active));
        assert_eq!(folded.tick_interval_ms, Some(None));
    }
}
