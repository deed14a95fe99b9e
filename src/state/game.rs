use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{dao::models::GameSettingsEntity, state::phase::Phase};

/// Toggling signal that decides the sign of a tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    /// Taps score +1.
    Active,
    /// Taps score -3.
    #[default]
    Inactive,
}

/// Shared on-screen target position, centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Position {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
}

impl Position {
    /// Resting position of the target.
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    /// Build a position from its coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Plain view of the settings singleton, without per-field versions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GameSettings {
    /// Global phase.
    pub phase: Phase,
    /// Current signal.
    pub signal: Signal,
    /// Current target position.
    pub position: Position,
    /// Fixed tick interval, if configured.
    pub tick_interval: Option<Duration>,
}

impl From<&GameSettingsEntity> for GameSettings {
    fn from(value: &GameSettingsEntity) -> Self {
        Self {
            phase: value.phase.value,
            signal: value.signal.value,
            position: value.position.value,
            tick_interval: value.tick_interval_ms.value.map(Duration::from_millis),
        }
    }
}

impl From<GameSettingsEntity> for GameSettings {
    fn from(value: GameSettingsEntity) -> Self {
        (&value).into()
    }
}

/// Score delta produced by a tap, if the tap counts at all.
pub fn tap_delta(phase: Phase, signal: Signal) -> Option<i64> {
    match (phase, signal) {
        (Phase::Playing, Signal::Active) => Some(1),
        (Phase::Playing, Signal::Inactive) => Some(-3),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taps_only_score_while_playing() {
        assert_eq!(tap_delta(Phase::Playing, Signal::Active), Some(1));
        assert_eq!(tap_delta(Phase::Playing, Signal::Inactive), Some(-3));
        for phase in [Phase::Waiting, Phase::Countdown, Phase::Ended] {
            assert_eq!(tap_delta(phase, Signal::Active), None);
            assert_eq!(tap_delta(phase, Signal::Inactive), None);
        }
    }
}
