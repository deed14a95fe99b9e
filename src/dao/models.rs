use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    game::{Position, Signal},
    phase::Phase,
};

/// Store-wide monotonic write counter value.
pub type Version = u64;

/// A field value tagged with the store version that last wrote it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Current value.
    pub value: T,
    /// Version of the write that produced `value`.
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Wrap a value written at `version`.
    pub fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }
}

/// Singleton settings row, one version per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettingsEntity {
    /// Global game phase.
    pub phase: Versioned<Phase>,
    /// Tap scoring signal.
    pub signal: Versioned<Signal>,
    /// Shared target position.
    pub position: Versioned<Position>,
    /// Fixed broadcaster tick interval; `None` selects the randomized draw.
    pub tick_interval_ms: Versioned<Option<u64>>,
}

impl Default for GameSettingsEntity {
    fn default() -> Self {
        Self {
            phase: Versioned::new(Phase::Waiting, 0),
            signal: Versioned::new(Signal::Inactive, 0),
            position: Versioned::new(Position::ORIGIN, 0),
            tick_interval_ms: Versioned::new(None, 0),
        }
    }
}

impl GameSettingsEntity {
    /// Highest version among all fields.
    pub fn version(&self) -> Version {
        self.phase
            .version
            .max(self.signal.version)
            .max(self.position.version)
            .max(self.tick_interval_ms.version)
    }

    /// Overwrite the fields present in `patch`, stamping them with `version`.
    pub fn apply(&mut self, patch: &SettingsPatch, version: Version) {
        if let Some(phase) = patch.phase {
            self.phase = Versioned::new(phase, version);
        }
        if let Some(signal) = patch.signal {
            self.signal = Versioned::new(signal, version);
        }
        if let Some(position) = patch.position {
            self.position = Versioned::new(position, version);
        }
        if let Some(interval) = patch.tick_interval_ms {
            self.tick_interval_ms = Versioned::new(interval, version);
        }
    }
}

/// Partial settings write; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    /// New phase.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// New signal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
    /// New target position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// New tick interval (`Some(None)` clears the fixed interval).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_interval_ms: Option<Option<u64>>,
}

impl SettingsPatch {
    /// Patch touching only the phase.
    pub fn phase(phase: Phase) -> Self {
        Self {
            phase: Some(phase),
            ..Self::default()
        }
    }

    /// Patch parking the signal and the target (inactive, at the origin).
    pub fn parked() -> Self {
        Self {
            signal: Some(Signal::Inactive),
            position: Some(Position::ORIGIN),
            ..Self::default()
        }
    }

    /// Combine with `other`, letting its fields win.
    pub fn with(mut self, other: SettingsPatch) -> Self {
        if other.phase.is_some() {
            self.phase = other.phase;
        }
        if other.signal.is_some() {
            self.signal = other.signal;
        }
        if other.position.is_some() {
            self.position = other.position;
        }
        if other.tick_interval_ms.is_some() {
            self.tick_interval_ms = other.tick_interval_ms;
        }
        self
    }

    /// Whether the patch writes nothing.
    pub fn is_empty(&self) -> bool {
        self.phase.is_none()
            && self.signal.is_none()
            && self.position.is_none()
            && self.tick_interval_ms.is_none()
    }
}

/// Notification payload for a settings write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettingsChange {
    /// Version stamped on every field of `patch`.
    pub version: Version,
    /// Fields written by this change.
    pub patch: SettingsPatch,
}

/// Player record stored and shared across layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntity {
    /// Stable identity.
    pub id: Uuid,
    /// Nickname shown on leaderboards.
    pub display_name: String,
    /// Unique contact email (normalized to lowercase).
    pub email: String,
    /// Optional phone number captured at registration.
    pub phone: Option<String>,
    /// Optional legal name, shown to the controller only.
    pub full_name: Option<String>,
    /// Current score; negative values are valid.
    pub score: i64,
    /// Last heartbeat from an attached client.
    pub last_seen_at: Option<SystemTime>,
    /// Registration timestamp.
    pub registered_at: SystemTime,
    /// Insertion order, used as the leaderboard tie-break.
    pub registration_seq: u64,
    /// Version of the last write to this record.
    pub version: Version,
}

/// Fields required to insert a new player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlayer {
    /// Nickname.
    pub display_name: String,
    /// Contact email.
    pub email: String,
    /// Optional phone number.
    pub phone: Option<String>,
    /// Optional legal name.
    pub full_name: Option<String>,
}

/// Partial player write carrying absolute values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerPatch {
    /// New score.
    pub score: Option<i64>,
    /// New heartbeat timestamp; never moves the stored value backwards.
    pub last_seen_at: Option<SystemTime>,
}

impl PlayerPatch {
    /// Patch writing only the score.
    pub fn score(score: i64) -> Self {
        Self {
            score: Some(score),
            last_seen_at: None,
        }
    }

    /// Patch writing only the heartbeat.
    pub fn seen(at: SystemTime) -> Self {
        Self {
            score: None,
            last_seen_at: Some(at),
        }
    }

    /// Coalesce with a later patch; later values win, heartbeat keeps the maximum.
    pub fn merge(self, later: PlayerPatch) -> Self {
        Self {
            score: later.score.or(self.score),
            last_seen_at: match (self.last_seen_at, later.last_seen_at) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => b.or(a),
            },
        }
    }
}

/// Change notification emitted by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// Partial settings write.
    Settings(SettingsChange),
    /// Full player record after an insert or update.
    Player(PlayerEntity),
}
