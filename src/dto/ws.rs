use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::public::LeaderboardEntry,
    services::synchronizer::ClientView,
    state::{
        game::{Position, Signal},
        ledger::TapOutcome,
        phase::Phase,
    },
};

#[derive(Debug, Deserialize, Serialize, ToSchema)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type")]
pub enum PlayerInboundMessage {
    #[serde(rename = "tap")]
    Tap,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, ToSchema)]
/// Frames pushed to player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerOutboundMessage {
    /// Full screen state, sent on attach and on every change.
    View(ViewFrame),
    /// Answer to a tap.
    TapResult(TapResultFrame),
    /// Problem with the last inbound frame.
    Error { message: String },
}

#[derive(Debug, Serialize, ToSchema)]
/// Everything a player screen renders.
pub struct ViewFrame {
    pub player_id: Uuid,
    pub display_name: String,
    pub phase: Phase,
    pub signal: Signal,
    pub position: Position,
    pub countdown: u8,
    pub score: i64,
    pub syncing: bool,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl From<ClientView> for ViewFrame {
    fn from(view: ClientView) -> Self {
        Self {
            player_id: view.player_id,
            display_name: view.display_name,
            phase: view.phase,
            signal: view.signal,
            position: view.position,
            countdown: view.countdown,
            score: view.score,
            syncing: view.syncing,
            leaderboard: view.leaderboard.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Whether a tap counted, and the resulting local score.
pub struct TapResultFrame {
    pub applied: bool,
    /// +1 or -3 when applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    /// Phase that caused the tap to be ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignored_in: Option<Phase>,
}

impl From<TapOutcome> for TapResultFrame {
    fn from(outcome: TapOutcome) -> Self {
        match outcome {
            TapOutcome::Applied { delta, score, .. } => Self {
                applied: true,
                delta: Some(delta),
                score: Some(score),
                ignored_in: None,
            },
            TapOutcome::Ignored { phase } => Self {
                applied: false,
                delta: None,
                score: None,
                ignored_in: Some(phase),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_frames_do_not_fail_to_parse() {
        let tap: PlayerInboundMessage = serde_json::from_str(r#"{"type":"tap"}"#).unwrap();
        assert!(matches!(tap, PlayerInboundMessage::Tap));
        let other: PlayerInboundMessage = serde_json::from_str(r#"{"type":"wave"}"#).unwrap();
        assert!(matches!(other, PlayerInboundMessage::Unknown));
    }

    #[test]
    fn ignored_tap_reports_the_phase() {
        let frame = PlayerOutboundMessage::TapResult(
            TapOutcome::Ignored {
                phase: Phase::Countdown,
            }
            .into(),
        );
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "tap_result");
        assert_eq!(value["applied"], false);
        assert_eq!(value["ignored_in"], "countdown");
        assert!(value.get("score").is_none());
    }
}
