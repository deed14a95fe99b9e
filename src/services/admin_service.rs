//! Controller operations behind the admin REST routes. Phase and settings
//! writes go through the broadcaster so it stays the single settings writer.

use std::time::{Duration, SystemTime};

use tracing::info;

use crate::{
    dto::admin::{
        AdminPlayer, PhaseResponse, PositionRequest, ResetResponse, SignalRequest,
        TickIntervalRequest, WriteResponse,
    },
    error::ServiceError,
    state::{SharedState, phase::Phase},
};

/// Start the countdown; `Playing` follows automatically.
pub async fn start_countdown(state: &SharedState) -> Result<PhaseResponse, ServiceError> {
    set_phase(state, Phase::Countdown).await
}

/// Skip the rest of the countdown.
pub async fn force_play(state: &SharedState) -> Result<PhaseResponse, ServiceError> {
    set_phase(state, Phase::Playing).await
}

/// End the round, keeping final scores.
pub async fn end_game(state: &SharedState) -> Result<PhaseResponse, ServiceError> {
    set_phase(state, Phase::Ended).await
}

async fn set_phase(state: &SharedState, phase: Phase) -> Result<PhaseResponse, ServiceError> {
    let phase = state.broadcaster().set_phase(phase).await?;
    info!(?phase, "controller changed phase");
    Ok(PhaseResponse { phase })
}

/// Fix the tick interval or go back to randomized ticks.
pub async fn set_tick_interval(
    state: &SharedState,
    request: TickIntervalRequest,
) -> Result<WriteResponse, ServiceError> {
    let interval = request.interval_ms.map(Duration::from_millis);
    let version = state.broadcaster().set_tick_interval(interval).await?;
    Ok(WriteResponse { version })
}

/// Override the signal until the next tick.
pub async fn set_signal(
    state: &SharedState,
    request: SignalRequest,
) -> Result<WriteResponse, ServiceError> {
    let version = state.broadcaster().set_signal(request.signal).await?;
    info!(signal = ?request.signal, "controller set the signal");
    Ok(WriteResponse { version })
}

/// Move the target until the next tick.
pub async fn set_position(
    state: &SharedState,
    request: PositionRequest,
) -> Result<WriteResponse, ServiceError> {
    let version = state
        .broadcaster()
        .set_position(request.x, request.y)
        .await?;
    Ok(WriteResponse { version })
}

/// Return to `Waiting` with every score at zero.
pub async fn reset(state: &SharedState) -> Result<ResetResponse, ServiceError> {
    let summary = state.broadcaster().reset_all().await?;
    info!(
        players_reset = summary.players_reset,
        total = summary.total_players,
        "game reset"
    );
    Ok(summary.into())
}

/// Every player with contact details, in registration order.
pub async fn list_players(state: &SharedState) -> Result<Vec<AdminPlayer>, ServiceError> {
    let players = state.store().list_players().await?;
    let now = SystemTime::now();
    let threshold = state.config().game.presence_threshold;
    Ok(players
        .into_iter()
        .map(|player| AdminPlayer::from_entity(player, now, threshold))
        .collect())
}
