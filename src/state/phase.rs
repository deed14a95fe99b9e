use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Global phases shared by the controller and every viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Lobby: players register and read the rules.
    #[default]
    Waiting,
    /// Fixed-length countdown before play starts.
    Countdown,
    /// Taps are scored against the live signal.
    Playing,
    /// Final scores are frozen until an administrative reset.
    Ended,
}

/// Events that move the phase machine along its edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEvent {
    /// Controller starts the countdown from the lobby.
    StartCountdown,
    /// The scheduled countdown delay has elapsed.
    CountdownElapsed,
    /// Controller skips the remaining countdown.
    ForcePlay,
    /// Controller stops the running game.
    Stop,
    /// Administrative reset back to the lobby.
    Reset,
}

impl Phase {
    /// Phase reached by applying `event` from `self`, if the edge exists.
    pub fn successor(self, event: PhaseEvent) -> Option<Phase> {
        match (self, event) {
            (Phase::Waiting, PhaseEvent::StartCountdown) => Some(Phase::Countdown),
            (Phase::Countdown, PhaseEvent::CountdownElapsed | PhaseEvent::ForcePlay) => {
                Some(Phase::Playing)
            }
            (Phase::Playing, PhaseEvent::Stop) => Some(Phase::Ended),
            (Phase::Countdown | Phase::Playing | Phase::Ended, PhaseEvent::Reset) => {
                Some(Phase::Waiting)
            }
            _ => None,
        }
    }

    /// Whether `self → next` is one of the legal edges.
    ///
    /// Viewers use this to flag notifications that skipped an intermediate phase.
    pub fn is_legal_edge(self, next: Phase) -> bool {
        matches!(
            (self, next),
            (Phase::Waiting, Phase::Countdown)
                | (Phase::Countdown, Phase::Playing)
                | (Phase::Playing, Phase::Ended)
                | (Phase::Countdown | Phase::Playing | Phase::Ended, Phase::Waiting)
        )
    }
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the machine was in when the event was received.
    pub from: Phase,
    /// The event that cannot be applied from this phase.
    pub event: PhaseEvent,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// Phase changed since the plan was created.
    PhaseMismatch {
        /// Phase when the plan was created.
        expected: Phase,
        /// Current phase.
        actual: Phase,
    },
}

/// Errors that can occur when aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition waiting for its store write to be acknowledged.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the machine is currently in.
    pub from: Phase,
    /// Phase the machine will move to.
    pub to: Phase,
    /// Event that triggered this transition.
    pub event: PhaseEvent,
    /// When this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    /// Current phase.
    pub phase: Phase,
    /// Number of transitions applied so far.
    pub version: usize,
    /// Target phase of the pending transition, if any.
    pub pending: Option<Phase>,
}

/// Authoritative phase machine owned by the broadcaster.
#[derive(Debug, Clone, Default)]
pub struct PhaseMachine {
    phase: Phase,
    version: usize,
    pending: Option<Plan>,
}

impl PhaseMachine {
    /// Create a machine in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a phase read back from the store.
    pub fn resume(phase: Phase) -> Self {
        Self {
            phase,
            ..Self::default()
        }
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Create a snapshot of the machine state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            phase: self.phase,
            version: self.version,
            pending: self.pending.as_ref().map(|plan| plan.to),
        }
    }

    /// Validate `event` against the current phase and reserve the transition.
    pub fn plan(&mut self, event: PhaseEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let to = self
            .phase
            .successor(event)
            .ok_or(PlanError::InvalidTransition(InvalidTransition {
                from: self.phase,
                event,
            }))?;

        let plan = Plan {
            id: Uuid::new_v4(),
            from: self.phase,
            to,
            event,
            pending_since: Instant::now(),
        };
        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Commit a planned transition once its side effects succeeded.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<Phase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.phase != plan.from {
            return Err(ApplyError::PhaseMismatch {
                expected: plan.from,
                actual: self.phase,
            });
        }

        self.phase = plan.to;
        self.version += 1;

        Ok(self.phase)
    }

    /// Drop a planned transition, leaving the phase untouched.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }
}
