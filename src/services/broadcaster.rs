//! Authoritative writer of the global game settings.
//!
//! A single task owns the [`PhaseMachine`], the countdown deadline and the
//! signal ticker. Every settings write happens from that task, so the ticker
//! can never race a phase change: leaving `Playing` and parking the signal is
//! one store write, and no tick is scheduled afterwards.

use std::{ops::RangeInclusive, sync::Arc, time::Duration};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, sleep},
};
use tracing::{debug, info, warn};

use crate::{
    config::{GameTuning, TICK_INTERVAL_BOUNDS},
    dao::{
        models::{PlayerPatch, SettingsPatch, Version},
        store::SharedStore,
    },
    error::ServiceError,
    services::wait_until,
    state::{
        game::{Position, Signal},
        phase::{Phase, PhaseEvent, PhaseMachine, Snapshot},
    },
};

const COMMAND_CAPACITY: usize = 32;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);
const COUNTDOWN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Random draw performed on every tick while `Playing`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalDraw {
    /// Probability of drawing [`Signal::Active`].
    pub active_probability: f64,
    /// Half-width of the square positions are drawn from.
    pub position_bound: f64,
    /// Whether the draw also moves the target.
    pub spatial: bool,
}

impl SignalDraw {
    /// Draw parameters taken from the tuning.
    pub fn from_tuning(tuning: &GameTuning) -> Self {
        Self {
            active_probability: tuning.active_probability,
            position_bound: tuning.position_bound,
            spatial: tuning.spatial_movement,
        }
    }

    /// Draw a tick's settings patch.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> SettingsPatch {
        let signal = if rng.random_bool(self.active_probability) {
            Signal::Active
        } else {
            Signal::Inactive
        };

        let position = self.spatial.then(|| {
            let bound = self.position_bound;
            if bound > 0.0 {
                Position::new(
                    rng.random_range(-bound..=bound),
                    rng.random_range(-bound..=bound),
                )
            } else {
                Position::ORIGIN
            }
        });

        SettingsPatch {
            signal: Some(signal),
            position,
            ..SettingsPatch::default()
        }
    }
}

/// Outcome of [`BroadcasterHandle::reset_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSummary {
    /// Phase after the reset (always `Waiting`).
    pub phase: Phase,
    /// Players whose score was written back to zero.
    pub players_reset: usize,
    /// Players registered at the time of the reset.
    pub total_players: usize,
}

enum Command {
    Transition {
        event: PhaseEvent,
        reply: oneshot::Sender<Result<Phase, ServiceError>>,
    },
    Write {
        patch: SettingsPatch,
        reply: oneshot::Sender<Result<Version, ServiceError>>,
    },
    SetTickInterval {
        interval: Option<Duration>,
        reply: oneshot::Sender<Result<Version, ServiceError>>,
    },
    ResetAll {
        reply: oneshot::Sender<Result<ResetSummary, ServiceError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
}

/// Cloneable handle used by the controller routes to drive the broadcaster.
#[derive(Clone)]
pub struct BroadcasterHandle {
    commands: mpsc::Sender<Command>,
}

impl BroadcasterHandle {
    /// Request the phase `next`, using the edge that leads there.
    ///
    /// `Countdown` starts the countdown, `Playing` skips what is left of it,
    /// `Ended` stops the round and `Waiting` resets the phase.
    pub async fn set_phase(&self, next: Phase) -> Result<Phase, ServiceError> {
        let event = match next {
            Phase::Waiting => PhaseEvent::Reset,
            Phase::Countdown => PhaseEvent::StartCountdown,
            Phase::Playing => PhaseEvent::ForcePlay,
            Phase::Ended => PhaseEvent::Stop,
        };
        self.request(|reply| Command::Transition { event, reply })
            .await?
    }

    /// Overwrite the signal.
    pub async fn set_signal(&self, signal: Signal) -> Result<Version, ServiceError> {
        let patch = SettingsPatch {
            signal: Some(signal),
            ..SettingsPatch::default()
        };
        self.request(|reply| Command::Write { patch, reply }).await?
    }

    /// Overwrite the target position.
    pub async fn set_position(&self, x: f64, y: f64) -> Result<Version, ServiceError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ServiceError::InvalidInput(
                "position coordinates must be finite".into(),
            ));
        }
        let patch = SettingsPatch {
            position: Some(Position::new(x, y)),
            ..SettingsPatch::default()
        };
        self.request(|reply| Command::Write { patch, reply }).await?
    }

    /// Fix the tick interval, or go back to randomized intervals with `None`.
    pub async fn set_tick_interval(
        &self,
        interval: Option<Duration>,
    ) -> Result<Version, ServiceError> {
        if let Some(interval) = interval {
            if !TICK_INTERVAL_BOUNDS.contains(&interval) {
                return Err(ServiceError::InvalidInput(format!(
                    "tick interval must be between {} and {} ms",
                    TICK_INTERVAL_BOUNDS.start().as_millis(),
                    TICK_INTERVAL_BOUNDS.end().as_millis()
                )));
            }
        }
        self.request(|reply| Command::SetTickInterval { interval, reply })
            .await?
    }

    /// Return to `Waiting`, park the signal and zero every score.
    ///
    /// Idempotent: a second call leaves the exact same state behind.
    pub async fn reset_all(&self) -> Result<ResetSummary, ServiceError> {
        self.request(|reply| Command::ResetAll { reply }).await?
    }

    /// Current state of the phase machine.
    pub async fn snapshot(&self) -> Result<Snapshot, ServiceError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| ServiceError::BroadcasterStopped)?;
        response.await.map_err(|_| ServiceError::BroadcasterStopped)
    }
}

/// Task state of the broadcaster.
pub struct Broadcaster {
    store: Arc<dyn SharedStore>,
    machine: PhaseMachine,
    draw: SignalDraw,
    countdown: Duration,
    tick_interval: Option<Duration>,
    random_tick_range: RangeInclusive<Duration>,
    rng: StdRng,
    countdown_deadline: Option<Instant>,
    next_tick: Option<Instant>,
}

impl Broadcaster {
    /// Spawn the broadcaster task with an OS-seeded random generator.
    pub fn spawn(
        store: Arc<dyn SharedStore>,
        tuning: &GameTuning,
    ) -> (BroadcasterHandle, JoinHandle<()>) {
        Self::spawn_with_rng(store, tuning, StdRng::from_os_rng())
    }

    /// Spawn the broadcaster task with a caller-provided generator.
    pub fn spawn_with_rng(
        store: Arc<dyn SharedStore>,
        tuning: &GameTuning,
        rng: StdRng,
    ) -> (BroadcasterHandle, JoinHandle<()>) {
        let (commands, inbox) = mpsc::channel(COMMAND_CAPACITY);
        let broadcaster = Self {
            store,
            machine: PhaseMachine::new(),
            draw: SignalDraw::from_tuning(tuning),
            countdown: tuning.countdown(),
            tick_interval: tuning.tick_interval,
            random_tick_range: tuning.random_tick_range.clone(),
            rng,
            countdown_deadline: None,
            next_tick: None,
        };
        let task = tokio::spawn(broadcaster.run(inbox));
        (BroadcasterHandle { commands }, task)
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Command>) {
        self.resume().await;

        loop {
            let countdown_deadline = self.countdown_deadline;
            let next_tick = self.next_tick;

            tokio::select! {
                command = inbox.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                _ = wait_until(countdown_deadline) => self.countdown_elapsed().await,
                _ = wait_until(next_tick) => self.tick().await,
            }
        }

        info!("broadcaster stopped");
    }

    /// Pick up the phase and tick interval left in the store by a previous run.
    async fn resume(&mut self) {
        let mut delay = INITIAL_RETRY_DELAY;
        loop {
            match self.store.read_settings().await {
                Ok(settings) => {
                    let phase = settings.phase.value;
                    self.machine = PhaseMachine::resume(phase);
                    if settings.tick_interval_ms.version > 0 {
                        self.tick_interval =
                            settings.tick_interval_ms.value.map(Duration::from_millis);
                    }
                    self.on_entered(phase, Instant::now());
                    info!(?phase, "broadcaster ready");
                    return;
                }
                Err(err) => {
                    warn!(error = %err, "failed to read settings; broadcaster waiting for storage");
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Transition { event, reply } => {
                let _ = reply.send(self.transition(event).await);
            }
            Command::Write { patch, reply } => {
                let result = self.store.write_settings(patch).await.map_err(Into::into);
                let _ = reply.send(result);
            }
            Command::SetTickInterval { interval, reply } => {
                let _ = reply.send(self.set_tick_interval(interval).await);
            }
            Command::ResetAll { reply } => {
                let _ = reply.send(self.reset_all().await);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.machine.snapshot());
            }
        }
    }

    /// Plan, write, then apply; a failed write aborts the plan.
    async fn transition(&mut self, event: PhaseEvent) -> Result<Phase, ServiceError> {
        let plan = self.machine.plan(event)?;

        let mut patch = SettingsPatch::phase(plan.to);
        if plan.from == Phase::Playing || plan.to == Phase::Waiting {
            patch = SettingsPatch::parked().with(patch);
        }

        match self.store.write_settings(patch).await {
            Ok(version) => {
                let next = self.machine.apply(plan.id)?;
                info!(from = ?plan.from, to = ?next, ?event, version, "phase changed");
                self.on_entered(next, Instant::now());
                Ok(next)
            }
            Err(err) => {
                if let Err(abort_err) = self.machine.abort(plan.id) {
                    warn!(?event, plan_id = %plan.id, error = ?abort_err, "failed to abort transition");
                }
                warn!(?event, error = %err, "phase write failed; transition aborted");
                Err(err.into())
            }
        }
    }

    fn on_entered(&mut self, phase: Phase, now: Instant) {
        self.countdown_deadline = (phase == Phase::Countdown).then(|| now + self.countdown);
        self.next_tick = if phase == Phase::Playing {
            Some(now + self.next_interval())
        } else {
            None
        };
    }

    async fn countdown_elapsed(&mut self) {
        self.countdown_deadline = None;
        if self.machine.phase() != Phase::Countdown {
            return;
        }

        if let Err(err) = self.transition(PhaseEvent::CountdownElapsed).await {
            warn!(error = %err, "automatic switch to playing failed; retrying");
            self.countdown_deadline = Some(Instant::now() + COUNTDOWN_RETRY_DELAY);
        }
    }

    async fn tick(&mut self) {
        let started = Instant::now();
        if self.machine.phase() != Phase::Playing {
            self.next_tick = None;
            return;
        }

        let patch = self.draw.draw(&mut self.rng);
        let signal = patch.signal;
        match self.store.write_settings(patch).await {
            Ok(version) => debug!(?signal, version, "tick"),
            Err(err) => warn!(error = %err, "tick write failed; previous signal stays"),
        }

        self.next_tick = Some(started + self.next_interval());
    }

    async fn set_tick_interval(&mut self, interval: Option<Duration>) -> Result<Version, ServiceError> {
        let millis = interval.map(|interval| interval.as_millis() as u64);
        let patch = SettingsPatch {
            tick_interval_ms: Some(millis),
            ..SettingsPatch::default()
        };
        let version = self.store.write_settings(patch).await?;

        self.tick_interval = interval;
        if self.machine.phase() == Phase::Playing {
            self.next_tick = Some(Instant::now() + self.next_interval());
        }
        info!(interval_ms = ?millis, "tick interval updated");
        Ok(version)
    }

    async fn reset_all(&mut self) -> Result<ResetSummary, ServiceError> {
        if self.machine.phase() == Phase::Waiting {
            self.store
                .write_settings(SettingsPatch::parked())
                .await?;
        } else {
            self.transition(PhaseEvent::Reset).await?;
        }

        let players = self.store.list_players().await?;
        let total_players = players.len();
        let mut players_reset = 0;
        let mut pending = Vec::new();

        for player in players.into_iter().filter(|player| player.score != 0) {
            match self
                .store
                .write_player(player.id, PlayerPatch::score(0))
                .await
            {
                Ok(_) => players_reset += 1,
                Err(err) => {
                    warn!(player_id = %player.id, error = %err, "failed to reset player score");
                    pending.push(player.id);
                }
            }
        }

        if !pending.is_empty() {
            return Err(ServiceError::PartialReset {
                pending,
                total: total_players,
            });
        }

        info!(players_reset, total_players, "game reset");
        Ok(ResetSummary {
            phase: self.machine.phase(),
            players_reset,
            total_players,
        })
    }

    fn next_interval(&mut self) -> Duration {
        match self.tick_interval {
            Some(interval) => interval,
            None => {
                let min = self.random_tick_range.start().as_millis() as u64;
                let max = self.random_tick_range.end().as_millis() as u64;
                Duration::from_millis(self.rng.random_range(min..=max))
            }
        }
    }
}
