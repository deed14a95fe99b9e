//! Per-player session mirroring the shared state.
//!
//! [`attach`] opens the store subscriptions, reads the initial state and
//! spawns one task that owns the mirror, the local countdown, the heartbeat
//! and the score ledger. Store writes go through a second writer task so the
//! session never waits on an acknowledgement. Everything is released when the
//! session ends, whether through [`SyncHandle::detach`], dropping the handle
//! or the store closing its feed.

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval, sleep, timeout},
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::GameTuning,
    dao::{
        models::{ChangeEvent, PlayerEntity, PlayerPatch, Version},
        storage::StorageResult,
        store::{Notice, SharedStore, Subscription, Topic},
    },
    error::ServiceError,
    services::wait_until,
    state::{
        countdown::{LocalCountdown, TimerStats},
        game::{Position, Signal},
        leaderboard::{Leaderboard, Standing},
        ledger::{ScoreLedger, TapOutcome},
        mirror::SettingsMirror,
        phase::Phase,
    },
};

const COMMAND_CAPACITY: usize = 64;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Session knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Value the countdown restarts from.
    pub countdown_secs: u8,
    /// Period of the `last_seen_at` heartbeat.
    pub heartbeat_period: Duration,
    /// Leaderboard rows included in the view.
    pub leaderboard_size: usize,
}

impl SyncOptions {
    /// Options for player sessions.
    pub fn from_tuning(tuning: &GameTuning) -> Self {
        Self {
            countdown_secs: tuning.countdown_secs,
            heartbeat_period: tuning.heartbeat_period,
            leaderboard_size: tuning.player_leaderboard_size,
        }
    }
}

/// Everything a player screen renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientView {
    /// Attached player.
    pub player_id: Uuid,
    /// Attached player's nickname.
    pub display_name: String,
    /// Mirrored phase.
    pub phase: Phase,
    /// Mirrored signal.
    pub signal: Signal,
    /// Mirrored target position.
    pub position: Position,
    /// Locally computed seconds before `Playing`.
    pub countdown: u8,
    /// Own score, optimistic until the store confirms it.
    pub score: i64,
    /// Set while writes are failing or the mirror is catching up.
    pub syncing: bool,
    /// Top of the leaderboard.
    pub leaderboard: Vec<Standing>,
}

/// What a finished session did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Countdown timer lifetime counters.
    pub timers: TimerStats,
    /// Heartbeats queued.
    pub heartbeats: u64,
    /// Taps that changed the score.
    pub scored_taps: u64,
}

enum Command {
    Tap(oneshot::Sender<TapOutcome>),
    Detach,
}

/// Owner of an attached session; dropping it aborts the session.
pub struct SyncHandle {
    player_id: Uuid,
    commands: mpsc::Sender<Command>,
    view: watch::Receiver<ClientView>,
    task: Option<JoinHandle<SessionReport>>,
}

impl SyncHandle {
    /// Attached player.
    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    /// Receiver following every view change.
    pub fn view(&self) -> watch::Receiver<ClientView> {
        self.view.clone()
    }

    /// Tap the target.
    pub async fn tap(&self) -> Result<TapOutcome, ServiceError> {
        let (reply, outcome) = oneshot::channel();
        self.commands
            .send(Command::Tap(reply))
            .await
            .map_err(|_| ServiceError::InvalidState("session ended".into()))?;
        outcome
            .await
            .map_err(|_| ServiceError::InvalidState("session ended".into()))
    }

    /// Stop the session, flushing queued writes, and wait for it to finish.
    pub async fn detach(mut self) -> SessionReport {
        let _ = self.commands.send(Command::Detach).await;
        let Some(task) = self.task.take() else {
            return SessionReport::default();
        };
        match task.await {
            Ok(report) => report,
            Err(err) => {
                warn!(player_id = %self.player_id, error = %err, "synchronizer task failed");
                SessionReport::default()
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Attach a synchronizer for `player_id`.
pub async fn attach(
    store: Arc<dyn SharedStore>,
    player_id: Uuid,
    options: SyncOptions,
) -> Result<SyncHandle, ServiceError> {
    // Subscribe before reading so nothing written in between is lost.
    let feeds = Feeds {
        settings: store.subscribe(Topic::Settings)?,
        players: store.subscribe(Topic::Players)?,
        own: store.subscribe(Topic::Player(player_id))?,
    };

    let settings = store.read_settings().await?;
    let player = store
        .find_player(player_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))?;
    let players = store.list_players().await?;

    let mirror = SettingsMirror::from_entity(&settings);
    let mut countdown = LocalCountdown::new(options.countdown_secs);
    if mirror.phase() == Phase::Countdown {
        countdown.restart(Instant::now());
    }

    let (writes, queue) = mpsc::unbounded_channel();
    let (status_tx, write_status) = mpsc::unbounded_channel();
    let writer = WriterTask(Some(tokio::spawn(run_writer(
        store.clone(),
        player_id,
        queue,
        status_tx,
    ))));

    let mut session = Session {
        store,
        player_id,
        display_name: player.display_name.clone(),
        options,
        feeds,
        mirror,
        countdown,
        ledger: ScoreLedger::new(player.score, player.version),
        leaderboard: Leaderboard::from_players(&players),
        writes,
        writer,
        write_status,
        writes_failing: false,
        needs_resync: false,
        view: None,
        report: SessionReport::default(),
    };

    let (view_tx, view) = watch::channel(session.render());
    session.view = Some(view_tx);

    let (commands, inbox) = mpsc::channel(COMMAND_CAPACITY);
    let task = tokio::spawn(session.run(inbox));
    info!(%player_id, "synchronizer attached");

    Ok(SyncHandle {
        player_id,
        commands,
        view,
        task: Some(task),
    })
}

struct Feeds {
    settings: Subscription,
    players: Subscription,
    own: Subscription,
}

struct Session {
    store: Arc<dyn SharedStore>,
    player_id: Uuid,
    display_name: String,
    options: SyncOptions,
    feeds: Feeds,
    mirror: SettingsMirror,
    countdown: LocalCountdown,
    ledger: ScoreLedger,
    leaderboard: Leaderboard,
    writes: mpsc::UnboundedSender<WriteRequest>,
    writer: WriterTask,
    write_status: mpsc::UnboundedReceiver<WriteStatus>,
    writes_failing: bool,
    needs_resync: bool,
    view: Option<watch::Sender<ClientView>>,
    report: SessionReport,
}

enum Flow {
    Continue,
    Stop,
}

impl Session {
    async fn run(mut self, mut inbox: mpsc::Receiver<Command>) -> SessionReport {
        let mut heartbeat = interval(self.options.heartbeat_period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let countdown_deadline = self.countdown.deadline();

            let flow = tokio::select! {
                command = inbox.recv() => match command {
                    Some(Command::Tap(reply)) => {
                        let _ = reply.send(self.tap());
                        Flow::Continue
                    }
                    Some(Command::Detach) | None => Flow::Stop,
                },
                notice = self.feeds.settings.next() => self.on_notice(notice).await,
                notice = self.feeds.players.next() => self.on_notice(notice).await,
                notice = self.feeds.own.next() => self.on_notice(notice).await,
                _ = wait_until(countdown_deadline) => {
                    self.countdown.fire(Instant::now());
                    Flow::Continue
                }
                _ = heartbeat.tick() => {
                    self.heartbeat().await;
                    Flow::Continue
                }
                Some(status) = self.write_status.recv() => {
                    self.on_write_status(status);
                    Flow::Continue
                }
            };

            if let Flow::Stop = flow {
                break;
            }
            self.publish();
        }

        self.teardown().await
    }

    fn tap(&mut self) -> TapOutcome {
        let outcome = self.ledger.tap(self.mirror.phase(), self.mirror.signal());
        if let TapOutcome::Applied { write, .. } = outcome {
            self.report.scored_taps += 1;
            self.enqueue(WriteRequest {
                score_seq: Some(write.seq),
                patch: PlayerPatch::score(write.value),
            });
        }
        outcome
    }

    async fn heartbeat(&mut self) {
        self.report.heartbeats += 1;
        self.enqueue(WriteRequest {
            score_seq: None,
            patch: PlayerPatch::seen(SystemTime::now()),
        });
        if self.needs_resync {
            self.resync().await;
        }
    }

    fn enqueue(&mut self, request: WriteRequest) {
        if self.writes.send(request).is_err() {
            warn!(player_id = %self.player_id, "writer task gone; dropping write");
            self.writes_failing = true;
        }
    }

    fn on_write_status(&mut self, status: WriteStatus) {
        match status {
            WriteStatus::Stored { score_seq, version } => {
                self.writes_failing = false;
                if let Some(seq) = score_seq {
                    self.ledger.acknowledge(seq, version);
                }
            }
            WriteStatus::Retrying => self.writes_failing = true,
            WriteStatus::Dropped { score_seq } => {
                if let Some(seq) = score_seq {
                    self.ledger.abandon(seq);
                    self.needs_resync = true;
                }
            }
        }
    }

    async fn on_notice(&mut self, notice: Notice) -> Flow {
        match notice {
            Notice::Change(ChangeEvent::Settings(change)) => {
                let previous = self.mirror.phase();
                let update = self.mirror.merge(&change);
                if update.is_empty() {
                    debug!(version = change.version, "stale settings notification ignored");
                }
                if let Some(phase) = update.phase {
                    self.on_phase(previous, phase);
                }
            }
            Notice::Change(ChangeEvent::Player(player)) => self.on_player(&player),
            Notice::Resync { missed } => {
                debug!(player_id = %self.player_id, missed, "subscription lagged; refetching");
                self.resync().await;
            }
            Notice::Closed => {
                warn!(player_id = %self.player_id, "store feed closed; ending session");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn on_phase(&mut self, previous: Phase, phase: Phase) {
        if previous != phase && !previous.is_legal_edge(phase) {
            debug!(from = ?previous, to = ?phase, "phase notification skipped a step");
        }
        match phase {
            Phase::Countdown => self.countdown.restart(Instant::now()),
            Phase::Waiting => self.countdown.idle(),
            Phase::Playing | Phase::Ended => self.countdown.halt(),
        }
    }

    fn on_player(&mut self, player: &PlayerEntity) {
        self.leaderboard.upsert(player);
        if player.id == self.player_id {
            self.display_name.clone_from(&player.display_name);
            self.ledger.reconcile(player.score, player.version);
        }
    }

    async fn resync(&mut self) {
        match self.refetch().await {
            Ok(()) => self.needs_resync = false,
            Err(err) => {
                warn!(player_id = %self.player_id, error = %err, "refetch failed; retrying on next heartbeat");
                self.needs_resync = true;
            }
        }
    }

    async fn refetch(&mut self) -> StorageResult<()> {
        let settings = self.store.read_settings().await?;
        let players = self.store.list_players().await?;

        let previous = self.mirror.phase();
        if let Some(phase) = self.mirror.refresh(&settings).phase {
            self.on_phase(previous, phase);
        }
        for player in &players {
            self.on_player(player);
        }
        Ok(())
    }

    fn render(&self) -> ClientView {
        ClientView {
            player_id: self.player_id,
            display_name: self.display_name.clone(),
            phase: self.mirror.phase(),
            signal: self.mirror.signal(),
            position: self.mirror.position(),
            countdown: self.countdown.remaining(),
            score: self.ledger.score(),
            syncing: self.writes_failing || self.needs_resync,
            leaderboard: self.leaderboard.top(self.options.leaderboard_size),
        }
    }

    fn publish(&self) {
        let Some(view) = &self.view else {
            return;
        };
        let next = self.render();
        view.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    async fn teardown(self) -> SessionReport {
        let Session {
            player_id,
            feeds,
            mut countdown,
            mut ledger,
            writes,
            writer,
            mut write_status,
            mut report,
            ..
        } = self;

        countdown.halt();
        drop(feeds);
        // Closing the queue lets the writer flush what is left and exit.
        drop(writes);
        writer.finish(WRITER_DRAIN_TIMEOUT).await;

        while let Ok(status) = write_status.try_recv() {
            if let WriteStatus::Stored {
                score_seq: Some(seq),
                version,
            } = status
            {
                ledger.acknowledge(seq, version);
            }
        }
        if let Some(lost) = ledger.pending() {
            warn!(%player_id, score = lost.value, "score write not stored before detach");
        }

        report.timers = countdown.stats();
        info!(%player_id, "synchronizer detached");
        report
    }
}

#[derive(Debug, Clone, Copy)]
struct WriteRequest {
    score_seq: Option<u64>,
    patch: PlayerPatch,
}

impl WriteRequest {
    fn merge(self, later: WriteRequest) -> Self {
        Self {
            score_seq: later.score_seq.or(self.score_seq),
            patch: self.patch.merge(later.patch),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteStatus {
    Stored {
        score_seq: Option<u64>,
        version: Version,
    },
    Retrying,
    Dropped {
        score_seq: Option<u64>,
    },
}

/// Writer task handle; aborts the writer if the session is torn down abruptly.
struct WriterTask(Option<JoinHandle<()>>);

impl WriterTask {
    async fn finish(mut self, limit: Duration) {
        let Some(mut handle) = self.0.take() else {
            return;
        };
        if timeout(limit, &mut handle).await.is_err() {
            warn!("queued player writes did not drain in time; dropping them");
            handle.abort();
        }
    }
}

impl Drop for WriterTask {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

/// Apply queued writes in order, retrying transient failures with backoff.
///
/// Requests queued while a write is being retried are coalesced into it.
async fn run_writer(
    store: Arc<dyn SharedStore>,
    player_id: Uuid,
    mut queue: mpsc::UnboundedReceiver<WriteRequest>,
    status: mpsc::UnboundedSender<WriteStatus>,
) {
    while let Some(mut request) = queue.recv().await {
        let mut delay = INITIAL_RETRY_DELAY;
        loop {
            match store.write_player(player_id, request.patch).await {
                Ok(stored) => {
                    let _ = status.send(WriteStatus::Stored {
                        score_seq: request.score_seq,
                        version: stored.version,
                    });
                    break;
                }
                Err(err) if err.is_transient() => {
                    warn!(
                        %player_id,
                        error = %err,
                        retry_in_ms = delay.as_millis() as u64,
                        "player write failed; retrying"
                    );
                    let _ = status.send(WriteStatus::Retrying);
                    sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                    while let Ok(later) = queue.try_recv() {
                        request = request.merge(later);
                    }
                }
                Err(err) => {
                    warn!(%player_id, error = %err, "dropping player write");
                    let _ = status.send(WriteStatus::Dropped {
                        score_seq: request.score_seq,
                    });
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::future::BoxFuture;

    use super::*;
    use crate::dao::{
        models::{GameSettingsEntity, NewPlayer, SettingsPatch},
        store::memory::InMemoryStore,
    };

    /// Store whose player writes take a while to land.
    struct SlowWrites {
        inner: InMemoryStore,
        delay: Duration,
    }

    impl SharedStore for SlowWrites {
        fn read_settings(&self) -> BoxFuture<'static, StorageResult<GameSettingsEntity>> {
            self.inner.read_settings()
        }

        fn write_settings(&self, patch: SettingsPatch) -> BoxFuture<'static, StorageResult<Version>> {
            self.inner.write_settings(patch)
        }

        fn insert_player(&self, player: NewPlayer) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
            self.inner.insert_player(player)
        }

        fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
            self.inner.find_player(id)
        }

        fn find_player_by_email(
            &self,
            email: String,
        ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
            self.inner.find_player_by_email(email)
        }

        fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
            self.inner.list_players()
        }

        fn write_player(
            &self,
            id: Uuid,
            patch: PlayerPatch,
        ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
            let write = self.inner.write_player(id, patch);
            let delay = self.delay;
            Box::pin(async move {
                sleep(delay).await;
                write.await
            })
        }

        fn subscribe(&self, topic: Topic) -> StorageResult<Subscription> {
            self.inner.subscribe(topic)
        }

        fn active_subscriptions(&self) -> usize {
            self.inner.active_subscriptions()
        }

        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.inner.health_check()
        }
    }

    fn options() -> SyncOptions {
        SyncOptions::from_tuning(&GameTuning::default())
    }

    async fn register(store: &InMemoryStore, name: &str) -> Uuid {
        store
            .insert_player(NewPlayer {
                display_name: name.into(),
                email: format!("{name}@example.com"),
                phone: None,
                full_name: None,
            })
            .await
            .unwrap()
            .id
    }

    async fn attach_to(store: &InMemoryStore, player_id: Uuid) -> SyncHandle {
        attach(Arc::new(store.clone()), player_id, options())
            .await
            .unwrap()
    }

    async fn wait_for(
        view: &mut watch::Receiver<ClientView>,
        predicate: impl FnMut(&ClientView) -> bool,
    ) -> ClientView {
        timeout(Duration::from_secs(30), view.wait_for(predicate))
            .await
            .expect("view never reached the expected state")
            .expect("session ended")
            .clone()
    }

    async fn start_playing(store: &InMemoryStore, signal: Signal) {
        store
            .write_settings(SettingsPatch {
                phase: Some(Phase::Playing),
                signal: Some(signal),
                ..SettingsPatch::default()
            })
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn detach_releases_subscriptions_and_timers() {
        let store = InMemoryStore::new();
        let id = register(&store, "ana").await;

        let session = attach_to(&store, id).await;
        assert_eq!(store.subscriptions().active(), 3);

        store
            .write_settings(SettingsPatch::phase(Phase::Countdown))
            .await
            .unwrap();
        wait_for(&mut session.view(), |view| view.phase == Phase::Countdown).await;

        let report = session.detach().await;
        assert_eq!(store.subscriptions().active(), 0);
        assert_eq!(report.timers.live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_releases_everything() {
        let store = InMemoryStore::new();
        let id = register(&store, "ana").await;

        let session = attach_to(&store, id).await;
        let view = session.view();
        drop(session);

        sleep(Duration::from_millis(10)).await;
        assert_eq!(store.subscriptions().active(), 0);
        assert!(view.has_changed().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_countdown_restarts_the_local_timer() {
        let store = InMemoryStore::new();
        let id = register(&store, "ana").await;
        let session = attach_to(&store, id).await;
        let mut view = session.view();
        assert_eq!(view.borrow().countdown, 5);

        store
            .write_settings(SettingsPatch::phase(Phase::Countdown))
            .await
            .unwrap();
        wait_for(&mut view, |view| view.countdown == 3).await;

        store
            .write_settings(SettingsPatch::phase(Phase::Countdown))
            .await
            .unwrap();
        wait_for(&mut view, |view| view.countdown == 5).await;
        wait_for(&mut view, |view| view.countdown == 4).await;

        store
            .write_settings(SettingsPatch::phase(Phase::Waiting))
            .await
            .unwrap();
        let idle = wait_for(&mut view, |view| view.phase == Phase::Waiting).await;
        assert_eq!(idle.countdown, 5);

        let report = session.detach().await;
        assert_eq!(report.timers.live(), 0);
        assert_eq!(
            report.timers.created,
            report.timers.cancelled + report.timers.fired
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_taps_accumulate_and_reach_the_store() {
        let store = InMemoryStore::new();
        let id = register(&store, "ana").await;
        let session = attach_to(&store, id).await;
        start_playing(&store, Signal::Active).await;
        wait_for(&mut session.view(), |view| {
            view.phase == Phase::Playing && view.signal == Signal::Active
        })
        .await;

        let mut last = None;
        for _ in 0..5 {
            last = Some(session.tap().await.unwrap());
        }
        assert!(matches!(last, Some(TapOutcome::Applied { score: 5, .. })));

        let view = wait_for(&mut session.view(), |view| {
            view.leaderboard.first().is_some_and(|top| top.score == 5)
        })
        .await;
        assert_eq!(view.score, 5);
        assert_eq!(store.find_player(id).await.unwrap().unwrap().score, 5);
    }

    async fn tap_steadily_against_slow_writes(taps: i64, gap: Duration) {
        let store = InMemoryStore::new();
        let id = register(&store, "ana").await;
        let slow = SlowWrites {
            inner: store.clone(),
            delay: Duration::from_millis(30),
        };
        let session = attach(Arc::new(slow), id, options()).await.unwrap();
        start_playing(&store, Signal::Active).await;
        wait_for(&mut session.view(), |view| {
            view.phase == Phase::Playing && view.signal == Signal::Active
        })
        .await;

        let mut scores = Vec::new();
        for _ in 0..taps {
            if let TapOutcome::Applied { score, .. } = session.tap().await.unwrap() {
                scores.push(score);
            }
            sleep(gap).await;
        }
        assert_eq!(scores, (1..=taps).collect::<Vec<_>>());

        let view = wait_for(&mut session.view(), |view| {
            view.leaderboard.first().is_some_and(|top| top.score == taps)
        })
        .await;
        assert_eq!(view.score, taps);
        assert_eq!(store.find_player(id).await.unwrap().unwrap().score, taps);
        session.detach().await;
    }

    #[tokio::test(start_paused = true)]
    async fn own_write_echoes_do_not_rewind_rapid_taps() {
        tap_steadily_against_slow_writes(10, Duration::from_millis(20)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_echo_does_not_rewind_a_tap() {
        tap_steadily_against_slow_writes(5, Duration::from_millis(40)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn taps_outside_playing_change_nothing() {
        let store = InMemoryStore::new();
        let id = register(&store, "ana").await;
        let session = attach_to(&store, id).await;

        let outcome = session.tap().await.unwrap();
        assert_eq!(
            outcome,
            TapOutcome::Ignored {
                phase: Phase::Waiting
            }
        );
        let report = session.detach().await;
        assert_eq!(report.scored_taps, 0);
        assert_eq!(store.find_player(id).await.unwrap().unwrap().score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn authoritative_score_replaces_local_value() {
        let store = InMemoryStore::new();
        let id = register(&store, "ana").await;
        let session = attach_to(&store, id).await;

        store
            .write_player(id, PlayerPatch::score(42))
            .await
            .unwrap();
        let view = wait_for(&mut session.view(), |view| view.score == 42).await;
        assert_eq!(view.leaderboard[0].score, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_writes_mark_syncing_and_retry() {
        let store = InMemoryStore::new();
        let id = register(&store, "ana").await;
        let session = attach_to(&store, id).await;
        start_playing(&store, Signal::Inactive).await;
        let mut view = session.view();
        wait_for(&mut view, |view| view.phase == Phase::Playing).await;

        store.set_online(false);
        session.tap().await.unwrap();
        let offline = wait_for(&mut view, |view| view.syncing).await;
        assert_eq!(offline.score, -3);

        store.set_online(true);
        wait_for(&mut view, |view| !view.syncing).await;
        sleep(Duration::from_secs(6)).await;
        assert_eq!(store.find_player(id).await.unwrap().unwrap().score, -3);
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_marks_presence() {
        let store = InMemoryStore::new();
        let id = register(&store, "ana").await;
        let session = attach_to(&store, id).await;

        sleep(Duration::from_secs(11)).await;
        let player = store.find_player(id).await.unwrap().unwrap();
        assert!(player.last_seen_at.is_some());

        let report = session.detach().await;
        assert!(report.heartbeats >= 3, "heartbeats: {}", report.heartbeats);
    }

    #[tokio::test(start_paused = true)]
    async fn lagging_session_catches_up_by_refetching() {
        let store = InMemoryStore::with_capacity(4);
        let id = register(&store, "ana").await;
        let session = attach_to(&store, id).await;

        for i in 0..20 {
            let signal = if i % 2 == 0 {
                Signal::Inactive
            } else {
                Signal::Active
            };
            start_playing(&store, signal).await;
        }

        let view = wait_for(&mut session.view(), |view| {
            view.phase == Phase::Playing && view.signal == Signal::Active && !view.syncing
        })
        .await;
        assert_eq!(view.position, Position::ORIGIN);
    }
}
