pub mod countdown;
pub mod game;
pub mod leaderboard;
pub mod ledger;
pub mod mirror;
pub mod phase;
pub mod sse;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::store::SharedStore,
    services::{broadcaster::BroadcasterHandle, notifier::JoinLinkNotifier},
};

use self::sse::{ControllerSeat, LiveFeed, LiveStreams};

/// Shared application state handed to every handler and background task.
pub type SharedState = Arc<AppState>;

const LIVE_FEED_CAPACITY: usize = 64;

/// Central application state: store handle, broadcaster, live feeds and attached sessions.
pub struct AppState {
    store: Arc<dyn SharedStore>,
    config: Arc<AppConfig>,
    broadcaster: BroadcasterHandle,
    notifier: Arc<dyn JoinLinkNotifier>,
    live: LiveStreams,
    sessions: DashMap<Uuid, Uuid>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        store: Arc<dyn SharedStore>,
        config: Arc<AppConfig>,
        broadcaster: BroadcasterHandle,
        notifier: Arc<dyn JoinLinkNotifier>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            store,
            config,
            broadcaster,
            notifier,
            live: LiveStreams::new(LIVE_FEED_CAPACITY),
            sessions: DashMap::new(),
            degraded: degraded_tx,
        })
    }

    /// Shared state store.
    pub fn store(&self) -> &Arc<dyn SharedStore> {
        &self.store
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handle to the settings writer.
    pub fn broadcaster(&self) -> &BroadcasterHandle {
        &self.broadcaster
    }

    /// Join-link notifier.
    pub fn notifier(&self) -> Arc<dyn JoinLinkNotifier> {
        self.notifier.clone()
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, returning whether it changed.
    pub fn set_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    /// Events for the live screen.
    pub fn spectator_feed(&self) -> &LiveFeed {
        &self.live.spectators
    }

    /// Events for the controller stream.
    pub fn controller_feed(&self) -> &LiveFeed {
        &self.live.controller
    }

    /// Single controller slot guarding the admin routes.
    pub fn controller_seat(&self) -> &ControllerSeat {
        &self.live.seat
    }

    /// Attached player sessions keyed by connection id.
    pub fn sessions(&self) -> &DashMap<Uuid, Uuid> {
        &self.sessions
    }
}
