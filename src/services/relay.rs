//! Forwards store notifications to the spectator and controller SSE streams.

use std::{ops::ControlFlow, time::Duration};

use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::{
        models::ChangeEvent,
        store::{Notice, Subscription, Topic},
    },
    error::ServiceError,
    services::sse_events,
    state::{SharedState, leaderboard::Leaderboard},
};

const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Mirror of the leaderboard kept in step with the player collection.
struct Relay {
    state: SharedState,
    leaderboard: Leaderboard,
}

/// Start relaying store changes onto the SSE hubs.
pub fn spawn(state: SharedState) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: SharedState) {
    let mut relay = Relay {
        state,
        leaderboard: Leaderboard::default(),
    };
    let mut delay = INITIAL_RETRY_DELAY;

    loop {
        match relay.open().await {
            Ok((settings, players)) => {
                delay = INITIAL_RETRY_DELAY;
                if relay.pump(settings, players).await.is_break() {
                    info!("store change feed closed; relay stopped");
                    return;
                }
            }
            Err(err) => {
                warn!(error = %err, "relay could not attach to the store; retrying");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_RETRY_DELAY);
            }
        }
    }
}

impl Relay {
    /// Subscribe first, then load, so no write falls between the two.
    async fn open(&mut self) -> Result<(Subscription, Subscription), ServiceError> {
        let store = self.state.store();
        let settings = store.subscribe(Topic::Settings)?;
        let players = store.subscribe(Topic::Players)?;
        self.refresh().await?;
        Ok((settings, players))
    }

    async fn refresh(&mut self) -> Result<(), ServiceError> {
        let store = self.state.store();
        let settings = store.read_settings().await?;
        let players = store.list_players().await?;

        self.leaderboard = Leaderboard::from_players(&players);
        sse_events::broadcast_settings_snapshot(&self.state, &settings);
        sse_events::broadcast_leaderboard(&self.state, &self.leaderboard);
        Ok(())
    }

    async fn pump(
        &mut self,
        mut settings: Subscription,
        mut players: Subscription,
    ) -> ControlFlow<()> {
        loop {
            let notice = tokio::select! {
                notice = settings.next() => notice,
                notice = players.next() => notice,
            };

            match notice {
                Notice::Change(ChangeEvent::Settings(change)) => {
                    sse_events::broadcast_settings_changed(&self.state, &change);
                }
                Notice::Change(ChangeEvent::Player(player)) => {
                    if self.leaderboard.upsert(&player) {
                        sse_events::broadcast_leaderboard(&self.state, &self.leaderboard);
                    }
                }
                Notice::Resync { missed } => {
                    debug!(missed, "relay lagged behind the store; refetching");
                    if let Err(err) = self.refresh().await {
                        warn!(error = %err, "relay refetch failed; reopening subscriptions");
                        return ControlFlow::Continue(());
                    }
                }
                Notice::Closed => return ControlFlow::Break(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::{sync::broadcast, time::timeout};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{NewPlayer, PlayerPatch},
            store::{SharedStore, memory::InMemoryStore},
        },
        dto::sse::LiveEvent,
        services::{broadcaster::Broadcaster, notifier::LogNotifier},
        state::{AppState, game::Signal},
    };

    fn setup() -> (SharedState, InMemoryStore) {
        let store = InMemoryStore::new();
        let shared: Arc<dyn SharedStore> = Arc::new(store.clone());
        let config = Arc::new(AppConfig::default());
        let (broadcaster, _task) = Broadcaster::spawn(shared.clone(), &config.game);
        (
            AppState::new(shared, config, broadcaster, Arc::new(LogNotifier)),
            store,
        )
    }

    async fn next_event(rx: &mut broadcast::Receiver<LiveEvent>) -> LiveEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event in time")
            .expect("feed open")
    }

    async fn wait_subscribed(store: &InMemoryStore) {
        while store.subscriptions().active_on(&Topic::Players) == 0 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn score_changes_reorder_the_public_leaderboard() {
        let (state, store) = setup();
        let mut public = state.spectator_feed().subscribe().receiver;
        let _relay = spawn(state.clone());
        wait_subscribed(&store).await;

        let new = |name: &str| NewPlayer {
            display_name: name.into(),
            email: format!("{name}@example.com"),
            phone: None,
            full_name: None,
        };
        store.insert_player(new("ana")).await.unwrap();
        let bo = store.insert_player(new("bo")).await.unwrap();
        store.write_player(bo.id, PlayerPatch::score(-3)).await.unwrap();
        store.write_player(bo.id, PlayerPatch::score(2)).await.unwrap();

        let last = loop {
            if let LiveEvent::Leaderboard(board) = next_event(&mut public).await {
                if board
                    .entries
                    .first()
                    .is_some_and(|top| top.display_name == "bo" && top.score == 2)
                {
                    break board;
                }
            }
        };
        assert_eq!(last.entries[1].display_name, "ana");
        assert_eq!(last.total_players, 2);
    }

    #[tokio::test]
    async fn settings_changes_reach_the_controller() {
        let (state, store) = setup();
        let mut admin = state.controller_feed().subscribe().receiver;
        let _relay = spawn(state.clone());
        wait_subscribed(&store).await;

        state.broadcaster().set_signal(Signal::Active).await.unwrap();

        loop {
            if let LiveEvent::Settings(change) = next_event(&mut admin).await {
                if change.signal == Some(Signal::Active) && change.phase.is_none() {
                    break;
                }
            }
        }
    }
}
