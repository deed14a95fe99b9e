use std::time::Duration;

use tokio::{task::JoinHandle, time::sleep};
use tracing::{info, warn};

use crate::{services::sse_events, state::SharedState};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll the store and keep the shared state in degraded mode while it is unreachable.
pub fn spawn(state: SharedState) -> JoinHandle<()> {
    tokio::spawn(run(state))
}

async fn run(state: SharedState) {
    let mut delay = INITIAL_DELAY;

    loop {
        match state.store().health_check().await {
            Ok(()) => {
                if state.set_degraded(false) {
                    info!("storage healthy again; leaving degraded mode");
                    sse_events::broadcast_system_status(&state, false);
                }
                delay = INITIAL_DELAY;
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                if state.set_degraded(true) {
                    warn!(error = %err, "storage health check failed; entering degraded mode");
                    sse_events::broadcast_system_status(&state, true);
                } else {
                    warn!(error = %err, retry_in_ms = delay.as_millis() as u64, "storage still unavailable");
                }
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::store::{SharedStore, memory::InMemoryStore},
        dto::sse::{LiveEvent, SystemStatus},
        services::{broadcaster::Broadcaster, notifier::LogNotifier},
        state::AppState,
    };

    #[tokio::test(start_paused = true)]
    async fn outage_toggles_degraded_mode() {
        let store = InMemoryStore::new();
        let shared: Arc<dyn SharedStore> = Arc::new(store.clone());
        let config = Arc::new(AppConfig::default());
        let (broadcaster, _task) = Broadcaster::spawn(shared.clone(), &config.game);
        let state = AppState::new(shared, config, broadcaster, Arc::new(LogNotifier));
        let mut live = state.spectator_feed().subscribe().receiver;
        let mut degraded = state.degraded_watcher();
        let supervisor = spawn(state.clone());

        store.set_online(false);
        degraded.changed().await.unwrap();
        assert!(state.is_degraded());
        assert!(matches!(
            live.recv().await.unwrap(),
            LiveEvent::Status(SystemStatus { degraded: true })
        ));
        assert!(matches!(
            state.controller_feed().snapshot()[0],
            LiveEvent::Status(SystemStatus { degraded: true })
        ));

        store.set_online(true);
        degraded.changed().await.unwrap();
        assert!(!state.is_degraded());

        supervisor.abort();
    }
}
