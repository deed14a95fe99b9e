use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{PlayerInboundMessage, PlayerOutboundMessage},
    error::ServiceError,
    services::synchronizer::{self, SyncHandle, SyncOptions},
    state::SharedState,
};

/// Errors raised while serving a player socket.
#[derive(Debug, Error)]
enum PlayError {
    /// Writer channel closed; the connection must be torn down.
    #[error("connection closed")]
    ConnectionClosed,
    /// The synchronizer refused or lost the session.
    #[error("session error: {0}")]
    Service(#[from] ServiceError),
}

/// Registration in the attached-session registry, removed on drop.
struct AttachedSession {
    state: SharedState,
    connection_id: Uuid,
}

impl AttachedSession {
    fn register(state: &SharedState, player_id: Uuid) -> Self {
        let connection_id = Uuid::new_v4();
        state.sessions().insert(connection_id, player_id);
        Self {
            state: state.clone(),
            connection_id,
        }
    }
}

impl Drop for AttachedSession {
    fn drop(&mut self) {
        self.state.sessions().remove(&self.connection_id);
    }
}

/// Serve one player screen: attach a synchronizer, stream its view and relay taps.
pub async fn handle_socket(state: SharedState, socket: WebSocket, player_id: Uuid) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing while we await inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let options = SyncOptions::from_tuning(&state.config().game);
    let handle = match synchronizer::attach(state.store().clone(), player_id, options).await {
        Ok(handle) => handle,
        Err(err) => {
            warn!(%player_id, error = %err, "failed to attach player session");
            let _ = send_message_to_websocket(
                &outbound_tx,
                &PlayerOutboundMessage::Error {
                    message: err.to_string(),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let attached = AttachedSession::register(&state, player_id);
    info!(%player_id, connection_id = %attached.connection_id, "player connected");

    if let Err(err) = serve(&handle, &outbound_tx, &mut receiver).await {
        debug!(%player_id, error = %err, "player socket loop ended");
    }

    drop(attached);
    let report = handle.detach().await;
    info!(
        %player_id,
        scored_taps = report.scored_taps,
        heartbeats = report.heartbeats,
        timers_left = report.timers.live(),
        "player disconnected"
    );

    finalize(writer_task, outbound_tx).await;
}

async fn serve(
    handle: &SyncHandle,
    outbound_tx: &mpsc::UnboundedSender<Message>,
    receiver: &mut futures::stream::SplitStream<WebSocket>,
) -> Result<(), PlayError> {
    let mut view = handle.view();
    let initial = view.borrow_and_update().clone();
    send_message_to_websocket(outbound_tx, &PlayerOutboundMessage::View(initial.into()))?;

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    info!(player_id = %handle.player_id(), "session ended by the store");
                    return Ok(());
                }
                let frame = view.borrow_and_update().clone();
                send_message_to_websocket(outbound_tx, &PlayerOutboundMessage::View(frame.into()))?;
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let reply = handle_text(handle, text.as_str()).await?;
                    send_message_to_websocket(outbound_tx, &reply)?;
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = outbound_tx.send(Message::Pong(payload));
                }
                Some(Ok(Message::Close(frame))) => {
                    let _ = outbound_tx.send(Message::Close(frame));
                    return Ok(());
                }
                Some(Ok(Message::Binary(_) | Message::Pong(_))) => {}
                Some(Err(err)) => {
                    warn!(player_id = %handle.player_id(), error = %err, "websocket error");
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }
}

/// Answer one inbound text frame.
async fn handle_text(handle: &SyncHandle, text: &str) -> Result<PlayerOutboundMessage, PlayError> {
    match serde_json::from_str::<PlayerInboundMessage>(text) {
        Ok(PlayerInboundMessage::Tap) => {
            let outcome = handle.tap().await?;
            Ok(PlayerOutboundMessage::TapResult(outcome.into()))
        }
        Ok(PlayerInboundMessage::Unknown) => Ok(PlayerOutboundMessage::Error {
            message: "unsupported message type".into(),
        }),
        Err(err) => {
            warn!(player_id = %handle.player_id(), error = %err, "failed to parse player message");
            Ok(PlayerOutboundMessage::Error {
                message: "malformed message".into(),
            })
        }
    }
}

/// Serialize a payload and push it onto the provided WebSocket sender.
///
/// Serialization failures are logged and swallowed; a closed writer is reported.
fn send_message_to_websocket<T>(
    tx: &mpsc::UnboundedSender<Message>,
    value: &T,
) -> Result<(), PlayError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| PlayError::ConnectionClosed)
}

async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::{AppConfig, GameTuning},
        dao::{
            models::NewPlayer,
            store::{SharedStore, memory::InMemoryStore},
        },
        services::{broadcaster::Broadcaster, notifier::LogNotifier},
        state::{AppState, phase::Phase},
    };

    async fn attached() -> SyncHandle {
        let store = InMemoryStore::new();
        let player = store
            .insert_player(NewPlayer {
                display_name: "ana".into(),
                email: "ana@example.com".into(),
                phone: None,
                full_name: None,
            })
            .await
            .unwrap();
        let store: Arc<dyn SharedStore> = Arc::new(store);
        synchronizer::attach(store, player.id, SyncOptions::from_tuning(&GameTuning::default()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn tap_frame_gets_a_tap_result() {
        let handle = attached().await;
        let reply = handle_text(&handle, r#"{"type":"tap"}"#).await.unwrap();
        match reply {
            PlayerOutboundMessage::TapResult(result) => {
                assert!(!result.applied);
                assert_eq!(result.ignored_in, Some(Phase::Waiting));
            }
            other => panic!("unexpected reply {other:?}"),
        }
        handle.detach().await;
    }

    #[tokio::test]
    async fn unknown_and_malformed_frames_get_errors() {
        let handle = attached().await;
        for text in [r#"{"type":"wave"}"#, "not json"] {
            let reply = handle_text(&handle, text).await.unwrap();
            assert!(matches!(reply, PlayerOutboundMessage::Error { .. }));
        }
        handle.detach().await;
    }

    #[tokio::test]
    async fn session_registry_entry_is_removed_on_drop() {
        let store: Arc<dyn SharedStore> = Arc::new(InMemoryStore::new());
        let config = Arc::new(AppConfig::default());
        let (broadcaster, _task) = Broadcaster::spawn(store.clone(), &config.game);
        let state = AppState::new(store, config, broadcaster, Arc::new(LogNotifier));

        let entry = AttachedSession::register(&state, Uuid::new_v4());
        assert_eq!(state.sessions().len(), 1);
        drop(entry);
        assert!(state.sessions().is_empty());
    }
}
