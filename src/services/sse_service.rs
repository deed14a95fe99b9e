//! SSE responses for the live screen and the controller.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use serde::Serialize;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::sse::{AdminHandshake, LiveEvent},
    error::ServiceError,
    state::{
        AppState, SharedState,
        sse::{ControllerLease, FeedSubscription, LiveFeed},
    },
};

const CLIENT_BUFFER: usize = 8;
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const EVENT_ADMIN_TOKEN: &str = "admin_token";

/// SSE response produced for both audiences.
pub type LiveSse = Sse<KeepAliveStream<ReceiverStream<Result<Event, Infallible>>>>;

enum Audience {
    Spectator,
    /// The lease is released when the stream's forwarder ends.
    Controller(ControllerLease),
}

impl Audience {
    fn feed<'a>(&self, state: &'a AppState) -> &'a LiveFeed {
        match self {
            Audience::Spectator => state.spectator_feed(),
            Audience::Controller(_) => state.controller_feed(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Audience::Spectator => "spectator",
            Audience::Controller(_) => "controller",
        }
    }
}

/// Open a live-screen stream.
pub fn spectator_stream(state: SharedState) -> LiveSse {
    open(state, Audience::Spectator, None)
}

/// Open the controller stream, taking the single controller seat.
///
/// The first event carries the token the admin routes expect in `X-Admin-Token`.
pub fn controller_stream(state: SharedState) -> Result<LiveSse, ServiceError> {
    let lease = state.controller_seat().claim().ok_or_else(|| {
        ServiceError::Unauthorized("another controller stream is already open".into())
    })?;
    let handshake = to_event(
        EVENT_ADMIN_TOKEN,
        &AdminHandshake {
            token: lease.token().to_string(),
        },
    );
    Ok(open(state, Audience::Controller(lease), handshake))
}

fn open(state: SharedState, audience: Audience, greeting: Option<Event>) -> LiveSse {
    let subscription = audience.feed(&state).subscribe();
    let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
    tokio::spawn(forward(state, audience, greeting, subscription, tx));

    Sse::new(ReceiverStream::new(rx)).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

/// Greeting, then the current picture, then live events until the client leaves.
async fn forward(
    state: SharedState,
    audience: Audience,
    greeting: Option<Event>,
    subscription: FeedSubscription,
    tx: mpsc::Sender<Result<Event, Infallible>>,
) {
    let FeedSubscription {
        replay,
        mut receiver,
    } = subscription;
    info!(audience = audience.label(), "live stream opened");

    let opening = greeting
        .into_iter()
        .chain(replay.iter().filter_map(to_sse_event));
    if send_all(&tx, opening).await {
        loop {
            let batch = tokio::select! {
                _ = tx.closed() => break,
                received = receiver.recv() => match received {
                    Ok(event) => vec![event],
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, audience = audience.label(), "live stream lagged; resending current picture");
                        audience.feed(&state).snapshot()
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            if !send_all(&tx, batch.iter().filter_map(to_sse_event)).await {
                break;
            }
        }
    }

    info!(audience = audience.label(), "live stream closed");
}

async fn send_all(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    events: impl IntoIterator<Item = Event>,
) -> bool {
    for event in events {
        if tx.send(Ok(event)).await.is_err() {
            return false;
        }
    }
    true
}

fn to_sse_event(event: &LiveEvent) -> Option<Event> {
    match event {
        LiveEvent::Settings(payload) => to_event(event.name(), payload),
        LiveEvent::Leaderboard(payload) => to_event(event.name(), payload),
        LiveEvent::Status(payload) => to_event(event.name(), payload),
    }
}

fn to_event(name: &'static str, payload: &impl Serialize) -> Option<Event> {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "failed to serialize live event");
            None
        }
    }
}
