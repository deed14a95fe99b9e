//! Live event fan-out for the spectator screen and the controller.
//!
//! Each [`LiveFeed`] remembers the latest settings, leaderboard and status so a
//! stream opened mid-round starts from the current picture instead of waiting
//! for the next change.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::dto::sse::{LeaderboardEvent, LiveEvent, SettingsChangedEvent, SystemStatus};

/// Latest value of every event kind.
#[derive(Debug, Clone)]
struct Latest {
    settings: Option<SettingsChangedEvent>,
    leaderboard: Option<LeaderboardEvent>,
    status: SystemStatus,
}

impl Latest {
    fn record(&mut self, event: &LiveEvent) {
        match event {
            LiveEvent::Settings(change) => match &mut self.settings {
                Some(settings) => settings.absorb(change),
                slot @ None => *slot = Some(change.clone()),
            },
            LiveEvent::Leaderboard(board) => self.leaderboard = Some(board.clone()),
            LiveEvent::Status(status) => self.status = *status,
        }
    }

    fn events(&self) -> Vec<LiveEvent> {
        let mut events = vec![LiveEvent::Status(self.status)];
        events.extend(self.settings.clone().map(LiveEvent::Settings));
        events.extend(self.leaderboard.clone().map(LiveEvent::Leaderboard));
        events
    }
}

/// A fresh subscription: the replay to send first, then the live receiver.
pub struct FeedSubscription {
    pub replay: Vec<LiveEvent>,
    pub receiver: broadcast::Receiver<LiveEvent>,
}

/// Broadcast channel plus the latest value of each event kind.
pub struct LiveFeed {
    sender: broadcast::Sender<LiveEvent>,
    latest: watch::Sender<Latest>,
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        let (latest, _rx) = watch::channel(Latest {
            settings: None,
            leaderboard: None,
            status: SystemStatus { degraded: false },
        });
        Self { sender, latest }
    }

    /// Record `event` as the latest of its kind and send it to every subscriber.
    pub fn publish(&self, event: LiveEvent) {
        self.latest.send_modify(|latest| latest.record(&event));
        let _ = self.sender.send(event);
    }

    /// Subscribe, receiving the current picture as a replay.
    ///
    /// The receiver is opened before the replay is taken, so an event
    /// published in between can arrive twice but never goes missing.
    pub fn subscribe(&self) -> FeedSubscription {
        let receiver = self.sender.subscribe();
        FeedSubscription {
            replay: self.snapshot(),
            receiver,
        }
    }

    /// Current picture, used to catch up a lagging stream.
    pub fn snapshot(&self) -> Vec<LiveEvent> {
        self.latest.borrow().events()
    }
}

/// The single controller slot. Holding a [`ControllerLease`] occupies it.
#[derive(Clone)]
pub struct ControllerSeat {
    token: Arc<watch::Sender<Option<String>>>,
}

impl Default for ControllerSeat {
    fn default() -> Self {
        let (token, _rx) = watch::channel(None);
        Self {
            token: Arc::new(token),
        }
    }
}

impl ControllerSeat {
    /// Take the seat with a fresh token, unless a controller already holds it.
    pub fn claim(&self) -> Option<ControllerLease> {
        let token = Uuid::new_v4().simple().to_string();
        let claimed = self.token.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(token.clone());
            true
        });
        claimed.then(|| ControllerLease {
            seat: self.clone(),
            token,
        })
    }

    pub fn is_taken(&self) -> bool {
        self.token.borrow().is_some()
    }

    /// Whether `candidate` is the token of the current lease.
    pub fn admits(&self, candidate: &str) -> bool {
        self.token.borrow().as_deref() == Some(candidate)
    }
}

/// Occupancy of the controller seat; dropping it frees the seat.
pub struct ControllerLease {
    seat: ControllerSeat,
    token: String,
}

impl ControllerLease {
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Drop for ControllerLease {
    fn drop(&mut self) {
        self.seat.token.send_if_modified(|slot| {
            if slot.as_deref() != Some(self.token.as_str()) {
                return false;
            }
            *slot = None;
            true
        });
    }
}

/// Spectator and controller feeds plus the controller seat.
pub struct LiveStreams {
    pub spectators: LiveFeed,
    pub controller: LiveFeed,
    pub seat: ControllerSeat,
}

impl LiveStreams {
    pub fn new(capacity: usize) -> Self {
        Self {
            spectators: LiveFeed::new(capacity),
            controller: LiveFeed::new(capacity),
            seat: ControllerSeat::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::phase::Phase;

    fn settings(version: u64, phase: Option<Phase>) -> LiveEvent {
        LiveEvent::Settings(SettingsChangedEvent {
            version,
            phase,
            ..SettingsChangedEvent::default()
        })
    }

    #[tokio::test]
    async fn late_subscriber_starts_from_the_current_picture() {
        let feed = LiveFeed::new(4);
        let initial = feed.subscribe();
        assert_eq!(initial.replay.len(), 1);

        feed.publish(settings(3, Some(Phase::Countdown)));
        feed.publish(settings(4, None));
        feed.publish(LiveEvent::Status(SystemStatus { degraded: true }));

        let mut late = feed.subscribe();
        let names: Vec<_> = late.replay.iter().map(LiveEvent::name).collect();
        assert_eq!(names, ["system.status", "settings.changed"]);
        match &late.replay[1] {
            LiveEvent::Settings(folded) => {
                assert_eq!(folded.version, 4);
                assert_eq!(folded.phase, Some(Phase::Countdown));
            }
            other => panic!("unexpected replay {other:?}"),
        }
        assert!(matches!(
            late.replay[0],
            LiveEvent::Status(SystemStatus { degraded: true })
        ));

        feed.publish(settings(5, Some(Phase::Playing)));
        assert!(matches!(
            late.receiver.recv().await.unwrap(),
            LiveEvent::Settings(SettingsChangedEvent { version: 5, .. })
        ));
    }

    #[test]
    fn seat_holds_one_controller_until_the_lease_drops() {
        let seat = ControllerSeat::default();
        let lease = seat.claim().unwrap();
        assert!(seat.is_taken());
        assert!(seat.admits(lease.token()));
        assert!(!seat.admits("guess"));
        assert!(seat.claim().is_none());

        let stale = lease.token().to_string();
        drop(lease);
        assert!(!seat.is_taken());

        let next = seat.claim().unwrap();
        assert_ne!(next.token(), stale);
        assert!(!seat.admits(&stale));
    }
}
