use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::dao::models::ChangeEvent;

/// Equality filter selecting which change notifications a subscriber receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every write to the settings singleton.
    Settings,
    /// Every insert or update in the player collection.
    Players,
    /// Writes to a single player record.
    Player(Uuid),
}

impl Topic {
    /// Whether `event` passes this filter.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        match (self, event) {
            (Topic::Settings, ChangeEvent::Settings(_)) => true,
            (Topic::Players, ChangeEvent::Player(_)) => true,
            (Topic::Player(id), ChangeEvent::Player(player)) => player.id == *id,
            _ => false,
        }
    }
}

/// Outcome of waiting on a subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// A matching change.
    Change(ChangeEvent),
    /// Notifications were dropped; the subscriber must refetch.
    Resync {
        /// Number of skipped notifications (all topics).
        missed: u64,
    },
    /// The store shut down its change feed.
    Closed,
}

/// Bookkeeping of live subscriptions so teardown can be observed.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    live: DashMap<u64, Topic>,
}

impl SubscriptionRegistry {
    fn register(&self, topic: Topic) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.live.insert(id, topic);
        id
    }

    fn release(&self, id: u64) {
        self.live.remove(&id);
    }

    /// Number of subscriptions not yet released.
    pub fn active(&self) -> usize {
        self.live.len()
    }

    /// Number of live subscriptions on `topic`.
    pub fn active_on(&self, topic: &Topic) -> usize {
        self.live.iter().filter(|entry| entry.value() == topic).count()
    }
}

/// Filtered handle on the store change feed; dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    topic: Topic,
    receiver: broadcast::Receiver<ChangeEvent>,
    registry: Arc<SubscriptionRegistry>,
}

impl Subscription {
    /// Register a new subscriber on `topic`.
    pub fn open(
        topic: Topic,
        receiver: broadcast::Receiver<ChangeEvent>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        let id = registry.register(topic);
        Self {
            id,
            topic,
            receiver,
            registry,
        }
    }

    /// Wait for the next matching notification.
    pub async fn next(&mut self) -> Notice {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.topic.matches(&event) => return Notice::Change(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => return Notice::Resync { missed },
                Err(RecvError::Closed) => return Notice::Closed,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}
