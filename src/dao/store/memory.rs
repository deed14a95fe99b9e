//! In-process implementation of [`SharedStore`] backed by a broadcast change feed.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::SystemTime,
};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use crate::dao::{
    models::{
        ChangeEvent, GameSettingsEntity, NewPlayer, PlayerEntity, PlayerPatch, SettingsChange,
        SettingsPatch, Version,
    },
    storage::{StorageError, StorageResult},
    store::{
        SharedStore,
        subscription::{Subscription, SubscriptionRegistry, Topic},
    },
};

const DEFAULT_FEED_CAPACITY: usize = 1024;

/// Shared state store living in the server process.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

struct Inner {
    settings: RwLock<GameSettingsEntity>,
    players: RwLock<IndexMap<Uuid, PlayerEntity>>,
    version: AtomicU64,
    next_seq: AtomicU64,
    feed: broadcast::Sender<ChangeEvent>,
    subscriptions: Arc<SubscriptionRegistry>,
    online: AtomicBool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store with the default change feed capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Empty store whose change feed buffers `capacity` notifications per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        let (feed, _rx) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                settings: RwLock::new(GameSettingsEntity::default()),
                players: RwLock::new(IndexMap::new()),
                version: AtomicU64::new(0),
                next_seq: AtomicU64::new(0),
                feed,
                subscriptions: Arc::new(SubscriptionRegistry::default()),
                online: AtomicBool::new(true),
            }),
        }
    }

    /// Simulate losing or regaining connectivity to the backing store.
    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::SeqCst);
    }

    /// Live subscription bookkeeping.
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.inner.subscriptions
    }
}

impl Inner {
    fn ensure_online(&self) -> StorageResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::unavailable(
                "in-memory store offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "store offline"),
            ))
        }
    }

    fn next_version(&self) -> Version {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, event: ChangeEvent) {
        // No receivers is fine: nobody is attached yet.
        let _ = self.feed.send(event);
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl SharedStore for InMemoryStore {
    fn read_settings(&self) -> BoxFuture<'static, StorageResult<GameSettingsEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            Ok(inner.settings.read().await.clone())
        })
    }

    fn write_settings(&self, patch: SettingsPatch) -> BoxFuture<'static, StorageResult<Version>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            let mut settings = inner.settings.write().await;
            let version = inner.next_version();
            settings.apply(&patch, version);
            // Published under the lock so notification order matches write order.
            inner.publish(ChangeEvent::Settings(SettingsChange { version, patch }));
            Ok(version)
        })
    }

    fn insert_player(&self, player: NewPlayer) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            let email = normalize_email(&player.email);
            let mut players = inner.players.write().await;
            if players.values().any(|existing| existing.email == email) {
                return Err(StorageError::DuplicateEmail(email));
            }

            let entity = PlayerEntity {
                id: Uuid::new_v4(),
                display_name: player.display_name,
                email,
                phone: player.phone,
                full_name: player.full_name,
                score: 0,
                last_seen_at: None,
                registered_at: SystemTime::now(),
                registration_seq: inner.next_seq.fetch_add(1, Ordering::SeqCst),
                version: inner.next_version(),
            };
            players.insert(entity.id, entity.clone());
            inner.publish(ChangeEvent::Player(entity.clone()));
            debug!(player_id = %entity.id, "player inserted");
            Ok(entity)
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            Ok(inner.players.read().await.get(&id).cloned())
        })
    }

    fn find_player_by_email(
        &self,
        email: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            let email = normalize_email(&email);
            Ok(inner
                .players
                .read()
                .await
                .values()
                .find(|player| player.email == email)
                .cloned())
        })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            Ok(inner.players.read().await.values().cloned().collect())
        })
    }

    fn write_player(
        &self,
        id: Uuid,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.ensure_online()?;
            let mut players = inner.players.write().await;
            let player = players
                .get_mut(&id)
                .ok_or(StorageError::PlayerNotFound(id))?;

            if let Some(score) = patch.score {
                player.score = score;
            }
            if let Some(seen) = patch.last_seen_at {
                player.last_seen_at = Some(player.last_seen_at.map_or(seen, |prev| prev.max(seen)));
            }
            player.version = inner.next_version();

            let updated = player.clone();
            inner.publish(ChangeEvent::Player(updated.clone()));
            Ok(updated)
        })
    }

    fn subscribe(&self, topic: Topic) -> StorageResult<Subscription> {
        self.inner.ensure_online()?;
        Ok(Subscription::open(
            topic,
            self.inner.feed.subscribe(),
            self.inner.subscriptions.clone(),
        ))
    }

    fn active_subscriptions(&self) -> usize {
        self.inner.subscriptions.active()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.ensure_online() })
    }
}
