pub mod memory;
pub mod subscription;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{GameSettingsEntity, NewPlayer, PlayerEntity, PlayerPatch, SettingsPatch, Version},
    storage::StorageResult,
};

pub use self::subscription::{Notice, Subscription, Topic};

/// Durable shared state with change notifications.
///
/// Every write bumps a store-wide version and emits exactly one notification
/// to the subscribers whose [`Topic`] matches.
pub trait SharedStore: Send + Sync {
    fn read_settings(&self) -> BoxFuture<'static, StorageResult<GameSettingsEntity>>;
    fn write_settings(&self, patch: SettingsPatch) -> BoxFuture<'static, StorageResult<Version>>;
    fn insert_player(&self, player: NewPlayer) -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    fn find_player_by_email(
        &self,
        email: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Players in registration order.
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    fn write_player(
        &self,
        id: Uuid,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StorageResult<PlayerEntity>>;
    fn subscribe(&self, topic: Topic) -> StorageResult<Subscription>;
    /// Subscriptions opened and not yet dropped.
    fn active_subscriptions(&self) -> usize;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
}
