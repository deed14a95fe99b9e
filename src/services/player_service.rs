//! Registration and login of players.

use std::time::SystemTime;

use tracing::info;

use crate::{
    dao::models::NewPlayer,
    dto::player::{JoinResponse, LoginRequest, RegisterRequest},
    error::ServiceError,
    services::{
        notifier::{self, JoinLinkMessage},
        session_guard::SessionGuard,
    },
    state::SharedState,
};

fn guard(state: &SharedState) -> SessionGuard {
    SessionGuard::new(state.config().game.presence_threshold)
}

/// Insert a new player and mail them their join link.
///
/// A fresh player has no heartbeat yet, so the presence lock only applies to
/// [`login`]. A second registration with the same email is rejected as a
/// duplicate even while the first device is attached.
pub async fn register(
    state: &SharedState,
    request: RegisterRequest,
) -> Result<JoinResponse, ServiceError> {
    let player = state
        .store()
        .insert_player(NewPlayer {
            display_name: request.display_name.trim().to_string(),
            email: request.email,
            phone: request
                .phone
                .map(|phone| phone.trim().to_string())
                .filter(|phone| !phone.is_empty()),
            full_name: request
                .full_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
        })
        .await?;

    let join_link = state.config().join_link(player.id);
    info!(player_id = %player.id, "player registered");

    notifier::dispatch(
        state.notifier(),
        JoinLinkMessage {
            to: player.email.clone(),
            display_name: player.display_name.clone(),
            link: join_link.clone(),
        },
    );

    Ok(JoinResponse {
        player_id: player.id,
        join_link,
    })
}

/// Resume an existing player by email, unless another device holds the session.
pub async fn login(state: &SharedState, request: LoginRequest) -> Result<JoinResponse, ServiceError> {
    let player = state
        .store()
        .find_player_by_email(request.email)
        .await?
        .ok_or_else(|| ServiceError::NotFound("email not found; register first".into()))?;

    guard(state).admit(&player, SystemTime::now())?;
    info!(player_id = %player.id, "player logged in");

    Ok(JoinResponse {
        player_id: player.id,
        join_link: state.config().join_link(player.id),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::PlayerPatch,
            store::{SharedStore, memory::InMemoryStore},
        },
        services::{broadcaster::Broadcaster, notifier::LogNotifier},
        state::AppState,
    };

    async fn setup() -> (SharedState, InMemoryStore) {
        let store = InMemoryStore::new();
        let shared: Arc<dyn SharedStore> = Arc::new(store.clone());
        let config = Arc::new(AppConfig::default());
        let (broadcaster, _task) = Broadcaster::spawn(shared.clone(), &config.game);
        let state = AppState::new(shared, config, broadcaster, Arc::new(LogNotifier));
        (state, store)
    }

    fn ana() -> RegisterRequest {
        RegisterRequest {
            display_name: "  Ana ".into(),
            email: "ana@example.com".into(),
            phone: Some("".into()),
            full_name: Some(" Ana Lima ".into()),
        }
    }

    #[tokio::test]
    async fn register_returns_a_join_link() {
        let (state, store) = setup().await;
        let joined = register(&state, ana()).await.unwrap();

        assert!(joined.join_link.ends_with(&format!("/game?id={}", joined.player_id)));
        let stored = store.find_player(joined.player_id).await.unwrap().unwrap();
        assert_eq!(stored.display_name, "Ana");
        assert_eq!(stored.phone, None);
        assert_eq!(stored.full_name.as_deref(), Some("Ana Lima"));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_even_while_attached() {
        let (state, store) = setup().await;
        let joined = register(&state, ana()).await.unwrap();
        let err = register(&state, ana()).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateRegistration(_)));

        store
            .write_player(joined.player_id, PlayerPatch::seen(SystemTime::now()))
            .await
            .unwrap();
        let err = register(&state, ana()).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateRegistration(_)));
    }

    #[tokio::test]
    async fn login_honours_the_presence_lock() {
        let (state, store) = setup().await;
        let joined = register(&state, ana()).await.unwrap();

        let request = || LoginRequest {
            email: "ANA@example.com".into(),
        };
        assert_eq!(login(&state, request()).await.unwrap().player_id, joined.player_id);

        store
            .write_player(joined.player_id, PlayerPatch::seen(SystemTime::now()))
            .await
            .unwrap();
        let err = login(&state, request()).await.unwrap_err();
        assert!(matches!(err, ServiceError::ActiveElsewhere { .. }));
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let (state, _store) = setup().await;
        let err = login(
            &state,
            LoginRequest {
                email: "nobody@example.com".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
