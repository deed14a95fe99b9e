use std::{sync::Arc, time::Duration};

use rand::{SeedableRng, rngs::StdRng};
use tokio::{
    sync::watch,
    time::{sleep, timeout},
};

use tap_arena_back::{
    config::{AppConfig, GameTuning},
    dao::store::{SharedStore, memory::InMemoryStore},
    dto::player::{LoginRequest, RegisterRequest},
    error::ServiceError,
    services::{
        admin_service,
        broadcaster::Broadcaster,
        notifier::LogNotifier,
        player_service, public_service,
        synchronizer::{self, ClientView, SyncOptions},
    },
    state::{
        AppState,
        game::{Position, Signal},
        ledger::TapOutcome,
        phase::Phase,
    },
};

async fn wait_for(
    view: &mut watch::Receiver<ClientView>,
    predicate: impl FnMut(&ClientView) -> bool,
) -> ClientView {
    timeout(Duration::from_secs(60), view.wait_for(predicate))
        .await
        .expect("view never reached the expected state")
        .expect("session ended")
        .clone()
}

#[tokio::test(start_paused = true)]
async fn a_full_round_from_registration_to_final_scores() {
    let store = InMemoryStore::new();
    let shared: Arc<dyn SharedStore> = Arc::new(store.clone());
    let config = Arc::new(AppConfig {
        game: GameTuning {
            active_probability: 1.0,
            tick_interval: Some(Duration::from_millis(500)),
            ..GameTuning::default()
        },
        ..AppConfig::default()
    });
    let (broadcaster, _task) =
        Broadcaster::spawn_with_rng(shared.clone(), &config.game, StdRng::seed_from_u64(7));
    let state = AppState::new(shared.clone(), config.clone(), broadcaster, Arc::new(LogNotifier));

    let joined = player_service::register(
        &state,
        RegisterRequest {
            display_name: "Ana".into(),
            email: "ana@example.com".into(),
            phone: None,
            full_name: None,
        },
    )
    .await
    .unwrap();
    let player_id = joined.player_id;

    let session = synchronizer::attach(
        shared.clone(),
        player_id,
        SyncOptions::from_tuning(&config.game),
    )
    .await
    .unwrap();
    let mut view = session.view();
    assert_eq!(view.borrow().phase, Phase::Waiting);

    admin_service::start_countdown(&state).await.unwrap();
    let counting = wait_for(&mut view, |v| v.phase == Phase::Countdown).await;
    assert_eq!(counting.countdown, 5);

    sleep(Duration::from_secs(4)).await;
    let snapshot = state.broadcaster().snapshot().await.unwrap();
    assert_eq!(snapshot.phase, Phase::Countdown);

    wait_for(&mut view, |v| {
        v.phase == Phase::Playing && v.signal == Signal::Active
    })
    .await;

    let outcome = session.tap().await.unwrap();
    assert!(matches!(
        outcome,
        TapOutcome::Applied {
            delta: 1,
            score: 1,
            ..
        }
    ));

    wait_for(&mut view, |v| {
        v.leaderboard
            .first()
            .is_some_and(|row| row.player_id == player_id && row.score == 1)
    })
    .await;
    let board = public_service::get_leaderboard(&state).await.unwrap();
    assert_eq!(board.entries[0].score, 1);
    assert_eq!(board.entries[0].display_name, "Ana");

    admin_service::end_game(&state).await.unwrap();
    let ended = wait_for(&mut view, |v| v.phase == Phase::Ended).await;
    assert_eq!(ended.position, Position::ORIGIN);
    assert_eq!(ended.signal, Signal::Inactive);

    let ignored = session.tap().await.unwrap();
    assert_eq!(
        ignored,
        TapOutcome::Ignored {
            phase: Phase::Ended
        }
    );

    // Ticks stop with the round: the target stays parked.
    sleep(Duration::from_secs(10)).await;
    let settings = store.read_settings().await.unwrap();
    assert_eq!(settings.phase.value, Phase::Ended);
    assert_eq!(settings.position.value, Position::ORIGIN);
    let player = store.find_player(player_id).await.unwrap().unwrap();
    assert_eq!(player.score, 1);

    session.detach().await;
    assert_eq!(store.subscriptions().active(), 0);
}

#[tokio::test(start_paused = true)]
async fn a_second_device_is_locked_out_while_the_first_is_attached() {
    let store = InMemoryStore::new();
    let shared: Arc<dyn SharedStore> = Arc::new(store.clone());
    let config = Arc::new(AppConfig::default());
    let (broadcaster, _task) = Broadcaster::spawn(shared.clone(), &config.game);
    let state = AppState::new(shared.clone(), config.clone(), broadcaster, Arc::new(LogNotifier));

    let joined = player_service::register(
        &state,
        RegisterRequest {
            display_name: "Bo".into(),
            email: "bo@example.com".into(),
            phone: Some("555-0100".into()),
            full_name: Some("Bo Ferreira".into()),
        },
    )
    .await
    .unwrap();

    let session = synchronizer::attach(
        shared.clone(),
        joined.player_id,
        SyncOptions::from_tuning(&config.game),
    )
    .await
    .unwrap();
    // Let the first heartbeat land.
    sleep(Duration::from_secs(1)).await;

    let login = || LoginRequest {
        email: "bo@example.com".into(),
    };
    let err = player_service::login(&state, login()).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ActiveElsewhere { .. }
    ));

    // The lock is soft: detaching does not clear the heartbeat.
    session.detach().await;
    let err = player_service::login(&state, login()).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::ActiveElsewhere { .. }
    ));
}
