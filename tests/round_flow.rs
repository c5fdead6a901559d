use std::{sync::Arc, time::Duration};

use buzzer_beater_back::{
    config::AppConfig,
    dao::{
        document_store::memory::MemoryStore,
        game::{GameRepository, LoadedGame},
    },
    dto::player::BuzzRejectionReason,
    error::ServiceError,
    services::{player_service, public_service, round_service, storage_supervisor, timer_service},
    state::{
        AppState, SharedState,
        game::{BuzzRecord, RoundPhase},
    },
};

async fn started(store: &MemoryStore) -> SharedState {
    let state = AppState::new(AppConfig::default());
    storage_supervisor::attach(&state, Arc::new(store.clone()), true)
        .await
        .unwrap();
    for id in ["a", "b", "c"] {
        player_service::join(&state, &id.to_uppercase(), Some(id.into()))
            .await
            .unwrap();
    }
    state
}

#[tokio::test(start_paused = true)]
async fn buzz_confirm_and_automatic_advance() {
    let store = MemoryStore::new();
    let state = started(&store).await;
    tokio::spawn(timer_service::run(state.clone()));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let ack = round_service::buzz(&state, "b").await.unwrap();
    assert!(ack.accepted);

    let round = state.snapshot().await.state.round;
    assert_eq!(
        round.phase,
        RoundPhase::PendingConfirmation {
            player_id: "b".into()
        }
    );
    assert_eq!(
        round.buzzes,
        vec![BuzzRecord {
            player_id: "b".into(),
            at_ms: 5_000
        }]
    );

    let late = round_service::buzz(&state, "a").await.unwrap();
    assert_eq!(late.reason, Some(BuzzRejectionReason::RoundAlreadyClaimed));

    let host = round_service::confirm_correct(&state).await.unwrap();
    assert!(host.public.celebrate);
    let scores: Vec<(String, u32)> = public_service::scoreboard(&state)
        .await
        .players
        .into_iter()
        .map(|player| (player.id, player.score))
        .collect();
    assert_eq!(
        scores,
        vec![("b".into(), 10), ("a".into(), 0), ("c".into(), 0)]
    );
    assert_eq!(
        state.snapshot().await.state.round.phase,
        RoundPhase::Resolved {
            winner: Some("b".into())
        }
    );

    tokio::time::sleep(Duration::from_millis(3_100)).await;
    let round = state.snapshot().await.state.round;
    assert_eq!(round.round, 1);
    assert_eq!(round.question_index, 1);
    assert_eq!(round.timer, 30);
    assert_eq!(round.phase, RoundPhase::Active);
    assert!(round.buzzes.is_empty());

    // Every committed transition reached the store.
    let committed = state.snapshot().await.state;
    let repo = GameRepository::new(Arc::new(store));
    assert!(matches!(
        repo.load_game().await.unwrap(),
        LoadedGame::Found { state: persisted, .. } if persisted == committed
    ));
}

#[tokio::test]
async fn wrong_answers_reopen_until_nobody_is_left() {
    let store = MemoryStore::new();
    let state = started(&store).await;

    for id in ["a", "b", "c"] {
        assert!(round_service::buzz(&state, id).await.unwrap().accepted);
        round_service::confirm_incorrect(&state).await.unwrap();
    }

    let game = state.snapshot().await.state;
    assert_eq!(game.round.phase, RoundPhase::Resolved { winner: None });
    assert!(game.players.values().all(|player| player.score == 0));

    let again = round_service::buzz(&state, "a").await.unwrap();
    assert_eq!(again.reason, Some(BuzzRejectionReason::RoundOver));
}

#[tokio::test]
async fn unreachable_store_rejects_intents_and_keeps_state() {
    let store = MemoryStore::new();
    let state = started(&store).await;
    let before = state.snapshot().await;

    store.set_offline(true);
    assert!(matches!(
        round_service::buzz(&state, "a").await,
        Err(ServiceError::Unavailable(_))
    ));
    assert_eq!(state.snapshot().await, before);

    store.set_offline(false);
    assert!(round_service::buzz(&state, "a").await.unwrap().accepted);
}

#[tokio::test]
async fn reset_keeps_players_and_zeroes_scores() {
    let store = MemoryStore::new();
    let state = started(&store).await;
    round_service::buzz(&state, "c").await.unwrap();
    round_service::confirm_correct(&state).await.unwrap();
    round_service::advance(&state).await.unwrap();

    let host = round_service::reset(&state).await.unwrap();
    assert_eq!(host.public.question_index, 0);
    assert_eq!(host.public.players.len(), 3);
    assert!(host.public.players.iter().all(|player| player.score == 0));
}
