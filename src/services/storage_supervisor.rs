use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{
        document_store::DocumentStore,
        game::GameRepository,
        storage::{StorageError, StorageResult},
    },
    services::sse_events,
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the store, keep it healthy and hold the application in degraded
/// mode whenever it is unreachable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = StorageResult<Arc<dyn DocumentStore>>> + Send,
{
    let mut delay = INITIAL_DELAY;
    let mut seeded = false;

    loop {
        let store = match connect().await {
            Ok(store) => store,
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                continue;
            }
        };

        if let Err(err) = attach(&state, store.clone(), !seeded).await {
            warn!(error = %err, "storage bootstrap failed");
            sleep(delay).await;
            delay = (delay * 2).min(MAX_DELAY);
            continue;
        }
        seeded = true;
        delay = INITIAL_DELAY;

        loop {
            sleep(HEALTH_POLL_INTERVAL).await;
            if store.health_check().await.is_ok() {
                continue;
            }

            let mut reconnect_delay = INITIAL_DELAY;
            let mut reconnected = false;
            for attempt in 0..MAX_RECONNECT_ATTEMPTS {
                match store.try_reconnect().await {
                    Ok(()) => {
                        reconnected = true;
                        break;
                    }
                    Err(err) => {
                        if attempt == 0 {
                            warn!(attempt, error = %err, "storage reconnect first attempt failed; entering degraded mode");
                            set_degraded(&state, true);
                        } else {
                            warn!(attempt, error = %err, "storage reconnect attempt failed");
                        }
                        sleep(reconnect_delay).await;
                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                    }
                }
            }

            if !reconnected {
                warn!("exhausted storage reconnect attempts; staying in degraded mode");
                state.clear_store().await;
                break;
            }

            info!("storage reconnection succeeded after health check failure");
            // Pick up whatever other writers did while we were away.
            if let Err(err) = attach(&state, store.clone(), false).await {
                warn!(error = %err, "storage resync failed");
                state.clear_store().await;
                break;
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}

/// Load the persisted game and bank into memory, then install `store`.
///
/// A missing game document is created from the current in-memory state. A
/// malformed one is overwritten the same way. Re-attaching the same store
/// keeps every transition committed since the last attach.
pub async fn attach(
    state: &SharedState,
    store: Arc<dyn DocumentStore>,
    seed: bool,
) -> Result<(), StorageError> {
    let repository = GameRepository::new(store.clone());
    let game = state.resync_game(&repository).await?;

    if seed {
        let added = repository
            .seed_questions(&state.config().seed_bank())
            .await?;
        if added > 0 {
            info!(added, "seeded empty question bank");
        }
    }
    let questions = repository.list_questions().await?;
    let count = questions.len();

    state.replace_questions(questions).await;
    let was_degraded = state.is_degraded();
    state.install_store(store).await;
    if was_degraded {
        info!("storage connection established; leaving degraded mode");
        sse_events::broadcast_system_status(state, false);
    }

    sse_events::broadcast_questions_changed(state, count);
    sse_events::broadcast_game_state(state, &game).await;
    Ok(())
}

fn set_degraded(state: &SharedState, value: bool) {
    if state.update_degraded(value) {
        sse_events::broadcast_system_status(state, value);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            document_store::memory::MemoryStore,
            game::{GAME_DOC_ID, LoadedGame},
        },
        services::{player_service, round_service},
        state::{
            AppState,
            game::{GameState, Player, RoundPhase},
        },
    };

    #[tokio::test]
    async fn first_attach_seeds_and_creates_game() {
        let store = MemoryStore::new();
        let state = AppState::new(AppConfig::default());
        let mut public = state.public_sse().subscribe();

        attach(&state, Arc::new(store.clone()), true).await.unwrap();

        assert!(!state.is_degraded());
        assert_eq!(state.question_count().await, 4);
        let repo = GameRepository::new(Arc::new(store));
        assert!(matches!(repo.load_game().await.unwrap(), LoadedGame::Found { .. }));
        assert_eq!(
            public.try_recv().unwrap().event.as_deref(),
            Some("system.status")
        );
    }

    #[tokio::test]
    async fn attach_restores_persisted_game() {
        let store = MemoryStore::new();
        let repo = GameRepository::new(Arc::new(store.clone()));
        let mut persisted = GameState::new(30);
        persisted.players.insert("a".into(), Player::new("a", "Ada"));
        repo.save_game(&persisted, None).await.unwrap();

        let state = AppState::new(AppConfig::default());
        attach(&state, Arc::new(store), false).await.unwrap();

        assert_eq!(state.snapshot().await.state, persisted);
        assert_eq!(state.question_count().await, 0);
        // The stored revision was adopted, so the next write goes through.
        state.persist_game(&persisted).await.unwrap();
    }

    #[tokio::test]
    async fn malformed_game_is_replaced() {
        let store = MemoryStore::new();
        store
            .set(GAME_DOC_ID, json!({"players": "nope"}), None)
            .await
            .unwrap();

        let state = AppState::new(AppConfig::default());
        attach(&state, Arc::new(store.clone()), false).await.unwrap();

        let repo = GameRepository::new(Arc::new(store));
        assert!(matches!(
            repo.load_game().await.unwrap(),
            LoadedGame::Found { state, .. } if state == GameState::new(30)
        ));
    }

    #[tokio::test]
    async fn offline_store_fails_attach_and_stays_degraded() {
        let store = MemoryStore::new();
        store.set_offline(true);
        let state = AppState::new(AppConfig::default());

        assert!(attach(&state, Arc::new(store), true).await.is_err());
        assert!(state.is_degraded());
    }

    #[tokio::test]
    async fn reattach_keeps_committed_transitions() {
        let store = MemoryStore::new();
        let state = AppState::new(AppConfig::default());
        attach(&state, Arc::new(store.clone()), true).await.unwrap();
        player_service::join(&state, "Ada", Some("a".into()))
            .await
            .unwrap();
        assert!(round_service::buzz(&state, "a").await.unwrap().accepted);
        let committed = state.snapshot().await;

        attach(&state, Arc::new(store.clone()), false).await.unwrap();

        let after = state.snapshot().await;
        assert_eq!(after, committed);
        assert_eq!(
            after.state.round.phase,
            RoundPhase::PendingConfirmation {
                player_id: "a".into()
            }
        );
        // The revision was not rewound, so the next intent persists.
        round_service::confirm_correct(&state).await.unwrap();
        assert_eq!(state.question_count().await, 4);
    }
}
