pub mod arbitration;
/// Domain types of the game.
pub mod game;
mod sse;
/// Round lifecycle state machine.
pub mod state_machine;
/// Transition runner with persistence and fan-out.
pub mod transitions;

use std::{sync::Arc, time::Duration};

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    dao::{
        document_store::DocumentStore,
        game::{GameRepository, LoadedGame},
        storage::{StorageError, StorageResult},
    },
    error::ServiceError,
    state::game::{GameState, Question},
};

pub use self::sse::SseHub;
pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::{
    sse::SseState,
    state_machine::{GameEvent, GameStateMachine},
};

/// Reference-counted handle to [`AppState`].
pub type SharedState = Arc<AppState>;
/// Upper bound on the work of a single transition.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
/// Handle used to push messages to a connected player device.
pub struct PlayerConnection {
    /// Player the socket identified as.
    pub player_id: String,
    /// Writer channel of the socket.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: the authoritative game, its store and every subscriber.
pub struct AppState {
    config: AppConfig,
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    sse: SseState,
    connections: DashMap<String, PlayerConnection>,
    game: RwLock<GameStateMachine>,
    game_rev: Mutex<Option<String>>,
    questions: RwLock<Vec<Question>>,
    snapshots: watch::Sender<Snapshot>,
    degraded: watch::Sender<bool>,
    transition_gate: Mutex<()>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a store is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let machine = GameStateMachine::new(config.rules());
        let (snapshots, _rx) = watch::channel(machine.snapshot());
        let (degraded, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            store: RwLock::new(None),
            sse: SseState::new(64, 64),
            connections: DashMap::new(),
            game: RwLock::new(machine),
            game_rev: Mutex::new(None),
            questions: RwLock::new(Vec::new()),
            snapshots,
            degraded,
            transition_gate: Mutex::new(()),
            transition_timeout: Some(DEFAULT_TRANSITION_TIMEOUT),
        })
    }

    /// Settings the application was started with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Repository over the installed store, failing while degraded.
    pub async fn require_repository(&self) -> Result<GameRepository, ServiceError> {
        if self.is_degraded() {
            return Err(ServiceError::Degraded);
        }
        self.store()
            .await
            .map(GameRepository::new)
            .ok_or(ServiceError::Degraded)
    }

    /// Install a new store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update the degraded flag, returning whether it changed.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    /// Broadcast hub used for the public SSE stream.
    pub fn public_sse(&self) -> &SseHub {
        self.sse.public()
    }

    /// Broadcast hub used for the host SSE stream.
    pub fn host_sse(&self) -> &SseHub {
        self.sse.host()
    }

    /// Registry of connected player sockets keyed by player id.
    pub fn connections(&self) -> &DashMap<String, PlayerConnection> {
        &self.connections
    }

    /// Latest committed snapshot.
    pub async fn snapshot(&self) -> Snapshot {
        let sm = self.game.read().await;
        sm.snapshot()
    }

    /// Receiver woken after every committed transition.
    pub fn snapshot_watcher(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.subscribe()
    }

    /// Milliseconds since the current round opened.
    pub async fn round_elapsed_ms(&self) -> u64 {
        self.game.read().await.round_elapsed_ms()
    }

    /// Cached question bank, oldest first.
    pub async fn questions(&self) -> Vec<Question> {
        self.questions.read().await.clone()
    }

    /// Number of cached questions.
    pub async fn question_count(&self) -> usize {
        self.questions.read().await.len()
    }

    /// Question at `index`, if the bank is large enough.
    pub async fn question_at(&self, index: usize) -> Option<Question> {
        self.questions.read().await.get(index).cloned()
    }

    /// Replace the cached bank, waking the timer driver when it changed.
    pub async fn replace_questions(&self, questions: Vec<Question>) {
        let changed = {
            let mut guard = self.questions.write().await;
            let changed = *guard != questions;
            *guard = questions;
            changed
        };
        if changed {
            self.snapshots.send_modify(|_| {});
        }
    }

    /// Replace the authoritative state with one read back from the store.
    pub async fn restore_game(&self, state: GameState, rev: Option<String>) {
        let _gate = self.transition_gate.lock().await;
        self.restore_committed(state).await;
        *self.game_rev.lock().await = rev;
    }

    /// Reconcile the committed game with the persisted `game::main`.
    ///
    /// Holds the transition gate from the read to the restore, so no
    /// transition can commit in between. A document still at our own revision
    /// is left alone. A missing or malformed one is overwritten with the
    /// committed state.
    pub async fn resync_game(&self, repository: &GameRepository) -> StorageResult<GameState> {
        let _gate = self.transition_gate.lock().await;
        let mut rev = self.game_rev.lock().await;

        match repository.load_game().await? {
            LoadedGame::Found {
                state: game,
                rev: stored,
            } => {
                if rev.as_deref() == Some(stored.as_str()) {
                    debug!(rev = %stored, "persisted game already matches committed state");
                    return Ok(self.snapshot().await.state);
                }
                info!(players = game.players.len(), round = game.round.round, "restored persisted game");
                self.restore_committed(game.clone()).await;
                *rev = Some(stored);
                Ok(game)
            }
            LoadedGame::Missing => {
                let game = self.snapshot().await.state;
                *rev = Some(repository.save_game(&game, None).await?);
                info!("created game document");
                Ok(game)
            }
            LoadedGame::Malformed { rev: stored } => {
                warn!(rev = %stored, "replacing malformed game document");
                let game = self.snapshot().await.state;
                *rev = Some(repository.save_game(&game, Some(stored)).await?);
                Ok(game)
            }
        }
    }

    /// Caller holds the transition gate.
    async fn restore_committed(&self, state: GameState) {
        let snapshot = {
            let mut sm = self.game.write().await;
            sm.restore(state);
            sm.snapshot()
        };
        self.snapshots.send_replace(snapshot);
    }

    /// Persist `next` with a conditional write against the last known revision.
    pub async fn persist_game(&self, next: &GameState) -> Result<(), ServiceError> {
        let repository = self.require_repository().await?;
        let mut rev = self.game_rev.lock().await;

        match repository.save_game(next, rev.clone()).await {
            Ok(new_rev) => {
                *rev = Some(new_rev);
                Ok(())
            }
            Err(StorageError::Conflict { doc_id }) => {
                // Pick up the foreign revision so the next intent can go through.
                match repository.load_game().await {
                    Ok(loaded) => *rev = loaded_rev(loaded),
                    Err(err) => warn!(error = %err, "failed to refresh game revision"),
                }
                warn!(doc_id = %doc_id, "game document changed concurrently");
                Err(StorageError::Conflict { doc_id }.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Plan a transition to the shared game state machine, returning the plan.
    async fn plan_transition(&self, event: GameEvent) -> Result<Plan, PlanError> {
        let mut sm = self.game.write().await;
        sm.plan(event)
    }

    /// Apply the planned transition to the shared game state machine, returning the new state.
    async fn apply_planned_transition(&self, plan_id: PlanId) -> Result<Snapshot, ApplyError> {
        let mut sm = self.game.write().await;
        sm.apply(plan_id)?;
        Ok(sm.snapshot())
    }

    /// Abort a planned transition of the shared game state machine.
    async fn abort_transition(&self, plan_id: PlanId) -> Result<(), AbortError> {
        let mut sm = self.game.write().await;
        sm.abort(plan_id)
    }

    /// Plan `event`, run `work` against the planned state, then apply or abort.
    ///
    /// Only one transition runs at a time. A failing or timed-out `work`
    /// leaves the committed state untouched.
    pub async fn run_transition<F, Fut, T>(
        &self,
        event: GameEvent,
        work: F,
    ) -> Result<(T, GameState), ServiceError>
    where
        F: FnOnce(GameState) -> Fut,
        Fut: std::future::Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.transition_gate.lock().await;
        let Plan {
            id: plan_id, next, ..
        } = self.plan_transition(event.clone()).await?;

        let work_future = work(next);
        let outcome = if let Some(limit) = self.transition_timeout {
            match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = self.abort_transition(plan_id).await {
                        warn!(
                            event = ?event,
                            plan_id = %plan_id,
                            error = ?abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    drop(gate);
                    return Err(ServiceError::Timeout);
                }
            }
        } else {
            work_future.await
        };

        match outcome {
            Ok(value) => {
                let snapshot = self.apply_planned_transition(plan_id).await?;
                debug!(event = ?event, version = snapshot.version, "transition applied");
                let state = snapshot.state.clone();
                self.snapshots.send_replace(snapshot);
                drop(gate);
                Ok((value, state))
            }
            Err(err) => {
                if let Err(abort_err) = self.abort_transition(plan_id).await {
                    warn!(
                        event = ?event,
                        plan_id = %plan_id,
                        error = ?abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }
}

fn loaded_rev(loaded: LoadedGame) -> Option<String> {
    match loaded {
        LoadedGame::Missing => None,
        LoadedGame::Found { rev, .. } | LoadedGame::Malformed { rev } => Some(rev),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::document_store::memory::MemoryStore,
        state::game::{BuzzRecord, Player, RoundPhase},
    };

    async fn state_with_store() -> (SharedState, MemoryStore) {
        let store = MemoryStore::new();
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(store.clone())).await;
        (state, store)
    }

    #[tokio::test]
    async fn committed_transition_is_persisted_and_published() {
        let (state, _store) = state_with_store().await;
        let mut watcher = state.snapshot_watcher();

        let (_, next) = state
            .run_transition(GameEvent::PlayerJoined(Player::new("a", "Ada")), |next| {
                let state = state.clone();
                async move { state.persist_game(&next).await }
            })
            .await
            .unwrap();

        assert!(next.players.contains_key("a"));
        assert!(watcher.has_changed().unwrap());
        assert_eq!(watcher.borrow_and_update().version, 1);

        let repo = state.require_repository().await.unwrap();
        assert!(matches!(
            repo.load_game().await.unwrap(),
            LoadedGame::Found { state: stored, .. } if stored == next
        ));
    }

    #[tokio::test]
    async fn failed_work_aborts_and_keeps_state() {
        let (state, store) = state_with_store().await;
        store.set_offline(true);

        let err = state
            .run_transition(GameEvent::Tick, |next| {
                let state = state.clone();
                async move { state.persist_game(&next).await }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));

        let snapshot = state.snapshot().await;
        assert_eq!(snapshot.version, 0);
        assert_eq!(snapshot.state.round.timer, 30);

        // The machine accepts new plans after the abort.
        store.set_offline(false);
        state
            .run_transition(GameEvent::Tick, |_| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(state.snapshot().await.state.round.timer, 29);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_work_times_out() {
        let (state, _store) = state_with_store().await;
        let err = state
            .run_transition(GameEvent::Tick, |_| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Timeout));
        assert_eq!(state.snapshot().await.version, 0);
    }

    #[tokio::test]
    async fn degraded_state_rejects_persistence() {
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded());
        assert!(matches!(
            state.persist_game(&GameState::new(30)).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn foreign_write_surfaces_conflict_once() {
        let (state, store) = state_with_store().await;
        state.persist_game(&GameState::new(30)).await.unwrap();

        let mut foreign = GameState::new(30);
        foreign.round.phase = RoundPhase::PendingConfirmation {
            player_id: "x".into(),
        };
        foreign.round.buzzes.push(BuzzRecord {
            player_id: "x".into(),
            at_ms: 1,
        });
        GameRepository::new(Arc::new(store))
            .save_game(&foreign, None)
            .await
            .unwrap();

        let err = state.persist_game(&GameState::new(30)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(state.persist_game(&GameState::new(30)).await.is_ok());
    }

    #[tokio::test]
    async fn restore_replaces_committed_state() {
        let state = AppState::new(AppConfig::default());
        let mut restored = GameState::new(30);
        restored.players.insert("b".into(), Player::new("b", "Bob"));
        state.restore_game(restored.clone(), Some("4-abc".into())).await;
        assert_eq!(state.snapshot().await.state, restored);
    }

    #[tokio::test(start_paused = true)]
    async fn resync_waits_for_in_flight_transition() {
        let (state, _store) = state_with_store().await;
        state.persist_game(&GameState::new(30)).await.unwrap();

        let in_flight = tokio::spawn({
            let state = state.clone();
            async move {
                state
                    .run_transition(GameEvent::PlayerJoined(Player::new("a", "Ada")), |next| {
                        let state = state.clone();
                        async move {
                            tokio::time::sleep(Duration::from_secs(1)).await;
                            state.persist_game(&next).await
                        }
                    })
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let repo = state.require_repository().await.unwrap();
        let resynced = state.resync_game(&repo).await.unwrap();
        in_flight.await.unwrap().unwrap();

        assert!(resynced.players.contains_key("a"));
        let snapshot = state.snapshot().await;
        assert!(snapshot.state.players.contains_key("a"));
        // Our own revision was found, so nothing was restored.
        assert_eq!(snapshot.version, 1);
        state.persist_game(&snapshot.state).await.unwrap();
    }

    #[tokio::test]
    async fn resync_adopts_foreign_game() {
        let (state, store) = state_with_store().await;
        state.persist_game(&GameState::new(30)).await.unwrap();

        let mut foreign = GameState::new(30);
        foreign.players.insert("z".into(), Player::new("z", "Zed"));
        let repo = GameRepository::new(Arc::new(store));
        repo.save_game(&foreign, None).await.unwrap();

        assert_eq!(state.resync_game(&repo).await.unwrap(), foreign);
        assert_eq!(state.snapshot().await.state, foreign);
        state.persist_game(&foreign).await.unwrap();
    }
}
