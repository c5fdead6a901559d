use crate::{
    dto::game::{HostGameSnapshot, PublicGameSnapshot, ScoreboardResponse},
    state::{SharedState, game::GameState},
};

/// Snapshot served to the shared screen and the players.
pub async fn public_state(state: &SharedState) -> PublicGameSnapshot {
    let game = state.snapshot().await.state;
    let count = state.question_count().await;
    let question = state.question_at(game.round.question_index).await;
    PublicGameSnapshot::build(&game, question.as_ref(), count)
}

/// Snapshot served to the host, answer included.
pub async fn host_state(state: &SharedState) -> HostGameSnapshot {
    let game = state.snapshot().await.state;
    host_snapshot_of(state, &game).await
}

/// Host projection of an already known game state.
pub async fn host_snapshot_of(state: &SharedState, game: &GameState) -> HostGameSnapshot {
    let count = state.question_count().await;
    let question = state.question_at(game.round.question_index).await;
    HostGameSnapshot::build(game, question.as_ref(), count)
}

/// Players sorted by descending score.
pub async fn scoreboard(state: &SharedState) -> ScoreboardResponse {
    let game = state.snapshot().await.state;
    ScoreboardResponse::from(&game)
}
