use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::game::{PublicGameSnapshot, ScoreboardResponse},
    services::public_service,
    state::SharedState,
};

/// Read-only endpoints for the shared screen and the players.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/state", get(get_state))
        .route("/public/scoreboard", get(get_scoreboard))
}

#[utoipa::path(
    get,
    path = "/public/state",
    operation_id = "get_public_state",
    tag = "public",
    responses((status = 200, description = "Current game snapshot without answers", body = PublicGameSnapshot))
)]
/// Return the current game snapshot.
pub async fn get_state(State(state): State<SharedState>) -> Json<PublicGameSnapshot> {
    Json(public_service::public_state(&state).await)
}

#[utoipa::path(
    get,
    path = "/public/scoreboard",
    tag = "public",
    responses((status = 200, description = "Players by descending score", body = ScoreboardResponse))
)]
/// Scoreboard by descending score.
pub async fn get_scoreboard(State(state): State<SharedState>) -> Json<ScoreboardResponse> {
    Json(public_service::scoreboard(&state).await)
}
