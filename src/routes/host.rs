use axum::{Json, Router, extract::State, routing::{get, post}};

use crate::{
    dto::game::HostGameSnapshot,
    error::AppError,
    services::{public_service, round_service},
    state::SharedState,
};

/// Host console endpoints adjudicating answers and driving rounds.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/host/state", get(get_state))
        .route("/host/round/correct", post(confirm_correct))
        .route("/host/round/incorrect", post(confirm_incorrect))
        .route("/host/round/advance", post(advance))
        .route("/host/game/reset", post(reset))
}

#[utoipa::path(
    get,
    path = "/host/state",
    operation_id = "get_host_state",
    tag = "host",
    responses((status = 200, description = "Current game snapshot with the answer", body = HostGameSnapshot))
)]
/// Return the current game snapshot, answer included.
pub async fn get_state(State(state): State<SharedState>) -> Json<HostGameSnapshot> {
    Json(public_service::host_state(&state).await)
}

#[utoipa::path(
    post,
    path = "/host/round/correct",
    tag = "host",
    responses(
        (status = 200, description = "Answer accepted, points awarded", body = HostGameSnapshot),
        (status = 409, description = "No answer awaiting confirmation"),
        (status = 503, description = "Store unavailable")
    )
)]
/// Accept the pending answer and award the points.
pub async fn confirm_correct(
    State(state): State<SharedState>,
) -> Result<Json<HostGameSnapshot>, AppError> {
    Ok(Json(round_service::confirm_correct(&state).await?))
}

#[utoipa::path(
    post,
    path = "/host/round/incorrect",
    tag = "host",
    responses(
        (status = 200, description = "Answer rejected, round re-opened or resolved", body = HostGameSnapshot),
        (status = 409, description = "No answer awaiting confirmation"),
        (status = 503, description = "Store unavailable")
    )
)]
/// Reject the pending answer.
pub async fn confirm_incorrect(
    State(state): State<SharedState>,
) -> Result<Json<HostGameSnapshot>, AppError> {
    Ok(Json(round_service::confirm_incorrect(&state).await?))
}

#[utoipa::path(
    post,
    path = "/host/round/advance",
    tag = "host",
    responses(
        (status = 200, description = "Next round opened", body = HostGameSnapshot),
        (status = 409, description = "Round not resolved yet"),
        (status = 503, description = "Store unavailable")
    )
)]
/// Move a resolved round to the next question.
pub async fn advance(
    State(state): State<SharedState>,
) -> Result<Json<HostGameSnapshot>, AppError> {
    Ok(Json(round_service::advance(&state).await?))
}

#[utoipa::path(
    post,
    path = "/host/game/reset",
    tag = "host",
    responses(
        (status = 200, description = "Scores zeroed, back on the first question", body = HostGameSnapshot),
        (status = 503, description = "Store unavailable")
    )
)]
/// Restart the game, keeping the registered players.
pub async fn reset(State(state): State<SharedState>) -> Result<Json<HostGameSnapshot>, AppError> {
    Ok(Json(round_service::reset(&state).await?))
}
