use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use axum_valid::Valid;

use crate::{
    dto::player::{BuzzAck, JoinRequest, JoinResponse},
    error::AppError,
    services::{player_service, round_service},
    state::SharedState,
};

/// Player-facing endpoints: joining and buzzing without a socket.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", post(join))
        .route("/players/{id}/buzz", post(buzz))
}

#[utoipa::path(
    post,
    path = "/players",
    tag = "players",
    request_body = JoinRequest,
    responses(
        (status = 201, description = "New player created", body = JoinResponse),
        (status = 200, description = "Device re-associated with its player", body = JoinResponse),
        (status = 400, description = "Invalid name or device id"),
        (status = 409, description = "Player id already taken"),
        (status = 503, description = "Store unavailable")
    )
)]
/// Join the game, or re-associate a known device with its player.
pub async fn join(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<JoinRequest>>,
) -> Result<(StatusCode, Json<JoinResponse>), AppError> {
    let response = player_service::join(&state, &payload.name, payload.device_id).await?;
    let status = if response.rejoined {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(response)))
}

#[utoipa::path(
    post,
    path = "/players/{id}/buzz",
    tag = "players",
    params(("id" = String, Path, description = "Player identifier")),
    responses(
        (status = 200, description = "Buzz acknowledgement, positive or negative", body = BuzzAck),
        (status = 503, description = "Store unavailable")
    )
)]
/// Claim the current round.
pub async fn buzz(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<BuzzAck>, AppError> {
    let ack = round_service::buzz(&state, &id).await?;
    Ok(Json(ack))
}
