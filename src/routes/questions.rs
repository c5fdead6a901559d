use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::question::{CreateQuestionRequest, QuestionSummary, UpdateQuestionRequest},
    error::AppError,
    services::question_service,
    state::SharedState,
};

/// Question bank management.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/questions", get(list_questions).post(create_question))
        .route(
            "/questions/{id}",
            put(update_question).delete(delete_question),
        )
}

#[utoipa::path(
    get,
    path = "/questions",
    tag = "questions",
    responses(
        (status = 200, description = "Question bank, oldest first", body = [QuestionSummary]),
        (status = 503, description = "Store unavailable")
    )
)]
/// List the question bank.
pub async fn list_questions(
    State(state): State<SharedState>,
) -> Result<Json<Vec<QuestionSummary>>, AppError> {
    Ok(Json(question_service::list_questions(&state).await?))
}

#[utoipa::path(
    post,
    path = "/questions",
    tag = "questions",
    request_body = CreateQuestionRequest,
    responses(
        (status = 201, description = "Question added", body = QuestionSummary),
        (status = 400, description = "Invalid payload"),
        (status = 503, description = "Store unavailable")
    )
)]
/// Add a question at the end of the bank.
pub async fn create_question(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateQuestionRequest>>,
) -> Result<(StatusCode, Json<QuestionSummary>), AppError> {
    let created = question_service::create_question(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/questions/{id}",
    tag = "questions",
    params(("id" = Uuid, Path, description = "Question identifier")),
    request_body = UpdateQuestionRequest,
    responses(
        (status = 200, description = "Question updated", body = QuestionSummary),
        (status = 400, description = "Invalid payload"),
        (status = 404, description = "Unknown question"),
        (status = 503, description = "Store unavailable")
    )
)]
/// Partially update a question; a `null` clip URL removes the clip.
pub async fn update_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<UpdateQuestionRequest>>,
) -> Result<Json<QuestionSummary>, AppError> {
    Ok(Json(question_service::update_question(&state, id, payload).await?))
}

#[utoipa::path(
    delete,
    path = "/questions/{id}",
    tag = "questions",
    params(("id" = Uuid, Path, description = "Question identifier")),
    responses(
        (status = 204, description = "Question deleted"),
        (status = 404, description = "Unknown question"),
        (status = 503, description = "Store unavailable")
    )
)]
/// Delete a question.
pub async fn delete_question(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    question_service::delete_question(&state, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
