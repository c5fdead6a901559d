use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dto::question::{CreateQuestionRequest, QuestionSummary, UpdateQuestionRequest},
    error::ServiceError,
    services::sse_events,
    state::{SharedState, game::Question},
};

/// Every question of the bank, oldest first.
pub async fn list_questions(state: &SharedState) -> Result<Vec<QuestionSummary>, ServiceError> {
    let repository = state.require_repository().await?;
    let questions = repository.list_questions().await?;
    Ok(questions.into_iter().map(Into::into).collect())
}

/// Add a question to the bank.
pub async fn create_question(
    state: &SharedState,
    request: CreateQuestionRequest,
) -> Result<QuestionSummary, ServiceError> {
    let repository = state.require_repository().await?;
    let question = Question::new(
        request.prompt.trim().to_string(),
        request.answer.trim().to_string(),
        request.clip_url,
    );
    repository.add_question(&question).await?;
    info!(question_id = %question.id, "question added");

    refresh_questions(state).await?;
    Ok(question.into())
}

/// Update a question in place.
pub async fn update_question(
    state: &SharedState,
    id: Uuid,
    request: UpdateQuestionRequest,
) -> Result<QuestionSummary, ServiceError> {
    if !request.clip_url_is_valid() {
        return Err(ServiceError::InvalidInput(
            "clip_url must be an http(s) URL".into(),
        ));
    }

    let repository = state.require_repository().await?;
    let updated = repository
        .update_question(id, request.into())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("question `{id}` not found")))?;
    info!(question_id = %id, "question updated");

    refresh_questions(state).await?;
    Ok(updated.into())
}

/// Remove a question from the bank.
pub async fn delete_question(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let repository = state.require_repository().await?;
    if !repository.delete_question(id).await? {
        return Err(ServiceError::NotFound(format!("question `{id}` not found")));
    }
    info!(question_id = %id, "question deleted");

    refresh_questions(state).await?;
    Ok(())
}

/// Reload the bank from the store into the cache.
///
/// Subscribers are only notified when the bank actually changed.
pub async fn refresh_questions(state: &SharedState) -> Result<bool, ServiceError> {
    let repository = state.require_repository().await?;
    let questions = repository.list_questions().await?;

    if questions == state.questions().await {
        return Ok(false);
    }

    let count = questions.len();
    state.replace_questions(questions).await;
    debug!(count, "question bank refreshed");

    sse_events::broadcast_questions_changed(state, count);
    let game = state.snapshot().await.state;
    sse_events::broadcast_game_state(state, &game).await;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{config::AppConfig, dao::document_store::memory::MemoryStore, state::AppState};

    async fn state() -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(MemoryStore::new())).await;
        state
    }

    fn create_request(prompt: &str) -> CreateQuestionRequest {
        CreateQuestionRequest {
            prompt: prompt.into(),
            answer: "answer".into(),
            clip_url: None,
        }
    }

    #[tokio::test]
    async fn crud_keeps_cache_in_sync() {
        let state = state().await;
        let mut public = state.public_sse().subscribe();

        let created = create_question(&state, create_request(" Who sang it? "))
            .await
            .unwrap();
        assert_eq!(created.prompt, "Who sang it?");
        assert_eq!(state.question_count().await, 1);
        assert_eq!(
            public.try_recv().unwrap().event.as_deref(),
            Some("questions.changed")
        );

        let updated = update_question(
            &state,
            created.id,
            serde_json::from_str(r#"{"answer": "Queen"}"#).unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(updated.answer, "Queen");
        assert_eq!(state.questions().await[0].answer, "Queen");

        delete_question(&state, created.id).await.unwrap();
        assert_eq!(state.question_count().await, 0);
        assert!(list_questions(&state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_question_is_not_found() {
        let state = state().await;
        assert!(matches!(
            delete_question(&state, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            update_question(
                &state,
                Uuid::new_v4(),
                serde_json::from_str("{}").unwrap()
            )
            .await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn refresh_without_changes_is_silent() {
        let state = state().await;
        create_question(&state, create_request("q")).await.unwrap();
        assert!(!refresh_questions(&state).await.unwrap());
    }
}
