use tracing::{debug, info};

use crate::{
    dto::{game::HostGameSnapshot, player::BuzzAck},
    error::ServiceError,
    services::public_service,
    state::{
        SharedState,
        arbitration::BuzzRejection,
        game::BuzzRecord,
        state_machine::GameEvent,
        transitions::run_transition_with_broadcast,
    },
};

/// Try to claim the current round for `player_id`.
///
/// Arbitration refusals are not errors: they come back as a negative ack.
pub async fn buzz(state: &SharedState, player_id: &str) -> Result<BuzzAck, ServiceError> {
    let question_index = state.snapshot().await.state.round.question_index;
    if state.question_at(question_index).await.is_none() {
        debug!(player_id, question_index, "buzz rejected: no question on screen");
        return Ok(BuzzAck::rejected(BuzzRejection::NoQuestion));
    }

    let at_ms = state.round_elapsed_ms().await;
    let event = GameEvent::Buzz(BuzzRecord {
        player_id: player_id.to_string(),
        at_ms,
    });

    match run_transition_with_broadcast(state, event).await {
        Ok(_) => {
            info!(player_id, at_ms, "buzz accepted");
            Ok(BuzzAck::accepted())
        }
        Err(ServiceError::BuzzRejected(reason)) => {
            debug!(player_id, reason = %reason, "buzz rejected");
            Ok(BuzzAck::rejected(reason))
        }
        Err(err) => Err(err),
    }
}

/// Accept the pending answer.
pub async fn confirm_correct(state: &SharedState) -> Result<HostGameSnapshot, ServiceError> {
    let next = run_transition_with_broadcast(state, GameEvent::ConfirmCorrect).await?;
    info!(winner = ?next.round.winner(), "answer confirmed");
    Ok(public_service::host_snapshot_of(state, &next).await)
}

/// Reject the pending answer.
pub async fn confirm_incorrect(state: &SharedState) -> Result<HostGameSnapshot, ServiceError> {
    let next = run_transition_with_broadcast(state, GameEvent::ConfirmIncorrect).await?;
    Ok(public_service::host_snapshot_of(state, &next).await)
}

/// Move a resolved round to the next question.
pub async fn advance(state: &SharedState) -> Result<HostGameSnapshot, ServiceError> {
    let question_count = state.question_count().await;
    let next = run_transition_with_broadcast(state, GameEvent::Advance { question_count }).await?;
    info!(
        round = next.round.round,
        question_index = next.round.question_index,
        "advanced to next question"
    );
    Ok(public_service::host_snapshot_of(state, &next).await)
}

/// Restart on the first question with zeroed scores.
pub async fn reset(state: &SharedState) -> Result<HostGameSnapshot, ServiceError> {
    let next = run_transition_with_broadcast(state, GameEvent::Reset).await?;
    info!(players = next.players.len(), "game reset");
    Ok(public_service::host_snapshot_of(state, &next).await)
}

/// Decrement the countdown by one step.
pub async fn tick(state: &SharedState) -> Result<(), ServiceError> {
    run_transition_with_broadcast(state, GameEvent::Tick).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::document_store::memory::MemoryStore,
        dto::player::BuzzRejectionReason,
        services::player_service,
        state::{AppState, game::RoundPhase},
    };

    async fn ready_state(players: &[&str]) -> SharedState {
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(MemoryStore::new())).await;
        state.replace_questions(state.config().seed_bank()).await;
        for id in players {
            player_service::join(&state, id, Some(id.to_string()))
                .await
                .unwrap();
        }
        state
    }

    #[tokio::test]
    async fn second_buzz_gets_negative_ack() {
        let state = ready_state(&["a", "b"]).await;
        assert_eq!(buzz(&state, "a").await.unwrap(), BuzzAck::accepted());
        let ack = buzz(&state, "b").await.unwrap();
        assert!(!ack.accepted);
        assert_eq!(ack.reason, Some(BuzzRejectionReason::RoundAlreadyClaimed));
    }

    #[tokio::test]
    async fn confirm_without_pending_answer_is_refused() {
        let state = ready_state(&["a"]).await;
        assert!(matches!(
            confirm_correct(&state).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn correct_answer_scores_and_reveals_winner() {
        let state = ready_state(&["a", "b"]).await;
        buzz(&state, "b").await.unwrap();
        let snapshot = confirm_correct(&state).await.unwrap();
        assert!(snapshot.public.celebrate);
        let scores: Vec<_> = snapshot.public.players.iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![0, 10]);
        assert_eq!(
            state.snapshot().await.state.round.phase,
            RoundPhase::Resolved {
                winner: Some("b".into())
            }
        );
    }

    #[tokio::test]
    async fn advance_and_reset_walk_the_bank() {
        let state = ready_state(&["a"]).await;
        buzz(&state, "a").await.unwrap();
        confirm_incorrect(&state).await.unwrap();
        let snapshot = advance(&state).await.unwrap();
        assert_eq!(snapshot.public.question_index, 1);
        assert_eq!(
            snapshot.current.unwrap().answer,
            "Michael Jackson"
        );

        let snapshot = reset(&state).await.unwrap();
        assert_eq!(snapshot.public.question_index, 0);
        assert!(snapshot.public.players.iter().all(|p| p.score == 0));
    }

    #[tokio::test]
    async fn offline_store_fails_buzz_without_state_change() {
        let store = MemoryStore::new();
        let state = AppState::new(AppConfig::default());
        state.install_store(Arc::new(store.clone())).await;
        state.replace_questions(state.config().seed_bank()).await;
        player_service::join(&state, "Ada", Some("a".into()))
            .await
            .unwrap();

        store.set_offline(true);
        assert!(matches!(
            buzz(&state, "a").await,
            Err(ServiceError::Unavailable(_))
        ));
        assert_eq!(state.snapshot().await.state.round.phase, RoundPhase::Active);
    }

    #[tokio::test]
    async fn buzz_without_a_question_on_screen_is_refused() {
        let state = ready_state(&["a"]).await;
        let mut game = state.snapshot().await.state;
        game.round.question_index = 3;
        state.restore_game(game, None).await;
        let mut bank = state.questions().await;
        bank.truncate(3);
        state.replace_questions(bank).await;

        let public = public_service::public_state(&state).await;
        assert!(public.question.is_none());
        assert!(public.waiting_message.is_some());

        let ack = buzz(&state, "a").await.unwrap();
        assert_eq!(ack.reason, Some(BuzzRejectionReason::NoQuestion));
        let game = state.snapshot().await.state;
        assert!(game.round.buzzes.is_empty());
        assert_eq!(game.round.phase, RoundPhase::Active);
    }
}
