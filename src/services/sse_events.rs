use serde::Serialize;
use tracing::warn;

use crate::{
    dto::{
        game::{HostGameSnapshot, PlayerSummary, PublicGameSnapshot},
        sse::{
            PlayerJoinedEvent, QuestionsChangedEvent, RoundResolvedEvent, ServerEvent,
            SystemStatus, TimerTickEvent,
        },
    },
    state::{
        SharedState,
        game::{GameState, RoundPhase},
        state_machine::GameEvent,
    },
};

/// Event carrying a full public or host snapshot.
pub const EVENT_GAME_STATE: &str = "game.state";
const EVENT_TIMER_TICK: &str = "timer.tick";
const EVENT_PLAYER_JOINED: &str = "player.joined";
const EVENT_ROUND_RESOLVED: &str = "round.resolved";
const EVENT_QUESTIONS_CHANGED: &str = "questions.changed";
const EVENT_SYSTEM_STATUS: &str = "system.status";
/// Event carrying informational messages.
pub const EVENT_INFO: &str = "info";

/// Fan out the events matching a committed transition.
pub async fn broadcast_transition(state: &SharedState, event: &GameEvent, next: &GameState) {
    let resolved = matches!(next.round.phase, RoundPhase::Resolved { .. });

    match event {
        GameEvent::Tick => {
            let payload = TimerTickEvent {
                round: next.round.round,
                timer: next.round.timer,
            };
            send_public_event(state, EVENT_TIMER_TICK, &payload);
            send_host_event(state, EVENT_TIMER_TICK, &payload);
            if !resolved {
                return;
            }
            broadcast_round_resolved(state, next);
        }
        GameEvent::PlayerJoined(player) => {
            let payload = PlayerJoinedEvent {
                player: player.clone().into(),
            };
            send_public_event(state, EVENT_PLAYER_JOINED, &payload);
            send_host_event(state, EVENT_PLAYER_JOINED, &payload);
        }
        GameEvent::ConfirmCorrect | GameEvent::ConfirmIncorrect if resolved => {
            broadcast_round_resolved(state, next);
        }
        _ => {}
    }

    broadcast_game_state(state, next).await;
}

/// Broadcast the full snapshot on both streams, the host one with the answer.
pub async fn broadcast_game_state(state: &SharedState, game: &GameState) {
    let count = state.question_count().await;
    let question = state.question_at(game.round.question_index).await;

    send_public_event(
        state,
        EVENT_GAME_STATE,
        &PublicGameSnapshot::build(game, question.as_ref(), count),
    );
    send_host_event(
        state,
        EVENT_GAME_STATE,
        &HostGameSnapshot::build(game, question.as_ref(), count),
    );
}

fn broadcast_round_resolved(state: &SharedState, game: &GameState) {
    let winner = game
        .round
        .winner()
        .and_then(|id| game.players.get(id))
        .cloned()
        .map(PlayerSummary::from);
    let payload = RoundResolvedEvent {
        round: game.round.round,
        winner,
    };
    send_public_event(state, EVENT_ROUND_RESOLVED, &payload);
    send_host_event(state, EVENT_ROUND_RESOLVED, &payload);
}

/// Broadcast the new size of the question bank.
pub fn broadcast_questions_changed(state: &SharedState, count: usize) {
    let payload = QuestionsChangedEvent { count };
    send_public_event(state, EVENT_QUESTIONS_CHANGED, &payload);
    send_host_event(state, EVENT_QUESTIONS_CHANGED, &payload);
}

/// Broadcast a degraded mode toggle.
pub fn broadcast_system_status(state: &SharedState, degraded: bool) {
    let payload = SystemStatus { degraded };
    send_public_event(state, EVENT_SYSTEM_STATUS, &payload);
    send_host_event(state, EVENT_SYSTEM_STATUS, &payload);
}

fn send_public_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.public_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize public SSE payload"),
    }
}

fn send_host_event(state: &SharedState, event: &str, payload: &impl Serialize) {
    match ServerEvent::json(Some(event.to_string()), payload) {
        Ok(event) => state.host_sse().broadcast(event),
        Err(err) => warn!(event, error = %err, "failed to serialize host SSE payload"),
    }
}
