use crate::{
    error::ServiceError,
    services::{sse_events, websocket_service},
    state::{SharedState, game::GameState, state_machine::GameEvent},
};

/// Execute a transition, persist the planned state, then fan the result out to
/// SSE subscribers and connected player sockets.
pub async fn run_transition_with_broadcast(
    state: &SharedState,
    event: GameEvent,
) -> Result<GameState, ServiceError> {
    let ((), next) = state
        .run_transition(event.clone(), |next| async move {
            state.persist_game(&next).await
        })
        .await?;

    sse_events::broadcast_transition(state, &event, &next).await;
    websocket_service::push_status_to_all(state, &next);
    Ok(next)
}
