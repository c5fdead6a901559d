use tracing::info;
use uuid::Uuid;

use crate::{
    dto::player::JoinResponse,
    error::ServiceError,
    state::{
        SharedState, game::Player, state_machine::GameEvent,
        transitions::run_transition_with_broadcast,
    },
};

/// Join the game, or re-associate a device with the player it already owns.
pub async fn join(
    state: &SharedState,
    name: &str,
    device_id: Option<String>,
) -> Result<JoinResponse, ServiceError> {
    let existing = match device_id.as_deref() {
        Some(id) => state.snapshot().await.state.players.get(id).cloned(),
        None => None,
    };
    if let Some(existing) = existing {
        info!(player_id = %existing.id, "device re-associated with existing player");
        return Ok(JoinResponse {
            player: existing.into(),
            rejoined: true,
        });
    }

    let id = device_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    let player = Player::new(id, name.trim());
    let next = run_transition_with_broadcast(state, GameEvent::PlayerJoined(player.clone())).await?;
    info!(player_id = %player.id, players = next.players.len(), "player joined");

    Ok(JoinResponse {
        player: player.into(),
        rejoined: false,
    })
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

    #[tokio::test]
    async fn join_without_device_generates_an_id() {
        let state = state().await;
        let joined = join(&state, "  Ada ", None).await.unwrap();
        assert!(!joined.rejoined);
        assert_eq!(joined.player.name, "Ada");
        assert!(Uuid::parse_str(&joined.player.id).is_ok());
    }

    #[tokio::test]
    async fn known_device_rejoins_with_its_score() {
        let state = state().await;
        join(&state, "Ada", Some("device-1".into())).await.unwrap();
        let again = join(&state, "Ada (phone)", Some("device-1".into()))
            .await
            .unwrap();
        assert!(again.rejoined);
        assert_eq!(again.player.name, "Ada");
        assert_eq!(state.snapshot().await.state.players.len(), 1);
    }

    #[tokio::test]
    async fn join_fails_in_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            join(&state, "Ada", None).await,
            Err(ServiceError::Degraded)
        ));
    }
}
