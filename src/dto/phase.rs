use serde::Serialize;
use utoipa::ToSchema;

use crate::state::game::RoundPhase;

/// Round phase exposed to clients (REST/SSE/WebSocket).
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VisibleRoundPhase {
    /// Timer running, buzzers open.
    Active,
    /// A player buzzed and waits for the host.
    PendingConfirmation {
        /// Claiming player.
        player_id: String,
    },
    /// Round over, `winner` is `null` when nobody scored.
    Resolved {
        /// Confirmed winner.
        winner: Option<String>,
    },
}

impl From<&RoundPhase> for VisibleRoundPhase {
    fn from(value: &RoundPhase) -> Self {
        match value {
            RoundPhase::Active => VisibleRoundPhase::Active,
            RoundPhase::PendingConfirmation { player_id } => {
                VisibleRoundPhase::PendingConfirmation {
                    player_id: player_id.clone(),
                }
            }
            RoundPhase::Resolved { winner } => VisibleRoundPhase::Resolved {
                winner: winner.clone(),
            },
        }
    }
}
