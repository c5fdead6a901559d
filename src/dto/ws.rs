use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::dto::{phase::VisibleRoundPhase, player::BuzzRejectionReason};

#[derive(Debug, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerInboundMessage {
    /// Must be the first frame of the connection.
    Identification { id: String },
    /// Claim the current round.
    Buzz { id: String },
}

impl PlayerInboundMessage {
    /// Parse a text frame sent by a device.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
/// Messages pushed to player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerOutboundMessage {
    /// Answer to a buzz frame.
    BuzzFeedback {
        accepted: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<BuzzRejectionReason>,
    },
    /// Pushed on connection and after every committed transition.
    Status {
        can_buzz: bool,
        phase: VisibleRoundPhase,
        timer: u32,
        score: u32,
    },
}
