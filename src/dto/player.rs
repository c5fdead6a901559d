use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dto::game::PlayerSummary,
    dto::validation::{validate_device_id, validate_player_name},
    state::arbitration::BuzzRejection,
};

/// Join (or re-join) the game.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRequest {
    /// Display name, surrounding whitespace ignored.
    #[validate(custom(function = "validate_player_name"))]
    pub name: String,
    /// Identifier previously returned to this device, if any.
    #[serde(default)]
    #[validate(custom(function = "validate_device_id"))]
    pub device_id: Option<String>,
}

/// Result of a join: the id to persist on the device.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinResponse {
    /// Player as stored; its id is the device id to persist.
    pub player: PlayerSummary,
    /// `true` when the device was re-associated with an existing player.
    pub rejoined: bool,
}

/// Machine-readable reason of a refused buzz.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BuzzRejectionReason {
    UnknownPlayer,
    RoundAlreadyClaimed,
    RoundOver,
    AlreadyBuzzed,
    NoQuestion,
}

impl From<BuzzRejection> for BuzzRejectionReason {
    fn from(value: BuzzRejection) -> Self {
        match value {
            BuzzRejection::UnknownPlayer => BuzzRejectionReason::UnknownPlayer,
            BuzzRejection::AlreadyClaimed => BuzzRejectionReason::RoundAlreadyClaimed,
            BuzzRejection::RoundOver => BuzzRejectionReason::RoundOver,
            BuzzRejection::AlreadyBuzzed => BuzzRejectionReason::AlreadyBuzzed,
            BuzzRejection::NoQuestion => BuzzRejectionReason::NoQuestion,
        }
    }
}

/// Acknowledgement of a buzz attempt.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct BuzzAck {
    /// Whether the buzz claimed the round.
    pub accepted: bool,
    /// Why the buzz was refused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<BuzzRejectionReason>,
}

impl BuzzAck {
    /// Ack for a buzz that claimed the round.
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    /// Ack for a refused buzz.
    pub fn rejected(reason: BuzzRejection) -> Self {
        Self {
            accepted: false,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_name_fails_validation() {
        let request: JoinRequest = serde_json::from_str(r#"{"name": "   "}"#).unwrap();
        assert!(request.validate().is_err());

        let request: JoinRequest =
            serde_json::from_str(r#"{"name": " Ada ", "device_id": "ada-1"}"#).unwrap();
        assert!(request.validate().is_ok());
    }
}
