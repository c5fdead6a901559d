use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Player row stored inside the game document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Identifier kept by the player's device.
    pub id: String,
    /// Display name chosen on join.
    pub name: String,
    /// Current score.
    pub score: u32,
}

/// Question document of the question bank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Stable identifier for the question.
    pub id: Uuid,
    /// Text shown on the shared screen.
    pub prompt: String,
    /// Expected answer.
    pub answer: String,
    /// Optional media clip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip_url: Option<String>,
    /// Creation time, the bank is ordered on it.
    pub created_at: SystemTime,
}

/// Partial update applied to a question document.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionPatchEntity {
    /// New prompt, untouched when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// New answer, untouched when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// `Some(None)` clears the clip, `None` leaves it untouched.
    #[serde(
        default,
        with = "::serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub clip_url: Option<Option<String>>,
}

/// Accepted buzz of the current round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuzzRecordEntity {
    /// Player who buzzed.
    pub player_id: String,
    /// Milliseconds since the round opened.
    pub at_ms: u64,
}

/// Persisted round phase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundPhaseEntity {
    /// Buzzers open.
    Active,
    /// Waiting for the host.
    PendingConfirmation {
        /// Claiming player.
        player_id: String,
    },
    /// Round over.
    Resolved {
        /// Confirmed winner, if any.
        winner: Option<String>,
    },
}

/// Persisted round state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundEntity {
    /// Monotonic round counter.
    pub round: u64,
    /// Active question index.
    pub question_index: usize,
    /// Seconds left on the countdown.
    pub timer: u32,
    /// Current phase.
    pub phase: RoundPhaseEntity,
    /// Accepted buzzes, in arrival order.
    #[serde(default)]
    pub buzzes: Vec<BuzzRecordEntity>,
    /// Celebration flag.
    #[serde(default)]
    pub celebrate: bool,
}

/// The shared game document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Players in join order.
    pub players: Vec<PlayerEntity>,
    /// Round currently played.
    pub round: RoundEntity,
    /// Last time the document was written.
    pub updated_at: SystemTime,
}
