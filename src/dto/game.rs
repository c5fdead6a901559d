//! Snapshots of the shared game state sent to the screen, the players and the host.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::{phase::VisibleRoundPhase, question::QuestionSummary},
    state::game::{BuzzRecord, GameState, Player, Question},
};

/// Message shown while there is no question to play.
pub const WAITING_FOR_QUESTIONS: &str = "Waiting for the host to add questions";

/// Player as shown on the scoreboard.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PlayerSummary {
    /// Player id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Points so far.
    pub score: u32,
}

impl From<Player> for PlayerSummary {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            score: value.score,
        }
    }
}

/// One accepted buzz of the current round.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct BuzzSummary {
    /// Player who buzzed.
    pub player_id: String,
    /// Milliseconds since the round opened.
    pub at_ms: u64,
}

impl From<BuzzRecord> for BuzzSummary {
    fn from(value: BuzzRecord) -> Self {
        Self {
            player_id: value.player_id,
            at_ms: value.at_ms,
        }
    }
}

/// Question displayed on the shared screen, without its answer.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PublicQuestion {
    /// Text read out to the players.
    pub prompt: String,
    /// Optional audio or video clip played with the prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip_url: Option<String>,
}

/// Game state visible to everyone.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PublicGameSnapshot {
    /// Monotonic round counter.
    pub round: u64,
    /// Position of the current question in the bank.
    pub question_index: usize,
    /// Number of questions in the bank.
    pub question_count: usize,
    /// Current question, absent when the bank has none at this index.
    pub question: Option<PublicQuestion>,
    /// Set whenever `question` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub waiting_message: Option<String>,
    /// Seconds left on the countdown.
    pub timer: u32,
    /// Round phase.
    pub phase: VisibleRoundPhase,
    /// Accepted buzzes, earliest first.
    pub buzzes: Vec<BuzzSummary>,
    /// Whether the screen should celebrate a winner.
    pub celebrate: bool,
    /// Players in join order.
    pub players: Vec<PlayerSummary>,
}

impl PublicGameSnapshot {
    /// Project `state` together with the question it points at.
    pub fn build(state: &GameState, question: Option<&Question>, question_count: usize) -> Self {
        let round = &state.round;
        Self {
            round: round.round,
            question_index: round.question_index,
            question_count,
            question: question.map(|question| PublicQuestion {
                prompt: question.prompt.clone(),
                clip_url: question.clip_url.clone(),
            }),
            waiting_message: question
                .is_none()
                .then(|| WAITING_FOR_QUESTIONS.to_string()),
            timer: round.timer,
            phase: (&round.phase).into(),
            buzzes: round.buzzes.iter().cloned().map(Into::into).collect(),
            celebrate: round.celebrate,
            players: state.players.values().cloned().map(Into::into).collect(),
        }
    }
}

/// Host view: the public snapshot plus the full current question.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct HostGameSnapshot {
    /// Snapshot also served to the players.
    #[serde(flatten)]
    pub public: PublicGameSnapshot,
    /// Current question including its answer.
    pub current: Option<QuestionSummary>,
}

impl HostGameSnapshot {
    /// Project `state` for the host, answer included.
    pub fn build(state: &GameState, question: Option<&Question>, question_count: usize) -> Self {
        Self {
            public: PublicGameSnapshot::build(state, question, question_count),
            current: question.cloned().map(Into::into),
        }
    }
}

/// Scoreboard ordered by descending score.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreboardResponse {
    /// Players by descending score.
    pub players: Vec<PlayerSummary>,
}

impl From<&GameState> for ScoreboardResponse {
    fn from(value: &GameState) -> Self {
        Self {
            players: value.scoreboard().into_iter().map(Into::into).collect(),
        }
    }
}
