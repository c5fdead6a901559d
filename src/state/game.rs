use std::time::SystemTime;

use indexmap::IndexMap;
use uuid::Uuid;

use crate::dao::models::{
    BuzzRecordEntity, GameEntity, PlayerEntity, QuestionEntity, RoundEntity, RoundPhaseEntity,
};

/// Player tracked by the game state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Identifier shared with the player's device (persisted client-side).
    pub id: String,
    /// Display name chosen on join.
    pub name: String,
    /// Current score, only raised by confirmed answers.
    pub score: u32,
}

impl Player {
    /// Build a fresh player with a zero score.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            score: 0,
        }
    }
}

/// Question owned by the question bank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Stable identifier of the question.
    pub id: Uuid,
    /// Text displayed on the shared screen.
    pub prompt: String,
    /// Expected answer, only exposed to the host.
    pub answer: String,
    /// Optional media clip played alongside the prompt.
    pub clip_url: Option<String>,
    /// Creation time, used to keep the bank order stable.
    pub created_at: SystemTime,
}

impl Question {
    /// Build a new question with a fresh identifier.
    pub fn new(prompt: String, answer: String, clip_url: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt,
            answer,
            clip_url,
            created_at: SystemTime::now(),
        }
    }
}

/// One accepted buzz attempt of the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuzzRecord {
    /// Player who buzzed.
    pub player_id: String,
    /// Milliseconds elapsed since the round opened.
    pub at_ms: u64,
}

/// Lifecycle phase of the current round. Exactly one applies at any time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundPhase {
    /// Timer running, buzzers open.
    Active,
    /// A player claimed the round and the host must adjudicate.
    PendingConfirmation {
        /// Player whose answer awaits confirmation.
        player_id: String,
    },
    /// Round is over, with or without a winner.
    Resolved {
        /// Confirmed winner, `None` when the time ran out or nobody answered.
        winner: Option<String>,
    },
}

/// Mutable state of the round currently played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundState {
    /// Monotonic round counter, bumped whenever a new round opens.
    pub round: u64,
    /// Index of the active question inside the question bank.
    pub question_index: usize,
    /// Seconds left on the countdown.
    pub timer: u32,
    /// Current phase.
    pub phase: RoundPhase,
    /// Buzzes accepted during this round, in arrival order.
    pub buzzes: Vec<BuzzRecord>,
    /// Whether the shared screen should celebrate a winner.
    pub celebrate: bool,
}

impl RoundState {
    /// Open the very first round on question zero with a full countdown.
    pub fn fresh(round_duration_secs: u32) -> Self {
        Self {
            round: 0,
            question_index: 0,
            timer: round_duration_secs,
            phase: RoundPhase::Active,
            buzzes: Vec::new(),
            celebrate: false,
        }
    }

    /// True when the given player already buzzed in this round.
    pub fn has_buzzed(&self, player_id: &str) -> bool {
        self.buzzes.iter().any(|buzz| buzz.player_id == player_id)
    }

    /// Winner of a resolved round, if any.
    pub fn winner(&self) -> Option<&str> {
        match &self.phase {
            RoundPhase::Resolved { winner } => winner.as_deref(),
            _ => None,
        }
    }
}

/// Authoritative game document: roster plus current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameState {
    /// Players keyed by identifier, in join order.
    pub players: IndexMap<String, Player>,
    /// Round currently played.
    pub round: RoundState,
}

impl GameState {
    /// Empty roster on a freshly opened first round.
    pub fn new(round_duration_secs: u32) -> Self {
        Self {
            players: IndexMap::new(),
            round: RoundState::fresh(round_duration_secs),
        }
    }

    /// Whether at least one registered player may still buzz this round.
    pub fn has_eligible_buzzer(&self) -> bool {
        self.players
            .keys()
            .any(|player_id| !self.round.has_buzzed(player_id))
    }

    /// Players sorted by descending score, ties kept in join order.
    pub fn scoreboard(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.values().cloned().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
    }
}

impl From<PlayerEntity> for Player {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            score: value.score,
        }
    }
}

impl From<Player> for PlayerEntity {
    fn from(value: Player) -> Self {
        Self {
            id: value.id,
            name: value.name,
            score: value.score,
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            prompt: value.prompt,
            answer: value.answer,
            clip_url: value.clip_url,
            created_at: value.created_at,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            id: value.id,
            prompt: value.prompt,
            answer: value.answer,
            clip_url: value.clip_url,
            created_at: value.created_at,
        }
    }
}

impl From<BuzzRecordEntity> for BuzzRecord {
    fn from(value: BuzzRecordEntity) -> Self {
        Self {
            player_id: value.player_id,
            at_ms: value.at_ms,
        }
    }
}

impl From<BuzzRecord> for BuzzRecordEntity {
    fn from(value: BuzzRecord) -> Self {
        Self {
            player_id: value.player_id,
            at_ms: value.at_ms,
        }
    }
}

impl From<RoundPhaseEntity> for RoundPhase {
    fn from(value: RoundPhaseEntity) -> Self {
        match value {
            RoundPhaseEntity::Active => RoundPhase::Active,
            RoundPhaseEntity::PendingConfirmation { player_id } => {
                RoundPhase::PendingConfirmation { player_id }
            }
            RoundPhaseEntity::Resolved { winner } => RoundPhase::Resolved { winner },
        }
    }
}

impl From<RoundPhase> for RoundPhaseEntity {
    fn from(value: RoundPhase) -> Self {
        match value {
            RoundPhase::Active => RoundPhaseEntity::Active,
            RoundPhase::PendingConfirmation { player_id } => {
                RoundPhaseEntity::PendingConfirmation { player_id }
            }
            RoundPhase::Resolved { winner } => RoundPhaseEntity::Resolved { winner },
        }
    }
}

impl From<RoundEntity> for RoundState {
    fn from(value: RoundEntity) -> Self {
        Self {
            round: value.round,
            question_index: value.question_index,
            timer: value.timer,
            phase: value.phase.into(),
            buzzes: value.buzzes.into_iter().map(Into::into).collect(),
            celebrate: value.celebrate,
        }
    }
}

impl From<RoundState> for RoundEntity {
    fn from(value: RoundState) -> Self {
        Self {
            round: value.round,
            question_index: value.question_index,
            timer: value.timer,
            phase: value.phase.into(),
            buzzes: value.buzzes.into_iter().map(Into::into).collect(),
            celebrate: value.celebrate,
        }
    }
}

impl From<GameEntity> for GameState {
    fn from(value: GameEntity) -> Self {
        Self {
            players: value
                .players
                .into_iter()
                .map(|player| (player.id.clone(), player.into()))
                .collect(),
            round: value.round.into(),
        }
    }
}

impl From<GameState> for GameEntity {
    fn from(value: GameState) -> Self {
        Self {
            players: value.players.into_values().map(Into::into).collect(),
            round: value.round.into(),
            updated_at: SystemTime::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state() -> GameState {
        let mut state = GameState::new(30);
        for (id, name, score) in [("a", "Ada", 20), ("b", "Bob", 0), ("c", "Cy", 10)] {
            let mut player = Player::new(id, name);
            player.score = score;
            state.players.insert(id.into(), player);
        }
        state.round.question_index = 2;
        state.round.timer = 17;
        state.round.phase = RoundPhase::PendingConfirmation {
            player_id: "b".into(),
        };
        state.round.buzzes.push(BuzzRecord {
            player_id: "b".into(),
            at_ms: 5_000,
        });
        state
    }

    #[test]
    fn state_survives_store_format_round_trip() {
        let state = sample_state();
        let entity: GameEntity = state.clone().into();
        let json = serde_json::to_value(&entity).unwrap();
        let decoded: GameEntity = serde_json::from_value(json).unwrap();
        assert_eq!(GameState::from(decoded), state);
    }

    #[test]
    fn scoreboard_orders_by_score_then_join_order() {
        let mut state = sample_state();
        state.players.get_mut("b").unwrap().score = 10;
        let order: Vec<_> = state.scoreboard().into_iter().map(|p| p.id).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn eligible_buzzer_ignores_players_who_buzzed() {
        let mut state = sample_state();
        assert!(state.has_eligible_buzzer());
        for id in ["a", "c"] {
            state.round.buzzes.push(BuzzRecord {
                player_id: id.into(),
                at_ms: 6_000,
            });
        }
        assert!(!state.has_eligible_buzzer());
    }
}
