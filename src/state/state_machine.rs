use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::state::{
    arbitration::{self, BuzzRejection},
    game::{BuzzRecord, GameState, Player, RoundPhase, RoundState},
};

/// Fixed rules applied by every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRules {
    /// Countdown length of a round, in seconds.
    pub round_duration_secs: u32,
    /// Points awarded for a confirmed answer.
    pub points_per_correct_answer: u32,
}

impl Default for RoundRules {
    fn default() -> Self {
        Self {
            round_duration_secs: 30,
            points_per_correct_answer: 10,
        }
    }
}

/// Coarse phase label, used in errors and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseKind {
    /// Buzzers open.
    Active,
    /// Awaiting host adjudication.
    PendingConfirmation,
    /// Round over.
    Resolved,
}

impl From<&RoundPhase> for PhaseKind {
    fn from(value: &RoundPhase) -> Self {
        match value {
            RoundPhase::Active => PhaseKind::Active,
            RoundPhase::PendingConfirmation { .. } => PhaseKind::PendingConfirmation,
            RoundPhase::Resolved { .. } => PhaseKind::Resolved,
        }
    }
}

/// Intents that can be applied to the game state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    /// A new player joins the roster.
    PlayerJoined(Player),
    /// A player claims the round.
    Buzz(BuzzRecord),
    /// Host accepts the pending answer.
    ConfirmCorrect,
    /// Host rejects the pending answer.
    ConfirmIncorrect,
    /// One countdown step elapsed.
    Tick,
    /// Move a resolved round to the next question.
    Advance {
        /// Number of questions currently in the bank.
        question_count: usize,
    },
    /// Start over on the first question with zeroed scores.
    Reset,
}

/// Why an event cannot be applied from the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    /// Buzz refused by the arbitration rules.
    #[error("buzz rejected: {0}")]
    Buzz(#[from] BuzzRejection),
    /// A player with the same id already exists.
    #[error("player `{0}` already joined")]
    DuplicatePlayer(String),
    /// No answer is awaiting confirmation.
    #[error("no answer is awaiting confirmation")]
    NothingPending,
    /// The countdown only runs while the round is active.
    #[error("timer only runs while the round is active")]
    TimerStopped,
    /// The round must be resolved before moving on.
    #[error("round is not resolved yet")]
    NotResolved,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while {from:?} ({reason})")]
pub struct InvalidTransition {
    /// Phase the round was in when the event was received.
    pub from: PhaseKind,
    /// The refused event.
    pub event: GameEvent,
    /// Why it was refused.
    pub reason: Rejection,
}

/// Errors that can occur when planning a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    AlreadyPending,
    /// The requested transition is not valid from the current state.
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
    /// State machine version changed since the plan was created.
    VersionMismatch {
        /// Version the plan expects to produce.
        expected: u64,
        /// Version the machine would produce.
        actual: u64,
    },
}

/// Errors that can occur when aborting a planned transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortError {
    /// No transition is currently pending.
    NoPending,
    /// Plan ID does not match the pending plan.
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned transition.
pub type PlanId = Uuid;

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Event that triggered this transition.
    pub event: GameEvent,
    /// State the machine will hold once applied.
    pub next: GameState,
    /// Version number after applying this transition.
    pub version_next: u64,
    /// Timestamp when this plan was created.
    pub pending_since: Instant,
}

/// Snapshot of the machine, published after every committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Committed game state.
    pub state: GameState,
    /// Version number (increments on each transition).
    pub version: u64,
}

/// Round lifecycle state machine holding the authoritative game state.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    rules: RoundRules,
    state: GameState,
    version: u64,
    pending: Option<Plan>,
    round_opened_at: Instant,
}

impl GameStateMachine {
    /// Create a machine on a fresh game.
    pub fn new(rules: RoundRules) -> Self {
        Self::with_state(rules, GameState::new(rules.round_duration_secs))
    }

    /// Create a machine resuming from a previously persisted state.
    pub fn with_state(rules: RoundRules, state: GameState) -> Self {
        Self {
            rules,
            state,
            version: 0,
            pending: None,
            round_opened_at: Instant::now(),
        }
    }

    /// Rules the machine was built with.
    pub fn rules(&self) -> RoundRules {
        self.rules
    }

    /// Committed state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Coarse phase of the committed state.
    pub fn phase(&self) -> PhaseKind {
        (&self.state.round.phase).into()
    }

    /// Milliseconds elapsed since the current round opened.
    pub fn round_elapsed_ms(&self) -> u64 {
        self.round_opened_at.elapsed().as_millis() as u64
    }

    /// Create a snapshot of the committed state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            version: self.version,
        }
    }

    /// Replace the committed state wholesale (used when restoring from storage).
    ///
    /// Any pending plan is dropped since its version can no longer match. The
    /// round clock is rewound by the seconds already counted down, so buzz
    /// offsets stay relative to the round opening.
    pub fn restore(&mut self, state: GameState) {
        let counted = self.rules.round_duration_secs.saturating_sub(state.round.timer);
        let now = Instant::now();
        self.round_opened_at = now
            .checked_sub(Duration::from_secs(u64::from(counted)))
            .unwrap_or(now);
        self.state = state;
        self.version += 1;
        self.pending = None;
    }

    /// Validate an event against the committed state and reserve the transition.
    pub fn plan(&mut self, event: GameEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = compute_transition(&self.rules, &self.state, &event).map_err(|reason| {
            PlanError::InvalidTransition(InvalidTransition {
                from: self.phase(),
                event: event.clone(),
                reason,
            })
        })?;

        let plan = Plan {
            id: Uuid::new_v4(),
            event,
            next,
            version_next: self.version + 1,
            pending_since: Instant::now(),
        };

        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Commit a planned transition and return the new state.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<GameState, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        if self.version + 1 != plan.version_next {
            return Err(ApplyError::VersionMismatch {
                expected: plan.version_next,
                actual: self.version + 1,
            });
        }

        if plan.next.round.round != self.state.round.round {
            self.round_opened_at = Instant::now();
        }
        self.state = plan.next;
        self.version = plan.version_next;

        Ok(self.state.clone())
    }

    /// Drop a planned transition without applying it.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), AbortError> {
        let plan = self.pending.as_ref().ok_or(AbortError::NoPending)?;

        if plan.id != plan_id {
            return Err(AbortError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }
}

/// Pure transition function: the state reached by applying `event` to `state`.
pub fn compute_transition(
    rules: &RoundRules,
    state: &GameState,
    event: &GameEvent,
) -> Result<GameState, Rejection> {
    let mut next = state.clone();

    match event {
        GameEvent::PlayerJoined(player) => {
            if next.players.contains_key(&player.id) {
                return Err(Rejection::DuplicatePlayer(player.id.clone()));
            }
            next.players.insert(player.id.clone(), player.clone());
        }
        GameEvent::Buzz(attempt) => {
            let record = arbitration::arbitrate(state, attempt)?;
            next.round.phase = RoundPhase::PendingConfirmation {
                player_id: record.player_id.clone(),
            };
            next.round.buzzes.push(record);
        }
        GameEvent::ConfirmCorrect => {
            let RoundPhase::PendingConfirmation { player_id } = &state.round.phase else {
                return Err(Rejection::NothingPending);
            };
            if let Some(player) = next.players.get_mut(player_id) {
                player.score = player
                    .score
                    .saturating_add(rules.points_per_correct_answer);
            }
            next.round.phase = RoundPhase::Resolved {
                winner: Some(player_id.clone()),
            };
            next.round.celebrate = true;
        }
        GameEvent::ConfirmIncorrect => {
            if !matches!(state.round.phase, RoundPhase::PendingConfirmation { .. }) {
                return Err(Rejection::NothingPending);
            }
            next.round.phase = if next.round.timer > 0 && next.has_eligible_buzzer() {
                RoundPhase::Active
            } else {
                RoundPhase::Resolved { winner: None }
            };
        }
        GameEvent::Tick => {
            if !matches!(state.round.phase, RoundPhase::Active) {
                return Err(Rejection::TimerStopped);
            }
            next.round.timer = next.round.timer.saturating_sub(1);
            if next.round.timer == 0 {
                next.round.phase = RoundPhase::Resolved { winner: None };
            }
        }
        GameEvent::Advance { question_count } => {
            if !matches!(state.round.phase, RoundPhase::Resolved { .. }) {
                return Err(Rejection::NotResolved);
            }
            let question_index = if *question_count == 0 {
                0
            } else {
                (state.round.question_index + 1) % question_count
            };
            next.round = RoundState {
                round: state.round.round + 1,
                question_index,
                ..RoundState::fresh(rules.round_duration_secs)
            };
        }
        GameEvent::Reset => {
            for player in next.players.values_mut() {
                player.score = 0;
            }
            next.round = RoundState {
                round: state.round.round + 1,
                ..RoundState::fresh(rules.round_duration_secs)
            };
        }
    }

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine_with_players(ids: &[&str]) -> GameStateMachine {
        let mut sm = GameStateMachine::new(RoundRules::default());
        for id in ids {
            apply(&mut sm, GameEvent::PlayerJoined(Player::new(*id, *id)));
        }
        sm
    }

    fn apply(sm: &mut GameStateMachine, event: GameEvent) -> GameState {
        let plan = sm.plan(event).unwrap();
        sm.apply(plan.id).unwrap()
    }

    fn buzz(player_id: &str, at_ms: u64) -> GameEvent {
        GameEvent::Buzz(BuzzRecord {
            player_id: player_id.into(),
            at_ms,
        })
    }

    fn rejection(sm: &mut GameStateMachine, event: GameEvent) -> Rejection {
        match sm.plan(event).unwrap_err() {
            PlanError::InvalidTransition(invalid) => invalid.reason,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn initial_state_is_active_first_question() {
        let sm = GameStateMachine::new(RoundRules::default());
        assert_eq!(sm.phase(), PhaseKind::Active);
        assert_eq!(sm.state().round.question_index, 0);
        assert_eq!(sm.state().round.timer, 30);
    }

    #[test]
    fn full_round_scenario() {
        let mut sm = machine_with_players(&["a", "b", "c"]);

        let state = apply(&mut sm, buzz("b", 5_000));
        assert_eq!(
            state.round.phase,
            RoundPhase::PendingConfirmation {
                player_id: "b".into()
            }
        );
        assert_eq!(
            state.round.buzzes,
            vec![BuzzRecord {
                player_id: "b".into(),
                at_ms: 5_000
            }]
        );

        let state = apply(&mut sm, GameEvent::ConfirmCorrect);
        assert_eq!(
            state.round.phase,
            RoundPhase::Resolved {
                winner: Some("b".into())
            }
        );
        assert!(state.round.celebrate);
        assert_eq!(state.players["a"].score, 0);
        assert_eq!(state.players["b"].score, 10);
        assert_eq!(state.players["c"].score, 0);

        let state = apply(&mut sm, GameEvent::Advance { question_count: 4 });
        assert_eq!(state.round.phase, RoundPhase::Active);
        assert_eq!(state.round.question_index, 1);
        assert_eq!(state.round.timer, 30);
        assert!(state.round.buzzes.is_empty());
        assert!(!state.round.celebrate);
        assert_eq!(state.round.round, 1);
    }

    #[test]
    fn second_buzz_is_rejected_while_pending() {
        let mut sm = machine_with_players(&["a", "b"]);
        apply(&mut sm, buzz("a", 100));
        assert_eq!(
            rejection(&mut sm, buzz("b", 200)),
            Rejection::Buzz(BuzzRejection::AlreadyClaimed)
        );
    }

    #[test]
    fn incorrect_answer_reopens_round_for_other_players() {
        let mut sm = machine_with_players(&["a", "b"]);
        apply(&mut sm, buzz("a", 100));
        let state = apply(&mut sm, GameEvent::ConfirmIncorrect);
        assert_eq!(state.round.phase, RoundPhase::Active);
        assert_eq!(state.players["a"].score, 0);

        assert_eq!(
            rejection(&mut sm, buzz("a", 300)),
            Rejection::Buzz(BuzzRejection::AlreadyBuzzed)
        );
        let state = apply(&mut sm, buzz("b", 400));
        assert_eq!(state.round.buzzes.len(), 2);
    }

    #[test]
    fn incorrect_answer_resolves_when_nobody_is_left() {
        let mut sm = machine_with_players(&["a"]);
        apply(&mut sm, buzz("a", 100));
        let state = apply(&mut sm, GameEvent::ConfirmIncorrect);
        assert_eq!(state.round.phase, RoundPhase::Resolved { winner: None });
    }

    #[test]
    fn player_can_buzz_again_after_advance() {
        let mut sm = machine_with_players(&["a"]);
        apply(&mut sm, buzz("a", 100));
        apply(&mut sm, GameEvent::ConfirmIncorrect);
        apply(&mut sm, GameEvent::Advance { question_count: 2 });
        let state = apply(&mut sm, buzz("a", 50));
        assert!(matches!(
            state.round.phase,
            RoundPhase::PendingConfirmation { .. }
        ));
    }

    #[test]
    fn timer_expiry_resolves_without_winner() {
        let rules = RoundRules {
            round_duration_secs: 3,
            ..RoundRules::default()
        };
        let mut sm = GameStateMachine::new(rules);
        apply(&mut sm, GameEvent::Tick);
        apply(&mut sm, GameEvent::Tick);
        let state = apply(&mut sm, GameEvent::Tick);
        assert_eq!(state.round.timer, 0);
        assert_eq!(state.round.phase, RoundPhase::Resolved { winner: None });
        assert_eq!(rejection(&mut sm, GameEvent::Tick), Rejection::TimerStopped);
    }

    #[test]
    fn timer_is_frozen_while_pending() {
        let mut sm = machine_with_players(&["a"]);
        apply(&mut sm, buzz("a", 100));
        assert_eq!(rejection(&mut sm, GameEvent::Tick), Rejection::TimerStopped);
    }

    #[test]
    fn advance_cycles_through_questions() {
        let mut sm = GameStateMachine::new(RoundRules::default());
        let mut seen = vec![sm.state().round.question_index];
        for _ in 0..5 {
            sm.restore(GameState {
                round: RoundState {
                    phase: RoundPhase::Resolved { winner: None },
                    ..sm.state().round.clone()
                },
                ..sm.state().clone()
            });
            let state = apply(&mut sm, GameEvent::Advance { question_count: 4 });
            seen.push(state.round.question_index);
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn advance_with_empty_bank_stays_on_first_index() {
        let mut sm = machine_with_players(&["a"]);
        apply(&mut sm, buzz("a", 1));
        apply(&mut sm, GameEvent::ConfirmCorrect);
        let state = apply(&mut sm, GameEvent::Advance { question_count: 0 });
        assert_eq!(state.round.question_index, 0);
    }

    #[test]
    fn advance_requires_resolved_round() {
        let mut sm = GameStateMachine::new(RoundRules::default());
        assert_eq!(
            rejection(&mut sm, GameEvent::Advance { question_count: 4 }),
            Rejection::NotResolved
        );
    }

    #[test]
    fn score_is_awarded_once_per_round() {
        let mut sm = machine_with_players(&["a"]);
        apply(&mut sm, buzz("a", 1));
        apply(&mut sm, GameEvent::ConfirmCorrect);
        assert_eq!(
            rejection(&mut sm, GameEvent::ConfirmCorrect),
            Rejection::NothingPending
        );
        assert_eq!(sm.state().players["a"].score, 10);
    }

    #[test]
    fn reset_zeroes_scores_and_keeps_players() {
        let mut sm = machine_with_players(&["a", "b"]);
        apply(&mut sm, buzz("a", 1));
        apply(&mut sm, GameEvent::ConfirmCorrect);
        let state = apply(&mut sm, GameEvent::Reset);
        assert_eq!(state.players.len(), 2);
        assert!(state.players.values().all(|p| p.score == 0));
        assert_eq!(state.round.question_index, 0);
        assert_eq!(state.round.phase, RoundPhase::Active);
    }

    #[test]
    fn duplicate_player_is_rejected() {
        let mut sm = machine_with_players(&["a"]);
        assert_eq!(
            rejection(&mut sm, GameEvent::PlayerJoined(Player::new("a", "again"))),
            Rejection::DuplicatePlayer("a".into())
        );
    }

    #[test]
    fn only_one_plan_at_a_time() {
        let mut sm = GameStateMachine::new(RoundRules::default());
        let plan = sm.plan(GameEvent::Tick).unwrap();
        assert_eq!(sm.plan(GameEvent::Tick).unwrap_err(), PlanError::AlreadyPending);
        sm.abort(plan.id).unwrap();
        assert!(sm.pending.is_none());
        assert_eq!(sm.state().round.timer, 30);
    }

    #[test]
    fn restore_invalidates_pending_plan() {
        let mut sm = GameStateMachine::new(RoundRules::default());
        let plan = sm.plan(GameEvent::Tick).unwrap();
        sm.restore(GameState::new(30));
        assert_eq!(sm.apply(plan.id).unwrap_err(), ApplyError::NoPending);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_mid_round_keeps_elapsed_time() {
        let mut sm = GameStateMachine::new(RoundRules::default());
        let mut state = GameState::new(30);
        state.round.timer = 25;
        sm.restore(state);
        assert_eq!(sm.round_elapsed_ms(), 5_000);

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(sm.round_elapsed_ms(), 6_500);
    }
}
