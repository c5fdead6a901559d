//! Buzz arbitration: decides whether a buzz attempt claims the current round.
//!
//! The first accepted buzz wins the right to answer immediately. Every other
//! attempt is rejected without touching the state.

use thiserror::Error;

use crate::state::game::{BuzzRecord, GameState, RoundPhase};

/// Reason a buzz attempt was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BuzzRejection {
    /// The player id is not part of the roster.
    #[error("unknown player")]
    UnknownPlayer,
    /// Another player already claimed the round.
    #[error("round already claimed")]
    AlreadyClaimed,
    /// The round has been resolved and waits for the next question.
    #[error("round is over")]
    RoundOver,
    /// The player already buzzed during this round.
    #[error("player already buzzed this round")]
    AlreadyBuzzed,
    /// The round points at a question missing from the bank.
    #[error("no question on screen")]
    NoQuestion,
}

/// Check a buzz attempt against the current state.
///
/// Returns the record to append when the buzz claims the round.
pub fn arbitrate(state: &GameState, attempt: &BuzzRecord) -> Result<BuzzRecord, BuzzRejection> {
    if !state.players.contains_key(&attempt.player_id) {
        return Err(BuzzRejection::UnknownPlayer);
    }

    match &state.round.phase {
        RoundPhase::Active => {}
        RoundPhase::PendingConfirmation { .. } => return Err(BuzzRejection::AlreadyClaimed),
        RoundPhase::Resolved { .. } => return Err(BuzzRejection::RoundOver),
    }

    if state.round.has_buzzed(&attempt.player_id) {
        return Err(BuzzRejection::AlreadyBuzzed);
    }

    Ok(attempt.clone())
}
