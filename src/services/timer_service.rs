use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until};
use tracing::{debug, info, warn};

use crate::{
    services::round_service,
    state::{SharedState, game::RoundPhase},
};

/// Drive the round countdown and the automatic advance after a resolved round.
///
/// The countdown only runs while the round is active on a question present in
/// the bank and the store is reachable. Every committed transition wakes the
/// loop so decisions are taken on the latest snapshot.
pub async fn run(state: SharedState) {
    let tick_interval = state.config().tick_interval;
    let post_round_delay = state.config().post_round_delay;

    let mut snapshots = state.snapshot_watcher();
    let mut degraded = state.degraded_watcher();
    let mut ticker = interval_at(Instant::now() + tick_interval, tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut ticking = false;
    // (round, deadline) of the pending automatic advance.
    let mut advance_at: Option<(u64, Instant)> = None;

    loop {
        let game = snapshots.borrow_and_update().state.clone();
        let is_degraded = *degraded.borrow_and_update();
        let has_question = state
            .question_at(game.round.question_index)
            .await
            .is_some();

        let should_tick =
            matches!(game.round.phase, RoundPhase::Active) && has_question && !is_degraded;
        if should_tick && !ticking {
            debug!(round = game.round.round, timer = game.round.timer, "countdown started");
            ticker.reset();
        }
        ticking = should_tick;

        advance_at = match game.round.phase {
            RoundPhase::Resolved { .. } if !is_degraded => match advance_at {
                Some((round, at)) if round == game.round.round => Some((round, at)),
                _ => Some((game.round.round, Instant::now() + post_round_delay)),
            },
            _ => None,
        };
        let deadline = advance_at.map(|(_, at)| at).unwrap_or_else(Instant::now);

        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = degraded.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick(), if ticking => {
                if let Err(err) = round_service::tick(&state).await {
                    warn!(error = %err, "countdown tick failed");
                }
            }
            _ = sleep_until(deadline), if advance_at.is_some() => {
                match round_service::advance(&state).await {
                    Ok(snapshot) => info!(
                        round = snapshot.public.round,
                        "round advanced automatically"
                    ),
                    Err(err) => {
                        warn!(error = %err, "automatic advance failed; retrying later");
                        advance_at = Some((game.round.round, Instant::now() + post_round_delay));
                    }
                }
            }
        }
    }

    info!("timer driver stopped");
}
