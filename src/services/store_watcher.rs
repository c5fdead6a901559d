use std::time::Duration;

use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{dao::game::QUESTION_PREFIX, services::question_service, state::SharedState};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Follow question bank changes made by any writer of the store.
///
/// Pauses while degraded and resubscribes once a store is available again.
pub async fn run(state: SharedState) {
    let mut degraded = state.degraded_watcher();

    loop {
        if degraded.wait_for(|is_degraded| !*is_degraded).await.is_err() {
            break;
        }
        let Some(store) = state.store().await else {
            if degraded.changed().await.is_err() {
                break;
            }
            continue;
        };

        let mut changes = store.subscribe(QUESTION_PREFIX);
        info!("watching question bank changes");
        // Catch up with writes made while nobody was listening.
        refresh(&state).await;

        loop {
            tokio::select! {
                change = changes.next() => match change {
                    Some(change) => {
                        debug!(doc_id = %change.id, deleted = change.is_deletion(), "question document changed");
                        refresh(&state).await;
                    }
                    None => {
                        warn!("question change feed ended; resubscribing");
                        sleep(RESUBSCRIBE_DELAY).await;
                        break;
                    }
                },
                changed = degraded.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if *degraded.borrow_and_update() {
                        info!("store unavailable; pausing question watcher");
                        break;
                    }
                }
            }
        }
    }
}

async fn refresh(state: &SharedState) {
    if let Err(err) = question_service::refresh_questions(state).await {
        warn!(error = %err, "failed to refresh question bank");
    }
}
