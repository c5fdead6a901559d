use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report `ok` or `degraded`, pinging the store on the way.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        None => warn!("storage unavailable (degraded mode)"),
    }

    let connected_players = state.connections().len();
    if state.is_degraded() {
        HealthResponse::degraded(connected_players)
    } else {
        HealthResponse::ok(connected_players)
    }
}
