use serde::Serialize;
use utoipa::ToSchema;

/// Response of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Player sockets currently open.
    pub connected_players: usize,
}

impl HealthResponse {
    /// Healthy report.
    pub fn ok(connected_players: usize) -> Self {
        Self {
            status: "ok".to_string(),
            connected_players,
        }
    }

    /// Report while the store is unreachable.
    pub fn degraded(connected_players: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            connected_players,
        }
    }
}
