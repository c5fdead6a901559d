use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::game::PlayerSummary;

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// Event name, `None` for the default event.
    pub event: Option<String>,
    /// JSON payload.
    pub data: String,
}

impl ServerEvent {
    /// Build an event carrying raw text.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to an SSE client when it connects.
pub struct Handshake {
    /// Identifier of the SSE stream (`public` or `host`).
    pub stream: String,
    /// Whether the backend is running without a store connection.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the backend enters or leaves degraded mode.
pub struct SystemStatus {
    /// Whether the store is unreachable.
    pub degraded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast on every countdown step.
pub struct TimerTickEvent {
    /// Round counter.
    pub round: u64,
    /// Seconds left.
    pub timer: u32,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a new player joins.
pub struct PlayerJoinedEvent {
    /// Player who joined.
    pub player: PlayerSummary,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when a round ends, with or without a winner.
pub struct RoundResolvedEvent {
    /// Round counter.
    pub round: u64,
    /// Winner, if any.
    pub winner: Option<PlayerSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the question bank changes.
pub struct QuestionsChangedEvent {
    /// Number of questions in the bank.
    pub count: usize,
}
