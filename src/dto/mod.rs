use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Game snapshots and scoreboard.
pub mod game;
/// Health check payload.
pub mod health;
/// Round phase as exposed to clients.
pub mod phase;
/// Player join and buzz payloads.
pub mod player;
/// Question bank payloads.
pub mod question;
/// SSE event payloads.
pub mod sse;
/// Custom field validators.
pub mod validation;
/// Player WebSocket messages.
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
