use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI JSON.
pub mod docs;
/// Health check.
pub mod health;
/// Host adjudication and round control.
pub mod host;
/// Player join and HTTP buzz.
pub mod player;
/// Read-only public views.
pub mod public;
/// Question bank CRUD.
pub mod questions;
/// SSE streams.
pub mod sse;
/// Player WebSocket endpoint.
pub mod websocket;

/// Compose all route trees and wire in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(sse::router())
        .merge(websocket::router())
        .merge(player::router())
        .merge(public::router())
        .merge(host::router())
        .merge(questions::router())
        .merge(docs::router())
        .with_state(state)
}
