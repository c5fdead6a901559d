use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    services::sse_service::{self, StreamKind},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/sse/public",
    tag = "sse",
    responses((status = 200, description = "Public SSE stream, answers omitted", content_type = "text/event-stream", body = String))
)]
/// Stream realtime events to the shared screen and the players.
pub async fn public_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before building the snapshot so nothing committed in between is lost.
    let receiver = sse_service::subscribe(&state, StreamKind::Public);
    let initial = sse_service::initial_events(&state, StreamKind::Public).await;
    info!("new public SSE connection");
    sse_service::broadcast_info(state.host_sse(), "public stream connected");
    sse_service::to_sse_stream(initial, receiver, StreamKind::Public)
}

#[utoipa::path(
    get,
    path = "/sse/host",
    tag = "sse",
    responses((status = 200, description = "Host SSE stream, answers included", content_type = "text/event-stream", body = String))
)]
/// Stream realtime events to the host console.
pub async fn host_stream(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = sse_service::subscribe(&state, StreamKind::Host);
    let initial = sse_service::initial_events(&state, StreamKind::Host).await;
    info!("new host SSE connection");
    sse_service::to_sse_stream(initial, receiver, StreamKind::Host)
}

/// SSE routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/sse/public", get(public_stream))
        .route("/sse/host", get(host_stream))
}
