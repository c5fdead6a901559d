use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::{
        game::{HostGameSnapshot, PublicGameSnapshot},
        sse::{Handshake, ServerEvent},
    },
    services::sse_events::{EVENT_GAME_STATE, EVENT_INFO},
    state::{SharedState, SseHub},
};

/// Identifies the target SSE stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    /// Shared screen and players, no answers.
    Public,
    /// Host console, answers included.
    Host,
}

impl StreamKind {
    /// Stream name used in logs and the handshake.
    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Public => "public",
            StreamKind::Host => "host",
        }
    }
}

/// Subscribe to the hub matching `kind`.
pub fn subscribe(state: &SharedState, kind: StreamKind) -> broadcast::Receiver<ServerEvent> {
    match kind {
        StreamKind::Public => state.public_sse().subscribe(),
        StreamKind::Host => state.host_sse().subscribe(),
    }
}

/// Events sent to a freshly connected client before the live feed: a
/// handshake and the current game snapshot.
pub async fn initial_events(state: &SharedState, kind: StreamKind) -> Vec<ServerEvent> {
    let snapshot = state.snapshot().await;
    let count = state.question_count().await;
    let question = state.question_at(snapshot.state.round.question_index).await;

    let handshake = ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            stream: kind.name().to_string(),
            degraded: state.is_degraded(),
        },
    );
    let game = match kind {
        StreamKind::Public => ServerEvent::json(
            Some(EVENT_GAME_STATE.to_string()),
            &PublicGameSnapshot::build(&snapshot.state, question.as_ref(), count),
        ),
        StreamKind::Host => ServerEvent::json(
            Some(EVENT_GAME_STATE.to_string()),
            &HostGameSnapshot::build(&snapshot.state, question.as_ref(), count),
        ),
    };

    [handshake, game]
        .into_iter()
        .filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(err) => {
                warn!(error = %err, "failed to serialize initial SSE payload");
                None
            }
        })
        .collect()
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
pub fn to_sse_stream(
    initial: Vec<ServerEvent>,
    mut receiver: broadcast::Receiver<ServerEvent>,
    kind: StreamKind,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        for payload in initial {
            if tx.send(Ok(to_event(payload))).await.is_err() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            if tx.send(Ok(to_event(payload))).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(stream = kind.name(), skipped, "SSE subscriber lagged");
                            continue;
                        }
                    }
                }
            }
        }

        info!(stream = kind.name(), "SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_event(payload: ServerEvent) -> Event {
    let event = Event::default().data(payload.data);
    match payload.event {
        Some(name) => event.event(name),
        None => event,
    }
}

/// Send a human-readable info message onto a stream.
pub fn broadcast_info(hub: &SseHub, message: &str) {
    hub.broadcast(ServerEvent::new(
        Some(EVENT_INFO.to_string()),
        message.to_string(),
    ));
}
