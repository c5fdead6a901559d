use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::{
        player::BuzzRejectionReason,
        ws::{PlayerInboundMessage, PlayerOutboundMessage},
    },
    error::ServiceError,
    services::round_service,
    state::{
        PlayerConnection, SharedState,
        game::{GameState, RoundPhase},
    },
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure while serving a single inbound frame.
#[derive(Debug, Error)]
enum SocketError {
    /// Writer channel closed, the connection must end.
    #[error("connection closed")]
    ConnectionClosed,
    /// Buzz frame carrying another player's id.
    #[error("buzz ignored: mismatched ID (expected {expected}, got {got})")]
    MismatchedId { expected: String, got: String },
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of a player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let player_id = match PlayerInboundMessage::from_json_str(&initial_message) {
        Ok(PlayerInboundMessage::Identification { id }) => id,
        Ok(_) => {
            warn!("first message was not identification");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse player message");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let game = state.snapshot().await.state;
    if !game.players.contains_key(&player_id) {
        warn!(player_id = %player_id, "identification with unknown player id");
        let _ = send_message(
            &outbound_tx,
            &PlayerOutboundMessage::BuzzFeedback {
                accepted: false,
                reason: Some(BuzzRejectionReason::UnknownPlayer),
            },
        );
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }

    if let Some(previous) = state.connections().insert(
        player_id.clone(),
        PlayerConnection {
            player_id: player_id.clone(),
            tx: outbound_tx.clone(),
        },
    ) {
        debug!(player_id = %player_id, "replacing previous socket of the player");
        let _ = previous.tx.send(Message::Close(None));
    }
    info!(player_id = %player_id, "player connected");

    if send_message(&outbound_tx, &status_for(&game, &player_id)).is_err() {
        info!(player_id = %player_id, "connection closed during initial status, terminating");
        unregister(&state, &player_id, &outbound_tx);
        finalize(writer_task, outbound_tx).await;
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match PlayerInboundMessage::from_json_str(&text) {
                Ok(PlayerInboundMessage::Buzz { id }) => {
                    let res = if id == player_id {
                        handle_buzz(&state, &id, &outbound_tx).await
                    } else {
                        Err(SocketError::MismatchedId {
                            expected: player_id.clone(),
                            got: id,
                        })
                    };
                    if let Err(err) = res {
                        warn!(player_id = %player_id, error = %err, "error while handling buzz");
                        if matches!(err, SocketError::ConnectionClosed) {
                            break;
                        }
                    }
                }
                Ok(PlayerInboundMessage::Identification { .. }) => {
                    warn!(player_id = %player_id, "ignoring duplicate identification message");
                }
                Err(err) => {
                    warn!(player_id = %player_id, error = %err, "failed to parse player message");
                }
            },
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(player_id = %player_id, "player socket closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player_id = %player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    unregister(&state, &player_id, &outbound_tx);
    info!(player_id = %player_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

async fn handle_buzz(
    state: &SharedState,
    player_id: &str,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), SocketError> {
    let ack = match round_service::buzz(state, player_id).await {
        Ok(ack) => ack,
        Err(err) => {
            // Infrastructure failures still owe the device an answer.
            send_message(
                outbound_tx,
                &PlayerOutboundMessage::BuzzFeedback {
                    accepted: false,
                    reason: None,
                },
            )?;
            return Err(err.into());
        }
    };

    send_message(
        outbound_tx,
        &PlayerOutboundMessage::BuzzFeedback {
            accepted: ack.accepted,
            reason: ack.reason,
        },
    )
}

/// Push a fresh `status` frame to every connected player.
pub fn push_status_to_all(state: &SharedState, game: &GameState) {
    let mut closed = Vec::new();
    for entry in state.connections().iter() {
        let message = status_for(game, entry.key());
        if send_message(&entry.value().tx, &message).is_err() {
            closed.push(entry.key().clone());
        }
    }

    for player_id in closed {
        warn!(player_id = %player_id, "send failed (writer closed), removing player connection");
        state
            .connections()
            .remove_if(&player_id, |_, conn| conn.tx.is_closed());
    }
}

/// Per-player view of the round.
fn status_for(game: &GameState, player_id: &str) -> PlayerOutboundMessage {
    let player = game.players.get(player_id);
    let can_buzz = matches!(game.round.phase, RoundPhase::Active)
        && player.is_some()
        && !game.round.has_buzzed(player_id);

    PlayerOutboundMessage::Status {
        can_buzz,
        phase: (&game.round.phase).into(),
        timer: game.round.timer,
        score: player.map(|p| p.score).unwrap_or_default(),
    }
}

/// Drop the registry entry, unless another socket of the same player replaced it.
fn unregister(state: &SharedState, player_id: &str, tx: &mpsc::UnboundedSender<Message>) {
    state
        .connections()
        .remove_if(player_id, |_, conn| conn.tx.same_channel(tx));
}

/// Serialize a payload and queue it on the socket writer.
fn send_message<T>(tx: &mpsc::UnboundedSender<Message>, value: &T) -> Result<(), SocketError>
where
    T: ?Sized + serde::Serialize + std::fmt::Debug,
{
    let payload = match serde_json::to_string(value) {
        Ok(p) => p,
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{value:?}`");
            return Ok(());
        }
    };

    tx.send(Message::Text(payload.into()))
        .map_err(|_| SocketError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
