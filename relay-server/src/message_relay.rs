//! WebSocket message routing for the relay server.
//!
//! Every connection gets two Tokio tasks:
//! - **Send task**: Drains the outlet of the connection into the websocket
//! - **Receive task**: Reads the frames of the client and dispatches them
//!
//! Control frames go to the [`crate::pairing`] module. Gameplay frames get their tag byte swapped
//! and are handed to the other member of the room. The payload is never looked at.

use crate::lobby::AppState;
use crate::pairing;
use axum::extract::ws::{Message, WebSocket};
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

/// How long the send task gets to flush the last frames once the client side ended.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Does the whole handling from start to finish: registering the connection, running the send and
/// receive task until one of them ends, and tearing everything down.
pub async fn websocket(stream: WebSocket, state: Arc<AppState>) {
    // By splitting, we can send and receive at the same time.
    let (sender, receiver) = stream.split();
    let (connection_id, inlet) = state.connect().await;

    let mut send_task = tokio::spawn(async move { send_logic(sender, inlet).await });

    let receive_state = state.clone();
    let mut receive_task = tokio::spawn(async move {
        receive_logic(receiver, receive_state, connection_id).await
    });

    // If any one of the tasks run to completion, we end the other.
    let result = tokio::select! {
        res_a = &mut send_task => {receive_task.abort(); res_a},
        res_b = &mut receive_task => {
            // Dropping the outlet lets the send task deliver what is queued, an error notice included.
            state.lobby.lock().await.unregister(connection_id);
            if tokio::time::timeout(FLUSH_TIMEOUT, &mut send_task).await.is_err() {
                send_task.abort();
            }
            res_b
        },
    };

    let reason = result.unwrap_or_else(|err| {
        tracing::error!(?err, "Error while handling connection logic.");
        "Internal panic in connection logic."
    });
    tracing::info!(connection = %connection_id, reason, "Connection ended.");

    pairing::disconnect(&state, connection_id).await;
}

/// Delivers everything that got pushed into the outlet of this connection.
async fn send_logic(
    mut sender: SplitSink<WebSocket, Message>,
    mut inlet: Receiver<Bytes>,
) -> &'static str {
    while let Some(bytes) = inlet.recv().await {
        let res = sender.send(Message::Binary(bytes)).await;
        if let Err(err) = res {
            tracing::error!(?err, "Error in communication with client endpoint.");
            return "Error in communication with client endpoint.";
        }
    }
    // The outlet only gets dropped when the connection ends.
    let _ = sender.send(Message::Close(None)).await;
    "Internal channel closed."
}

/// Reads the frames of the client until the connection breaks or the client misbehaves.
async fn receive_logic(
    mut receiver: SplitStream<WebSocket>,
    state: Arc<AppState>,
    connection_id: ConnectionId,
) -> &'static str {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Binary(bytes)) => {
                if let Err(reason) = dispatch(&state, connection_id, bytes).await {
                    return reason;
                }
            }
            Ok(Message::Close(_)) => return "Connection closed by client.",
            Ok(_) => {} // Ignore other messages (ping/pong handled by axum)
            Err(_) => {
                return "Connection lost.";
            }
        }
    }
    "Connection lost."
}

/// Tells the client why it gets cut off. ewebsock does not report close reasons, so this goes out
/// as a regular frame.
async fn reject(
    state: &AppState,
    connection_id: ConnectionId,
    reason: &'static str,
) -> Result<(), &'static str> {
    tracing::error!(connection = %connection_id, reason, "Closing connection.");
    let lobby = state.lobby.lock().await;
    lobby.send_event(connection_id, &ServerEvent::ServerError(reason.to_string()));
    Err(reason)
}

/// Handles one frame of a client. An error ends the connection, the text says why.
/// Protocol violations get a server error frame before the end.
pub async fn dispatch(
    state: &AppState,
    connection_id: ConnectionId,
    bytes: Bytes,
) -> Result<(), &'static str> {
    let Ok((tag, payload)) = split_frame(&bytes) else {
        return reject(state, connection_id, "Illegal empty message received.").await;
    };

    match tag {
        REQUEST_ROOM_ID => pairing::request_room_id(state, connection_id).await,
        HOST_GAME => pairing::host_game(state, connection_id, payload).await,
        JOIN_GAME => pairing::join_game(state, connection_id, payload).await,
        CLIENT_LEAVES => {
            // This something normal to be expected.
            return Err("Client disconnected intentionally");
        }
        _ => {
            let Some(relayed) = relayed_tag(tag) else {
                tracing::debug!(connection = %connection_id, command = tag, "Unknown tag.");
                return reject(state, connection_id, "Illegal Command from client").await;
            };
            relay(state, connection_id, relayed, payload).await;
        }
    }
    Ok(())
}

/// Retags the frame and passes it on to the rest of the room.
async fn relay(state: &AppState, connection_id: ConnectionId, tag: u8, payload: &[u8]) {
    let mut msg = BytesMut::with_capacity(1 + payload.len());
    msg.put_u8(tag);
    msg.put_slice(payload);

    let lobby = state.lobby.lock().await;
    if lobby.directory.room_of(connection_id).is_none() {
        // Frames before pairing or after the room went away are dropped.
        tracing::debug!(connection = %connection_id, tag, "Relay frame outside of a room dropped.");
        return;
    }
    lobby.send_to_others(connection_id, msg.freeze());
}
