//! WebSocket push channel.
//!
//! On connect the client receives a full `cop.snapshot`, then every state
//! change as a JSON envelope, in commit order. Incoming client messages are
//! keep-alive only; anything other than a close frame is ignored.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use super::AppState;

/// `GET /ws` - upgrade to the push stream.
#[tracing::instrument(skip(state, ws))]
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut rx, snapshot) = state.attach_subscriber();
    debug!(subscriber = %id, "websocket connected");

    // The snapshot frame was built in the same critical section that
    // registered the queue, so sending it first gives the client a
    // consistent baseline before any incremental.
    if let Some(frame) = snapshot {
        if sender.send(Message::Text(frame.to_string())).await.is_err() {
            state.detach_subscriber(id);
            return;
        }
    }

    loop {
        tokio::select! {
            queued = rx.recv() => {
                match queued {
                    Some(frame) => {
                        if sender.send(Message::Text(frame.to_string())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    // Text/binary from clients is keep-alive noise.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    state.detach_subscriber(id);
    debug!(subscriber = %id, "websocket disconnected");
}
