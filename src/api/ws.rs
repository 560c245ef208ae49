// WebSocket handler for the map event channel.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};

use super::AppState;
use crate::hub::{outbound_channel, Membership};
use crate::metrics;
use crate::protocol::ClientMessage;

/// WebSocket upgrade handler for map event subscriptions.
pub async fn ws_maps(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: AppState) {
    metrics::CONNECTED_WEBSOCKETS.inc();
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = outbound_channel();
    let mut membership = Membership::new(state.hub.clone(), out_tx);

    // Room frames go out; join/leave frames come in. Either side closing
    // ends the session.
    loop {
        tokio::select! {
            frame = out_rx.recv() => {
                let Some(frame) = frame else { break };
                if sink.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            result = stream.next() => {
                match result {
                    Some(Ok(Message::Text(text))) => match ClientMessage::parse(text.as_str()) {
                        Ok(msg) => membership.apply(&msg),
                        Err(e) => tracing::warn!("Ignoring client frame: {e}"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket receive error: {e}");
                        break;
                    }
                    _ => {
                        // Ping/pong/binary
                    }
                }
            }
        }
    }

    membership.leave_all();
    metrics::CONNECTED_WEBSOCKETS.dec();
}
