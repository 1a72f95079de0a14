//! WebSocket upgrade + broadcast loop. Every text frame a client sends is relayed
//! verbatim to all other connected clients.

use std::sync::Arc;

use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, instrument, warn};

use crate::broadcast::Hub;
use crate::state::AppState;

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "broadcast", "WebSocket upgrade requested");
  let hub = state.hub.clone();
  ws.on_upgrade(move |socket| handle_ws(socket, hub))
}

#[instrument(level = "info", skip(socket, hub))]
async fn handle_ws(socket: WebSocket, hub: Hub) {
  let (mut sink, mut stream) = socket.split();
  let (peer, mut outbox) = hub.join().await;

  // Writer: drains what other peers relayed to us.
  let writer = tokio::spawn(async move {
    while let Some(text) = outbox.recv().await {
      if let Err(e) = sink.send(Message::Text(text)).await {
        warn!(target: "broadcast", %peer, error = %e, "WS send error");
        break;
      }
    }
  });

  while let Some(frame) = stream.next().await {
    match frame {
      Ok(Message::Text(text)) => {
        let delivered = hub.relay(peer, &text).await;
        debug!(target: "broadcast", %peer, delivered, "Relayed message");
      }
      Ok(Message::Close(_)) => break,
      Ok(_) => {}
      Err(e) => {
        warn!(target: "broadcast", %peer, error = %e, "WS receive error");
        break;
      }
    }
  }

  hub.leave(peer).await;
  writer.abort();
  info!(target: "broadcast", %peer, "WebSocket disconnected");
}
