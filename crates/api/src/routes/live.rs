//! Live WebSocket feed of admitted readings

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use ledger::LiveReading;
use serde::Serialize;
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tracing::{debug, warn};

use crate::SharedState;

/// Frame pushed to subscribers
#[derive(Debug, Serialize)]
pub struct LiveEvent<'a> {
    pub event: &'static str,
    pub data: &'a LiveReading,
}

/// Upgrade to a WebSocket streaming `weightUpdate` events
pub async fn live_feed(ws: WebSocketUpgrade, State(state): State<SharedState>) -> Response {
    let rx = state.ledger.subscribe();
    ws.on_upgrade(move |socket| stream_readings(socket, rx))
}

async fn stream_readings(mut socket: WebSocket, mut rx: Receiver<LiveReading>) {
    debug!("Live subscriber connected");
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(reading) => {
                    let event = LiveEvent { event: "weightUpdate", data: &reading };
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Failed to encode live reading: {}", e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Live subscriber lagged, skipped {} readings", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    debug!("Live subscriber disconnected");
}
