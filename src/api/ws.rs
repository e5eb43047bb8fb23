//! WebSocket broadcast server for real-time recorder events.
//!
//! Captured steps, recording status changes and run status changes are
//! pushed to every connected UI client; the client never needs to poll
//! while a recording is live.

use crate::recording::{SessionStatus, Step};
use crate::runner::RunStatus;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Maximum number of events to buffer per client.
const CHANNEL_CAPACITY: usize = 100;

/// WebSocket event types pushed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum WsEvent {
    /// One captured interaction, streamed while recording.
    #[serde(rename = "record:step")]
    RecordStep { browser_id: String, step: Step },
    /// Recording session transitioned (started/stopped/saved/discarded).
    #[serde(rename = "recording-status")]
    RecordingStatus {
        browser_id: String,
        status: SessionStatus,
        step_count: usize,
    },
    /// Playback run transitioned.
    #[serde(rename = "run-status")]
    RunStatus { run_id: String, status: RunStatus },
    /// Heartbeat (sent every 30s to keep connection alive).
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

/// Shared broadcast sender for WebSocket events.
#[derive(Clone)]
pub struct WsBroadcaster {
    tx: broadcast::Sender<WsEvent>,
}

impl WsBroadcaster {
    /// Create a new broadcaster.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Broadcast an event to all connected clients.
    pub fn broadcast(&self, event: WsEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events (returns a receiver for a new client).
    pub fn subscribe(&self) -> broadcast::Receiver<WsEvent> {
        self.tx.subscribe()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket upgrade handler for `/api/ws`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    // Split into sink and stream
    let (mut sender, mut receiver) = socket.split();

    // Subscribe to events
    let mut rx = state.ws_broadcaster.subscribe();

    // Spawn task to send events to client
    let send_task = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&event) {
                if sender.send(Message::Text(json)).await.is_err() {
                    break; // Client disconnected
                }
            }
        }
    });

    // Handle incoming messages (close frames; axum answers pings itself)
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if matches!(msg, Message::Close(_)) {
                break;
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}
