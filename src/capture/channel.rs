//! Event capture channel: a long-lived WebSocket client dialed to the
//! browser driver's event stream.
//!
//! The driver emits one `record:step` message per user interaction; each is
//! validated into a [`Step`] at this boundary and forwarded in arrival order
//! to the session buffer and the UI broadcast. The channel is asymmetric:
//! nothing is sent driver-ward here (start/stop travel over the control
//! HTTP API). Delivery is at-most-once: on an involuntary disconnect the
//! channel reconnects with backoff and events lost in the gap stay lost.

use crate::api::ws::{WsBroadcaster, WsEvent};
use crate::error::{Result, TestflowError};
use crate::recording::{RecordingSessionManager, Step};
use futures::StreamExt;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Wire envelope for driver-side capture events.
#[derive(Debug, Deserialize)]
struct CaptureEvent {
    event: String,
    #[serde(default)]
    step: Option<Step>,
}

pub struct CaptureChannel {
    ws_url: String,
    browser_id: String,
    sessions: Arc<RecordingSessionManager>,
    broadcaster: WsBroadcaster,
}

impl CaptureChannel {
    pub fn new(
        ws_url: String,
        browser_id: String,
        sessions: Arc<RecordingSessionManager>,
        broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            ws_url,
            browser_id,
            sessions,
            broadcaster,
        }
    }

    /// Spawn the channel task. It runs until `shutdown` fires or the session
    /// leaves the recording state.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            if *shutdown.borrow() || !self.sessions.is_recording(&self.browser_id) {
                break;
            }

            match self.attach(&mut shutdown).await {
                Ok(()) => break, // clean shutdown
                Err(e) => {
                    // Recoverable: events in the gap are lost, the session
                    // keeps going.
                    tracing::warn!(
                        "Capture channel dropped for browser {}: {}. Reconnecting in {:?}",
                        self.browser_id,
                        e,
                        backoff
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = shutdown.changed() => break,
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }

        tracing::debug!("Capture channel closed: browser={}", self.browser_id);
    }

    /// One connection lifetime. Returns Ok on deliberate shutdown, Err when
    /// the connection drops and a reconnect is warranted.
    async fn attach(&self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        let (ws_stream, _) = connect_async(&self.ws_url)
            .await
            .map_err(|e| TestflowError::ChannelDisconnected(e.to_string()))?;

        tracing::info!(
            "Capture channel connected: browser={} url={}",
            self.browser_id,
            self.ws_url
        );

        let (_tx, mut rx) = ws_stream.split();

        loop {
            tokio::select! {
                msg = rx.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => self.handle_message(&text),
                        Some(Ok(WsMessage::Close(_))) | None => {
                            return Err(TestflowError::ChannelDisconnected(
                                "stream closed by peer".to_string(),
                            ));
                        }
                        Some(Ok(_)) => {} // ping/pong/binary ignored
                        Some(Err(e)) => {
                            return Err(TestflowError::ChannelDisconnected(e.to_string()));
                        }
                    }
                }
                _ = shutdown.changed() => return Ok(()),
            }
        }
    }

    /// Parse, validate and forward one capture message. Malformed events are
    /// dropped with a warning; they never abort the recording.
    pub fn handle_message(&self, text: &str) {
        let event: CaptureEvent = match serde_json::from_str(text) {
            Ok(ev) => ev,
            Err(e) => {
                tracing::warn!("Dropping malformed capture event: {}", e);
                return;
            }
        };

        if event.event != "record:step" {
            tracing::debug!("Ignoring capture event '{}'", event.event);
            return;
        }

        let step = match event.step.map(Step::validated) {
            Some(Ok(step)) => step,
            Some(Err(e)) => {
                tracing::warn!("Dropping invalid step: {}", e);
                return;
            }
            None => {
                tracing::warn!("Dropping record:step event without a step payload");
                return;
            }
        };

        match self.sessions.add_step(&self.browser_id, step.clone()) {
            Ok(count) => {
                tracing::debug!(
                    "Captured step {} for browser {}: {}",
                    count,
                    self.browser_id,
                    step.action
                );
                self.broadcaster.broadcast(WsEvent::RecordStep {
                    browser_id: self.browser_id.clone(),
                    step,
                });
            }
            Err(e) => {
                // Session stopped while the event was in flight.
                tracing::debug!("Dropping step for browser {}: {}", self.browser_id, e);
            }
        }
    }
}
