use crate::api::ws::WsBroadcaster;
use crate::capture::DriverControl;
use crate::config::AppConfig;
use crate::recording::RecordingSessionManager;
use crate::runner::{PlaybackRunner, RunRegistry};
use crate::script::ScriptStore;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Application global state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<AppConfig>>,
    /// Recording sessions, one per browser instance.
    pub sessions: Arc<RecordingSessionManager>,
    /// Persisted scripts.
    pub scripts: Arc<ScriptStore>,
    /// Live and completed playback runs.
    pub runs: Arc<RunRegistry>,
    /// Executes playback runs against the browser driver.
    pub runner: PlaybackRunner,
    /// Control client for the browser driver (capture start/stop).
    pub driver: DriverControl,
    /// WebSocket broadcaster for real-time events.
    pub ws_broadcaster: WsBroadcaster,
    /// Shutdown handles for running capture channels, per browser instance.
    pub capture_shutdowns: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl AppState {
    pub fn new(config: AppConfig, scripts: Arc<ScriptStore>) -> Self {
        let runner = PlaybackRunner::new(
            config.driver_url.clone(),
            config.analysis_url.clone(),
            config.step_timeout_ms,
        );
        let driver = DriverControl::new(config.driver_url.clone());

        Self {
            config: Arc::new(RwLock::new(config)),
            sessions: Arc::new(RecordingSessionManager::new()),
            scripts,
            runs: Arc::new(RunRegistry::new()),
            runner,
            driver,
            ws_broadcaster: WsBroadcaster::new(),
            capture_shutdowns: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Broadcast a WebSocket event to all connected clients.
    pub fn broadcast_ws(&self, event: crate::api::ws::WsEvent) {
        self.ws_broadcaster.broadcast(event);
    }

    /// Stop the capture channel for a browser instance, if one is running.
    pub fn shutdown_capture(&self, browser_id: &str) {
        if let Some(tx) = self.capture_shutdowns.lock().remove(browser_id) {
            let _ = tx.send(true);
        }
    }
}
