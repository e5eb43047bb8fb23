//! Active recording session management.
//!
//! One session per browser instance, single-writer: capture events and
//! explicit user actions are the only mutators, serialized on the manager
//! lock. The lock also orders in-flight capture appends against the
//! `Recording -> Stopped` transition, which is what flushes the buffer.

use crate::error::{Result, TestflowError};
use crate::recording::step::Step;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Lifecycle state of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Recording,
    Stopped,
}

/// An active recording session: ordered step buffer plus the seed url.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub id: String,
    pub browser_id: String,
    pub status: SessionStatus,
    pub url: String,
    pub steps: Vec<Step>,
    pub started_at: u64,
}

impl RecordingSession {
    fn new(browser_id: String, url: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            browser_id,
            status: SessionStatus::Recording,
            url,
            steps: Vec::new(),
            started_at: now_ms(),
        }
    }
}

/// Public session info for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub browser_id: String,
    pub status: SessionStatus,
    pub url: String,
    pub step_count: usize,
    pub started_at: u64,
}

impl From<&RecordingSession> for SessionInfo {
    fn from(session: &RecordingSession) -> Self {
        Self {
            id: session.id.clone(),
            browser_id: session.browser_id.clone(),
            status: session.status,
            url: session.url.clone(),
            step_count: session.steps.len(),
            started_at: session.started_at,
        }
    }
}

/// Manages recording sessions, at most one per browser instance.
pub struct RecordingSessionManager {
    sessions: Arc<Mutex<HashMap<String, RecordingSession>>>,
}

impl RecordingSessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a new recording session against a browser instance.
    ///
    /// Valid only when the browser has no session (idle). A session that is
    /// still `Recording` or holds an unsaved `Stopped` buffer must be saved
    /// or discarded first; start never queues behind it. The capture stream
    /// is shared, so while any browser is live-recording no other browser
    /// may start: concurrent recordings would ingest each other's events.
    pub fn start(&self, browser_id: &str, url: &str) -> Result<SessionInfo> {
        let mut sessions = self.sessions.lock();

        if let Some(existing) = sessions.get(browser_id) {
            return Err(TestflowError::InvalidState(format!(
                "browser {} already has a {} session; stop and save or discard it first",
                browser_id,
                match existing.status {
                    SessionStatus::Recording => "recording",
                    _ => "stopped unsaved",
                }
            )));
        }

        if let Some(live) = sessions
            .values()
            .find(|s| s.status == SessionStatus::Recording)
        {
            return Err(TestflowError::InvalidState(format!(
                "browser {} is already recording on this driver; stop it first",
                live.browser_id
            )));
        }

        let session = RecordingSession::new(browser_id.to_string(), url.to_string());
        let info = SessionInfo::from(&session);
        sessions.insert(browser_id.to_string(), session);

        tracing::info!("Recording started: browser={} url={}", browser_id, url);
        Ok(info)
    }

    /// Append a captured step to the active session.
    ///
    /// Fails when no session is recording; the caller drops the event and
    /// logs it. Timestamps are clamped to be non-decreasing since capture
    /// order, not clock skew, is authoritative.
    pub fn add_step(&self, browser_id: &str, step: Step) -> Result<usize> {
        let mut sessions = self.sessions.lock();

        let session = sessions.get_mut(browser_id).ok_or_else(|| {
            TestflowError::InvalidState(format!("no active recording for browser {}", browser_id))
        })?;

        if session.status != SessionStatus::Recording {
            return Err(TestflowError::InvalidState(format!(
                "session for browser {} is not recording",
                browser_id
            )));
        }

        let mut step = step;
        if let Some(last) = session.steps.last() {
            if step.timestamp < last.timestamp {
                tracing::debug!(
                    "Clamping out-of-order timestamp {} -> {}",
                    step.timestamp,
                    last.timestamp
                );
                step.timestamp = last.timestamp;
            }
        }

        session.steps.push(step);
        Ok(session.steps.len())
    }

    /// Stop an active recording. The buffer is retained for save/inspection.
    pub fn stop(&self, browser_id: &str) -> Result<SessionInfo> {
        let mut sessions = self.sessions.lock();

        let session = sessions.get_mut(browser_id).ok_or_else(|| {
            TestflowError::InvalidState(format!("no active recording for browser {}", browser_id))
        })?;

        if session.status != SessionStatus::Recording {
            return Err(TestflowError::InvalidState(format!(
                "session for browser {} was already stopped",
                browser_id
            )));
        }

        session.status = SessionStatus::Stopped;
        tracing::info!(
            "Recording stopped: browser={} steps={}",
            browser_id,
            session.steps.len()
        );
        Ok(SessionInfo::from(&*session))
    }

    /// Snapshot the buffered steps for saving, implicitly stopping a session
    /// that is still recording. Fails with `EmptyRecording` before anything
    /// is written anywhere; the session is left untouched in that case.
    /// The caller persists the steps and then calls [`discard`] on success.
    ///
    /// [`discard`]: RecordingSessionManager::discard
    pub fn snapshot_for_save(&self, browser_id: &str) -> Result<Vec<Step>> {
        let mut sessions = self.sessions.lock();

        let session = sessions.get_mut(browser_id).ok_or_else(|| {
            TestflowError::InvalidState(format!("no recording session for browser {}", browser_id))
        })?;

        if session.steps.is_empty() {
            return Err(TestflowError::EmptyRecording);
        }

        session.status = SessionStatus::Stopped;
        Ok(session.steps.clone())
    }

    /// Drop the session (if any) and return the browser to idle. Nothing is
    /// persisted; valid from any state.
    pub fn discard(&self, browser_id: &str) {
        if self.sessions.lock().remove(browser_id).is_some() {
            tracing::info!("Recording discarded: browser={}", browser_id);
        }
    }

    /// Session info for a browser instance, if a session exists.
    pub fn info(&self, browser_id: &str) -> Option<SessionInfo> {
        self.sessions.lock().get(browser_id).map(SessionInfo::from)
    }

    /// Whether a browser instance currently has a live recording.
    pub fn is_recording(&self, browser_id: &str) -> bool {
        self.sessions
            .lock()
            .get(browser_id)
            .is_some_and(|s| s.status == SessionStatus::Recording)
    }
}

impl Default for RecordingSessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
