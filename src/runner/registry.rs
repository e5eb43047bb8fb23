//! In-memory registry of playback runs, keyed by run id.
//!
//! Runs are independent; many may be live at once. The registry owns each
//! run's cancellation flag so a cancel request can interrupt the in-flight
//! step rather than waiting for it.

use crate::error::{Result, TestflowError};
use crate::runner::schema::{AiAnalysis, PlaybackResult, RunStatus, StepResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

pub struct RunRegistry {
    runs: Arc<RwLock<HashMap<String, PlaybackResult>>>,
    cancels: Arc<Mutex<HashMap<String, watch::Sender<bool>>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(HashMap::new())),
            cancels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a new pending run and hand back its cancellation receiver.
    pub fn register(&self, script_id: &str, project_id: &str) -> (String, watch::Receiver<bool>) {
        let run_id = uuid::Uuid::new_v4().to_string();
        let result = PlaybackResult {
            run_id: run_id.clone(),
            script_id: script_id.to_string(),
            project_id: project_id.to_string(),
            status: RunStatus::Pending,
            step_results: Vec::new(),
            started_at: now_ms(),
            completed_at: None,
            error: None,
            analysis: None,
        };

        let (tx, rx) = watch::channel(false);
        self.runs.write().insert(run_id.clone(), result);
        self.cancels.lock().insert(run_id.clone(), tx);
        (run_id, rx)
    }

    pub fn get(&self, run_id: &str) -> Result<PlaybackResult> {
        self.runs
            .read()
            .get(run_id)
            .cloned()
            .ok_or_else(|| TestflowError::NotFound(format!("run {}", run_id)))
    }

    /// Request cancellation of a live run. Finished runs cannot be cancelled.
    pub fn cancel(&self, run_id: &str) -> Result<()> {
        let current = self.get(run_id)?;
        if current.status.is_terminal() {
            return Err(TestflowError::InvalidState(format!(
                "run {} already finished",
                run_id
            )));
        }

        if let Some(tx) = self.cancels.lock().get(run_id) {
            let _ = tx.send(true);
        }
        tracing::info!("Cancellation requested: run={}", run_id);
        Ok(())
    }

    pub(crate) fn set_running(&self, run_id: &str) {
        if let Some(run) = self.runs.write().get_mut(run_id) {
            run.status = RunStatus::Running;
        }
    }

    pub(crate) fn push_step(&self, run_id: &str, step: StepResult) {
        if let Some(run) = self.runs.write().get_mut(run_id) {
            run.step_results.push(step);
        }
    }

    /// Record the terminal state of a run and drop its cancel handle.
    pub(crate) fn finalize(
        &self,
        run_id: &str,
        status: RunStatus,
        error: Option<String>,
        analysis: Option<AiAnalysis>,
    ) {
        if let Some(run) = self.runs.write().get_mut(run_id) {
            run.status = status;
            run.error = error;
            run.analysis = analysis;
            run.completed_at = Some(now_ms());
        }
        self.cancels.lock().remove(run_id);
    }
}

impl Default for RunRegistry {
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
