//! Playback executor: drives the browser driver through a script's steps
//! strictly in order, fail-fast, with per-step timeouts and cancellation.

use crate::error::{Result, TestflowError};
use crate::recording::{Action, Step};
use crate::runner::registry::RunRegistry;
use crate::runner::schema::{AiAnalysis, RunStatus, StepResult, StepStatus};
use crate::script::Script;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Executes playback runs against a browser driver HTTP API.
#[derive(Clone)]
pub struct PlaybackRunner {
    driver_url: String,
    analysis_url: Option<String>,
    step_timeout: Duration,
    client: reqwest::Client,
}

impl PlaybackRunner {
    pub fn new(driver_url: String, analysis_url: Option<String>, step_timeout_ms: u64) -> Self {
        Self {
            driver_url,
            analysis_url,
            step_timeout: Duration::from_millis(step_timeout_ms),
            client: reqwest::Client::new(),
        }
    }

    /// Start a run. Returns the run id immediately; execution proceeds on a
    /// spawned task and the registry tracks progress.
    pub fn start(&self, script: Script, registry: Arc<RunRegistry>) -> String {
        let (run_id, cancel_rx) = registry.register(&script.id, &script.project_id);

        let runner = self.clone();
        let task_run_id = run_id.clone();
        tokio::spawn(async move {
            runner.run(script, registry, task_run_id, cancel_rx).await;
        });

        run_id
    }

    async fn run(
        &self,
        script: Script,
        registry: Arc<RunRegistry>,
        run_id: String,
        mut cancel_rx: watch::Receiver<bool>,
    ) {
        registry.set_running(&run_id);
        tracing::info!(
            "Playback started: run={} script={} steps={}",
            run_id,
            script.id,
            script.steps.len()
        );

        for (index, step) in script.steps.iter().enumerate() {
            let started = std::time::Instant::now();

            let outcome = tokio::select! {
                outcome = tokio::time::timeout(self.step_timeout, self.execute_step(step)) => {
                    match outcome {
                        // Keep the driver's own message; the index is what
                        // this layer adds.
                        Ok(result) => result.map_err(|e| match e {
                            TestflowError::Driver(message) => {
                                TestflowError::StepExecution { index, message }
                            }
                            other => other,
                        }),
                        Err(_) => Err(TestflowError::StepExecution {
                            index,
                            message: format!(
                                "timeout after {}ms waiting for {}",
                                self.step_timeout.as_millis(),
                                step.action
                            ),
                        }),
                    }
                }
                _ = cancel_rx.changed() => {
                    let duration_ms = started.elapsed().as_millis() as u64;
                    registry.push_step(&run_id, StepResult {
                        index,
                        action: step.action.to_string(),
                        status: StepStatus::Failed,
                        duration_ms,
                        error: Some("cancelled".to_string()),
                        logs: vec![],
                    });
                    registry.finalize(
                        &run_id,
                        RunStatus::Failed,
                        Some(format!("run cancelled at step {}", index)),
                        None,
                    );
                    tracing::info!("Playback cancelled: run={} step={}", run_id, index);
                    return;
                }
            };

            let duration_ms = started.elapsed().as_millis() as u64;

            match outcome {
                Ok(logs) => {
                    registry.push_step(
                        &run_id,
                        StepResult {
                            index,
                            action: step.action.to_string(),
                            status: StepStatus::Passed,
                            duration_ms,
                            error: None,
                            logs,
                        },
                    );
                }
                Err(e) => {
                    // Fail fast: later steps depend on the state this one
                    // failed to produce.
                    let message = match &e {
                        TestflowError::StepExecution { message, .. } => message.clone(),
                        other => other.to_string(),
                    };
                    registry.push_step(
                        &run_id,
                        StepResult {
                            index,
                            action: step.action.to_string(),
                            status: StepStatus::Failed,
                            duration_ms,
                            error: Some(message.clone()),
                            logs: vec![],
                        },
                    );

                    let analysis = self.fetch_analysis(&script, &run_id, index, &message).await;
                    registry.finalize(
                        &run_id,
                        RunStatus::Failed,
                        Some(format!("Step {} failed: {}", index, message)),
                        analysis,
                    );
                    tracing::warn!(
                        "Playback failed: run={} step={} error={}",
                        run_id,
                        index,
                        message
                    );
                    return;
                }
            }
        }

        registry.finalize(&run_id, RunStatus::Passed, None, None);
        tracing::info!("Playback passed: run={}", run_id);
    }

    /// Execute one step against the driver. Returns driver log lines.
    async fn execute_step(&self, step: &Step) -> Result<Vec<String>> {
        let (path, body) = match &step.action {
            Action::Navigate => (
                "navigate",
                serde_json::json!({ "url": step.url.as_deref().unwrap_or_default() }),
            ),
            Action::Click => (
                "click",
                serde_json::json!({ "selector": step.selector.as_deref().unwrap_or_default() }),
            ),
            Action::Type => (
                "type",
                serde_json::json!({
                    "selector": step.selector.as_deref().unwrap_or_default(),
                    "text": step.value.as_deref().unwrap_or_default(),
                }),
            ),
            Action::Scroll => (
                "scroll",
                serde_json::json!({ "selector": step.selector.as_deref().unwrap_or_default() }),
            ),
            Action::Other(name) => {
                return Err(TestflowError::Driver(format!(
                    "unsupported action '{}'",
                    name
                )));
            }
        };

        let url = format!("{}/{}", self.driver_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TestflowError::Driver(e.to_string()))?;

        let status = response.status();
        let payload: serde_json::Value = response.json().await.unwrap_or_default();
        let mut logs = vec![format!("POST /{} -> {}", path, status.as_u16())];
        if let Some(driver_logs) = payload.get("logs").and_then(|v| v.as_array()) {
            logs.extend(
                driver_logs
                    .iter()
                    .filter_map(|l| l.as_str().map(String::from)),
            );
        }

        if !status.is_success() {
            let message = payload
                .get("error")
                .and_then(|v| v.as_str())
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(TestflowError::Driver(message));
        }

        Ok(logs)
    }

    /// Ask the external analyzer for a diagnosis of the failed step. The
    /// payload is opaque; analyzer unavailability never changes the verdict.
    async fn fetch_analysis(
        &self,
        script: &Script,
        run_id: &str,
        failed_index: usize,
        error: &str,
    ) -> Option<AiAnalysis> {
        let url = self.analysis_url.as_deref()?;

        let body = serde_json::json!({
            "scriptId": script.id,
            "runId": run_id,
            "failedStep": failed_index,
            "error": error,
        });

        match self.client.post(url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<AiAnalysis>().await {
                Ok(analysis) => Some(analysis),
                Err(e) => {
                    tracing::warn!("Analyzer returned unparseable payload: {}", e);
                    None
                }
            },
            Ok(resp) => {
                tracing::warn!("Analyzer returned HTTP {}", resp.status());
                None
            }
            Err(e) => {
                tracing::warn!("Analyzer unreachable: {}", e);
                None
            }
        }
    }
}
