//! Control client for the browser driver: session start/stop travel over
//! plain request/response, separate from the streaming capture channel.

use crate::error::{Result, TestflowError};
use std::time::Duration;

#[derive(Clone)]
pub struct DriverControl {
    base_url: String,
    client: reqwest::Client,
}

impl DriverControl {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { base_url, client }
    }

    /// Ask the driver to navigate to `url` and begin emitting capture events.
    pub async fn start_capture(&self, url: &str) -> Result<()> {
        self.post("record/start", serde_json::json!({ "url": url }))
            .await
    }

    /// Ask the driver to halt capture.
    pub async fn stop_capture(&self) -> Result<()> {
        self.post("record/stop", serde_json::json!({})).await
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TestflowError::Driver(e.to_string()))?;

        if !response.status().is_success() {
            return Err(TestflowError::Driver(format!(
                "{} -> HTTP {}",
                path,
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}
