use anyhow::Context;
use std::sync::Arc;
use testflow_lib::api;
use testflow_lib::api::ws::WsEvent;
use testflow_lib::config;
use testflow_lib::script::ScriptStore;
use testflow_lib::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration (never overwrite existing file on failure)
    let config = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(
                "Failed to load config: {}. Using in-memory defaults (not saving).",
                e
            );
            config::AppConfig::default()
        }
    };

    let scripts = match &config.scripts_dir {
        Some(dir) => ScriptStore::open(dir),
        None => ScriptStore::open_default(),
    };
    let scripts = Arc::new(scripts.context("failed to open script store")?);

    let port = config.api_port;
    let api_key = config.api_key.clone();
    let state = Arc::new(AppState::new(config, scripts));

    // Heartbeat so idle WebSocket clients stay connected.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(30));
            loop {
                interval.tick().await;
                state.broadcast_ws(WsEvent::Heartbeat);
            }
        });
    }

    api::run_server(state, port, api_key)
        .await
        .map_err(anyhow::Error::msg)
}
