//! Local HTTP API for the recorder, script library and playback runner.

pub mod ws;

use crate::capture::CaptureChannel;
use crate::error::TestflowError;
use crate::export::{export, ExportFormat};
use crate::recording::{SessionInfo, SessionStatus, Step};
use crate::runner::{PlaybackResult, RunStatus};
use crate::script::Script;
use crate::state::AppState;
use axum::{
    extract::{Path as AxumPath, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub type ApiState = Arc<AppState>;

/// API key authentication middleware.
/// Skips authentication for GET /api/health so monitors can probe the server.
async fn api_key_auth(
    axum::extract::State(expected_key): axum::extract::State<String>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if request.uri().path() == "/api/health" {
        return Ok(next.run(request).await);
    }
    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());
    match provided {
        Some(k) if k == expected_key => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Map crate errors onto HTTP status codes.
fn error_response(e: TestflowError) -> (StatusCode, String) {
    let status = match &e {
        TestflowError::NotFound(_) => StatusCode::NOT_FOUND,
        TestflowError::InvalidState(_) | TestflowError::EmptyRecording => StatusCode::CONFLICT,
        TestflowError::UnsupportedAction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        TestflowError::InvalidStep(_) | TestflowError::Config(_) => StatusCode::BAD_REQUEST,
        TestflowError::Driver(_) | TestflowError::ChannelDisconnected(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

fn default_browser_id() -> String {
    "default".to_string()
}

/// Validate a client-submitted step buffer and clamp timestamps to be
/// non-decreasing, mirroring the capture path: submission order is
/// authoritative, clock skew is not.
fn normalize_steps(steps: Vec<Step>) -> Result<Vec<Step>, (StatusCode, String)> {
    if steps.is_empty() {
        return Err(error_response(TestflowError::EmptyRecording));
    }
    let mut out = Vec::with_capacity(steps.len());
    let mut last_ts = 0u64;
    for (i, step) in steps.into_iter().enumerate() {
        let mut step = step
            .validated()
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("step {}: {}", i, e)))?;
        if step.timestamp < last_ts {
            step.timestamp = last_ts;
        }
        last_ts = step.timestamp;
        out.push(step);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Recording lifecycle
        .route("/api/recorder/start", post(start_recording))
        .route("/api/recorder/stop", post(stop_recording))
        .route("/api/recorder/discard", post(discard_recording))
        .route("/api/recorder/save", post(save_recording))
        .route("/api/recorder/status", get(recorder_status))
        // Export
        .route("/api/recorder/export/:id/:format", get(export_script))
        // Script library
        .route("/api/scripts", get(list_scripts))
        .route(
            "/api/scripts/:id",
            get(get_script).put(update_script).delete(delete_script),
        )
        // Playback
        .route("/api/runner/execute", post(execute_script))
        .route("/api/runner/runs/:run_id", get(get_run))
        .route("/api/runner/runs/:run_id/cancel", post(cancel_run))
        // WebSocket (real-time events)
        .route("/api/ws", get(ws::ws_handler))
        // Utility
        .route("/api/health", get(health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

async fn health() -> &'static str {
    "ok"
}

// ---------------------------------------------------------------------------
// Recording lifecycle
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRecordingRequest {
    url: String,
    #[serde(default = "default_browser_id")]
    browser_id: String,
}

async fn start_recording(
    State(state): State<ApiState>,
    Json(req): Json<StartRecordingRequest>,
) -> Result<Json<SessionInfo>, (StatusCode, String)> {
    if req.url.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "url must not be empty".to_string()));
    }

    let info = state
        .sessions
        .start(&req.browser_id, &req.url)
        .map_err(error_response)?;

    // Tell the driver to navigate and begin emitting capture events. If it
    // refuses, roll the session back so the browser stays idle.
    if let Err(e) = state.driver.start_capture(&req.url).await {
        state.sessions.discard(&req.browser_id);
        return Err(error_response(e));
    }

    // Dial the capture channel for this session.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let channel = CaptureChannel::new(
        state.config.read().driver_ws_url.clone(),
        req.browser_id.clone(),
        state.sessions.clone(),
        state.ws_broadcaster.clone(),
    );
    channel.spawn(shutdown_rx);
    state
        .capture_shutdowns
        .lock()
        .insert(req.browser_id.clone(), shutdown_tx);

    state.broadcast_ws(ws::WsEvent::RecordingStatus {
        browser_id: req.browser_id,
        status: SessionStatus::Recording,
        step_count: 0,
    });

    Ok(Json(info))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BrowserIdRequest {
    #[serde(default = "default_browser_id")]
    browser_id: String,
}

async fn stop_recording(
    State(state): State<ApiState>,
    Json(req): Json<BrowserIdRequest>,
) -> Result<Json<SessionInfo>, (StatusCode, String)> {
    let info = state.sessions.stop(&req.browser_id).map_err(error_response)?;

    // Best effort: a driver that cannot halt capture is not a reason to lose
    // the buffered steps.
    if let Err(e) = state.driver.stop_capture().await {
        tracing::warn!("Driver stop_capture failed: {}", e);
    }
    state.shutdown_capture(&req.browser_id);

    state.broadcast_ws(ws::WsEvent::RecordingStatus {
        browser_id: req.browser_id,
        status: SessionStatus::Stopped,
        step_count: info.step_count,
    });

    Ok(Json(info))
}

async fn discard_recording(
    State(state): State<ApiState>,
    Json(req): Json<BrowserIdRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let was_recording = state.sessions.is_recording(&req.browser_id);
    state.sessions.discard(&req.browser_id);

    if was_recording {
        if let Err(e) = state.driver.stop_capture().await {
            tracing::warn!("Driver stop_capture failed: {}", e);
        }
    }
    state.shutdown_capture(&req.browser_id);

    state.broadcast_ws(ws::WsEvent::RecordingStatus {
        browser_id: req.browser_id,
        status: SessionStatus::Idle,
        step_count: 0,
    });

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveRecordingRequest {
    name: String,
    module: String,
    project_id: String,
    /// Recorded by the surrounding app; not used by this core.
    #[serde(default)]
    #[allow(dead_code)]
    user_id: Option<String>,
    /// Optional client-side buffer override: the original UI submits the
    /// steps it displayed. When present it replaces the server-side buffer.
    #[serde(default)]
    steps: Option<Vec<Step>>,
    #[serde(default = "default_browser_id")]
    browser_id: String,
}

async fn save_recording(
    State(state): State<ApiState>,
    Json(req): Json<SaveRecordingRequest>,
) -> Result<(StatusCode, Json<Script>), (StatusCode, String)> {
    if req.name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "name must not be empty".to_string(),
        ));
    }

    let steps = match req.steps {
        Some(steps) => normalize_steps(steps)?,
        None => state
            .sessions
            .snapshot_for_save(&req.browser_id)
            .map_err(error_response)?,
    };

    let script = state
        .scripts
        .create(&req.project_id, &req.name, &req.module, steps)
        .map_err(error_response)?;

    // The session is consumed by a successful save.
    state.sessions.discard(&req.browser_id);
    state.shutdown_capture(&req.browser_id);

    state.broadcast_ws(ws::WsEvent::RecordingStatus {
        browser_id: req.browser_id,
        status: SessionStatus::Idle,
        step_count: 0,
    });

    Ok((StatusCode::CREATED, Json(script)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecorderStatusQuery {
    #[serde(default = "default_browser_id")]
    browser_id: String,
}

async fn recorder_status(
    State(state): State<ApiState>,
    Query(query): Query<RecorderStatusQuery>,
) -> Json<serde_json::Value> {
    match state.sessions.info(&query.browser_id) {
        Some(info) => Json(serde_json::to_value(info).unwrap_or_default()),
        None => Json(serde_json::json!({
            "browserId": query.browser_id,
            "status": "idle",
            "stepCount": 0,
        })),
    }
}

// ---------------------------------------------------------------------------
// Script library
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectQuery {
    project_id: String,
}

async fn list_scripts(
    State(state): State<ApiState>,
    Query(query): Query<ProjectQuery>,
) -> Json<Vec<Script>> {
    Json(state.scripts.list(&query.project_id))
}

async fn get_script(
    State(state): State<ApiState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Script>, (StatusCode, String)> {
    state.scripts.get(&id).map(Json).map_err(error_response)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateScriptRequest {
    project_id: String,
    name: String,
    module: String,
    steps: Vec<Step>,
}

/// Explicit edit/re-save: full overwrite of name, module and steps. The id,
/// owning project and creation time are immutable.
async fn update_script(
    State(state): State<ApiState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UpdateScriptRequest>,
) -> Result<Json<Script>, (StatusCode, String)> {
    let existing = state.scripts.get(&id).map_err(error_response)?;
    if existing.project_id != req.project_id {
        return Err(error_response(TestflowError::NotFound(format!(
            "script {}",
            id
        ))));
    }
    if req.name.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "name must not be empty".to_string(),
        ));
    }

    let steps = normalize_steps(req.steps)?;
    let script = state
        .scripts
        .update(Script {
            id: existing.id,
            project_id: existing.project_id,
            name: req.name,
            module: req.module,
            steps,
            created_at: existing.created_at,
        })
        .map_err(error_response)?;

    Ok(Json(script))
}

async fn delete_script(
    State(state): State<ApiState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<ProjectQuery>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .scripts
        .delete(&id, &query.project_id)
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

async fn export_script(
    State(state): State<ApiState>,
    AxumPath((id, format)): AxumPath<(String, String)>,
) -> Result<([(header::HeaderName, String); 2], String), (StatusCode, String)> {
    let format: ExportFormat = format.parse().map_err(error_response)?;
    let script = state.scripts.get(&id).map_err(error_response)?;
    let artifact = export(&script, format).map_err(error_response)?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                artifact.format.content_type().to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        artifact.content,
    ))
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteRequest {
    script_id: String,
    project_id: String,
}

async fn execute_script(
    State(state): State<ApiState>,
    Json(req): Json<ExecuteRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), (StatusCode, String)> {
    let script = state.scripts.get(&req.script_id).map_err(error_response)?;
    if script.project_id != req.project_id {
        return Err(error_response(TestflowError::NotFound(format!(
            "script {}",
            req.script_id
        ))));
    }

    let run_id = state.runner.start(script, state.runs.clone());
    state.broadcast_ws(ws::WsEvent::RunStatus {
        run_id: run_id.clone(),
        status: RunStatus::Pending,
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "runId": run_id })),
    ))
}

async fn get_run(
    State(state): State<ApiState>,
    AxumPath(run_id): AxumPath<String>,
) -> Result<Json<PlaybackResult>, (StatusCode, String)> {
    state.runs.get(&run_id).map(Json).map_err(error_response)
}

async fn cancel_run(
    State(state): State<ApiState>,
    AxumPath(run_id): AxumPath<String>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    // The run settles asynchronously; its terminal status is broadcast by
    // whoever polls it, not guessed here.
    state.runs.cancel(&run_id).map_err(error_response)?;
    Ok(Json(serde_json::json!({ "cancelled": run_id })))
}

// ---------------------------------------------------------------------------
// App assembly
// ---------------------------------------------------------------------------

/// Used by run_server and by integration tests to exercise API key middleware.
pub fn app(state: ApiState, api_key: Option<String>) -> Router {
    use tower::limit::ConcurrencyLimitLayer;
    let base_router = router(state);
    if let Some(key) = api_key {
        base_router.route_layer(middleware::from_fn_with_state(key, api_key_auth))
    } else {
        base_router
    }
    .layer(ConcurrencyLimitLayer::new(32))
    .layer(
        tower_http::cors::CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PUT,
                axum::http::Method::DELETE,
            ])
            .allow_headers([
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderName::from_static("x-api-key"),
            ]),
    )
}

pub async fn run_server(state: ApiState, port: u16, api_key: Option<String>) -> Result<(), String> {
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .map_err(|e| format!("Failed to bind API port {}: {}", port, e))?;
    let app = app(state, api_key);
    tracing::info!("Testflow API listening on http://127.0.0.1:{}", port);
    axum::serve(listener, app)
        .await
        .map_err(|e| e.to_string())?;
    Ok(())
}
