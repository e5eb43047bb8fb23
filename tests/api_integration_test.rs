//! Integration tests for the local HTTP API.
//! Covers the recorder lifecycle, the script library, export, playback
//! endpoints, and API key auth.

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tempfile::TempDir;
use testflow_lib::api::{app, ApiState};
use testflow_lib::config::AppConfig;
use testflow_lib::recording::{Action, Step};
use testflow_lib::script::ScriptStore;
use testflow_lib::state::AppState;
use tower::ServiceExt;

/// Test fixture: state backed by a throwaway scripts directory.
struct TestEnv {
    state: ApiState,
    _scripts_dir: TempDir,
}

fn make_env(driver_url: Option<String>) -> TestEnv {
    let scripts_dir = TempDir::new().unwrap();
    let mut config = AppConfig::default();
    if let Some(url) = driver_url {
        config.driver_url = url;
    }
    let store = ScriptStore::open(scripts_dir.path()).unwrap();
    TestEnv {
        state: Arc::new(AppState::new(config, Arc::new(store))),
        _scripts_dir: scripts_dir,
    }
}

/// In-process stand-in for the browser driver's control and playback API.
/// Accepts everything; playback semantics are exercised in runner_test.rs.
async fn spawn_mock_driver() -> String {
    async fn ok() -> Json<serde_json::Value> {
        Json(serde_json::json!({ "ok": true }))
    }
    let router = Router::new()
        .route("/record/start", post(ok))
        .route("/record/stop", post(ok))
        .route("/navigate", post(ok))
        .route("/click", post(ok))
        .route("/type", post(ok))
        .route("/scroll", post(ok));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn get(uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

fn post_json(uri: &str, val: serde_json::Value) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(serde_json::to_vec(&val).unwrap()))
        .unwrap()
}

fn delete(uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap()
}

async fn body_json(res: axum::http::Response<axum::body::Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(res: axum::http::Response<axum::body::Body>) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

// ---------------------------------------------------------------------------
// Health & auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_api_health() {
    let env = make_env(None);
    let res = app(env.state.clone(), None)
        .oneshot(get("/api/health"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "ok");
}

#[tokio::test]
async fn test_api_key_required() {
    let env = make_env(None);
    let api = app(env.state.clone(), Some("secret".to_string()));

    // No key: rejected.
    let res = api
        .clone()
        .oneshot(get("/api/scripts?projectId=p1"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Wrong key: rejected.
    let req = axum::http::Request::builder()
        .uri("/api/scripts?projectId=p1")
        .header("X-API-Key", "wrong")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = api.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    // Correct key: passes.
    let req = axum::http::Request::builder()
        .uri("/api/scripts?projectId=p1")
        .header("X-API-Key", "secret")
        .body(axum::body::Body::empty())
        .unwrap();
    let res = api.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Health stays open for monitors.
    let res = api.oneshot(get("/api/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Recorder lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_recorder_lifecycle() {
    let driver = spawn_mock_driver().await;
    let env = make_env(Some(driver));
    let api = app(env.state.clone(), None);

    // Start.
    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/start",
            serde_json::json!({ "url": "https://example.com", "browserId": "b1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let info = body_json(res).await;
    assert_eq!(info["status"], "recording");
    assert_eq!(info["stepCount"], 0);

    // Starting again on the same browser conflicts.
    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/start",
            serde_json::json!({ "url": "https://example.com", "browserId": "b1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Status reflects the live session.
    let res = api
        .clone()
        .oneshot(get("/api/recorder/status?browserId=b1"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "recording");

    // Stop.
    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/stop",
            serde_json::json!({ "browserId": "b1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["status"], "stopped");

    // Stopping twice conflicts.
    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/stop",
            serde_json::json!({ "browserId": "b1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    // Discard clears the session.
    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/discard",
            serde_json::json!({ "browserId": "b1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = api
        .oneshot(get("/api/recorder/status?browserId=b1"))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "idle");
}

#[tokio::test]
async fn test_recorder_start_requires_url() {
    let env = make_env(None);
    let res = app(env.state.clone(), None)
        .oneshot(post_json(
            "/api/recorder/start",
            serde_json::json!({ "url": "" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recorder_start_rolls_back_on_driver_failure() {
    // Nothing listens here, so the control request fails.
    let env = make_env(Some("http://127.0.0.1:1".to_string()));
    let api = app(env.state.clone(), None);

    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/start",
            serde_json::json!({ "url": "https://example.com", "browserId": "b1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    // The session was rolled back, so the browser is idle again.
    let res = api
        .oneshot(get("/api/recorder/status?browserId=b1"))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "idle");
}

#[tokio::test]
async fn test_save_empty_buffer_conflicts_and_keeps_session() {
    let driver = spawn_mock_driver().await;
    let env = make_env(Some(driver));
    let api = app(env.state.clone(), None);

    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/start",
            serde_json::json!({ "url": "https://example.com", "browserId": "b1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // No steps captured yet; save must refuse without writing anything.
    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/save",
            serde_json::json!({
                "name": "Empty",
                "module": "smoke",
                "projectId": "p1",
                "browserId": "b1",
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = api
        .clone()
        .oneshot(get("/api/scripts?projectId=p1"))
        .await
        .unwrap();
    let scripts = body_json(res).await;
    assert_eq!(scripts.as_array().unwrap().len(), 0);

    // The session survives the refused save.
    let res = api
        .oneshot(get("/api/recorder/status?browserId=b1"))
        .await
        .unwrap();
    assert_eq!(body_json(res).await["status"], "recording");
}

// ---------------------------------------------------------------------------
// Script library
// ---------------------------------------------------------------------------

fn sample_steps() -> serde_json::Value {
    serde_json::json!([
        { "action": "navigate", "url": "https://example.com/login", "timestamp": 1000 },
        { "action": "type", "selector": "#user", "value": "alice", "timestamp": 1200 },
        { "action": "click", "selector": "#submit", "timestamp": 1400 },
    ])
}

#[tokio::test]
async fn test_save_and_script_crud() {
    let env = make_env(None);
    let api = app(env.state.clone(), None);

    // Save with a client-submitted buffer; no live session required.
    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/save",
            serde_json::json!({
                "name": "Login Flow",
                "module": "auth",
                "projectId": "p1",
                "steps": sample_steps(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let script = body_json(res).await;
    let id = script["id"].as_str().unwrap().to_string();
    assert_eq!(script["projectId"], "p1");
    assert_eq!(script["name"], "Login Flow");
    assert_eq!(script["steps"].as_array().unwrap().len(), 3);

    // Listed under its project, invisible to others.
    let res = api
        .clone()
        .oneshot(get("/api/scripts?projectId=p1"))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);
    let res = api
        .clone()
        .oneshot(get("/api/scripts?projectId=other"))
        .await
        .unwrap();
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 0);

    // Fetch by id.
    let res = api
        .clone()
        .oneshot(get(&format!("/api/scripts/{}", id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = api
        .clone()
        .oneshot(get("/api/scripts/nonexistent"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // Delete under the wrong project is indistinguishable from a missing id.
    let res = api
        .clone()
        .oneshot(delete(&format!("/api/scripts/{}?projectId=other", id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = api
        .clone()
        .oneshot(delete(&format!("/api/scripts/{}?projectId=p1", id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = api
        .oneshot(get(&format!("/api/scripts/{}", id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_script() {
    let env = make_env(None);
    let api = app(env.state.clone(), None);

    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/save",
            serde_json::json!({
                "name": "Login Flow",
                "module": "auth",
                "projectId": "p1",
                "steps": sample_steps(),
            }),
        ))
        .await
        .unwrap();
    let saved = body_json(res).await;
    let id = saved["id"].as_str().unwrap().to_string();
    let created_at = saved["createdAt"].as_u64().unwrap();

    let put = |uri: &str, val: serde_json::Value| {
        axum::http::Request::builder()
            .method("PUT")
            .uri(uri)
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&val).unwrap()))
            .unwrap()
    };
    let edit = serde_json::json!({
        "projectId": "p1",
        "name": "Login Flow v2",
        "module": "auth",
        "steps": [
            { "action": "navigate", "url": "https://example.com/login", "timestamp": 1000 },
            { "action": "click", "selector": "#sso", "timestamp": 1100 },
        ],
    });

    // Wrong project cannot edit it.
    let mut wrong = edit.clone();
    wrong["projectId"] = serde_json::json!("other");
    let res = api
        .clone()
        .oneshot(put(&format!("/api/scripts/{}", id), wrong))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = api
        .clone()
        .oneshot(put(&format!("/api/scripts/{}", id), edit.clone()))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated = body_json(res).await;
    assert_eq!(updated["name"], "Login Flow v2");
    assert_eq!(updated["createdAt"].as_u64().unwrap(), created_at);

    // The overwrite persisted.
    let res = api
        .clone()
        .oneshot(get(&format!("/api/scripts/{}", id)))
        .await
        .unwrap();
    let fetched = body_json(res).await;
    assert_eq!(fetched["steps"].as_array().unwrap().len(), 2);
    assert_eq!(fetched["steps"][1]["selector"], "#sso");

    let res = api
        .oneshot(put("/api/scripts/nonexistent", edit))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_save_clamps_inline_timestamps() {
    let env = make_env(None);
    let api = app(env.state.clone(), None);

    // A client buffer with clock skew: order wins over timestamps.
    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/save",
            serde_json::json!({
                "name": "Skewed",
                "module": "misc",
                "projectId": "p1",
                "steps": [
                    { "action": "navigate", "url": "https://example.com", "timestamp": 1000 },
                    { "action": "click", "selector": "#a", "timestamp": 400 },
                    { "action": "click", "selector": "#b", "timestamp": 1200 },
                ],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let script = body_json(res).await;
    let stamps: Vec<u64> = script["steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["timestamp"].as_u64().unwrap())
        .collect();
    assert_eq!(stamps, vec![1000, 1000, 1200]);
}

#[tokio::test]
async fn test_save_rejects_invalid_inline_step() {
    let env = make_env(None);
    let res = app(env.state.clone(), None)
        .oneshot(post_json(
            "/api/recorder/save",
            serde_json::json!({
                "name": "Broken",
                "module": "auth",
                "projectId": "p1",
                "steps": [
                    { "action": "click", "timestamp": 1000 },
                ],
            }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_export_endpoint() {
    let env = make_env(None);
    let api = app(env.state.clone(), None);

    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/save",
            serde_json::json!({
                "name": "Login Flow",
                "module": "auth",
                "projectId": "p1",
                "steps": sample_steps(),
            }),
        ))
        .await
        .unwrap();
    let id = body_json(res).await["id"].as_str().unwrap().to_string();

    // Selenium IDE project.
    let res = api
        .clone()
        .oneshot(get(&format!("/api/recorder/export/{}/side", id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "application/json"
    );
    let disposition = res
        .headers()
        .get("content-disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains(&format!("{}.side", id)));
    let project: serde_json::Value = serde_json::from_str(&body_text(res).await).unwrap();
    assert_eq!(project["version"], "2.0");
    assert_eq!(project["tests"][0]["commands"].as_array().unwrap().len(), 3);

    // Java source.
    let res = api
        .clone()
        .oneshot(get(&format!("/api/recorder/export/{}/java", id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let source = body_text(res).await;
    assert!(source.contains("public class LoginFlowTest"));
    assert!(source.contains("driver.get(\"https://example.com/login\")"));

    // Unknown format and unknown script.
    let res = api
        .clone()
        .oneshot(get(&format!("/api/recorder/export/{}/ruby", id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = api
        .oneshot(get("/api/recorder/export/nonexistent/side"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_export_unsupported_action() {
    let env = make_env(None);
    let api = app(env.state.clone(), None);

    // A hand-imported script may carry actions no exporter understands.
    let script = env
        .state
        .scripts
        .create(
            "p1",
            "Hover Flow",
            "misc",
            vec![
                Step::navigate("https://example.com", 1000),
                Step {
                    action: Action::Other("hover".to_string()),
                    selector: Some("#menu".to_string()),
                    url: None,
                    value: None,
                    timestamp: 1100,
                },
            ],
        )
        .unwrap();

    let res = api
        .oneshot(get(&format!("/api/recorder/export/{}/python", script.id)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let message = body_text(res).await;
    assert!(message.contains("hover"));
    assert!(message.contains('1'));
}

// ---------------------------------------------------------------------------
// Playback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_execute_and_poll_run() {
    let driver = spawn_mock_driver().await;
    let env = make_env(Some(driver));
    let api = app(env.state.clone(), None);

    let res = api
        .clone()
        .oneshot(post_json(
            "/api/recorder/save",
            serde_json::json!({
                "name": "Login Flow",
                "module": "auth",
                "projectId": "p1",
                "steps": sample_steps(),
            }),
        ))
        .await
        .unwrap();
    let id = body_json(res).await["id"].as_str().unwrap().to_string();

    // Wrong project cannot execute it.
    let res = api
        .clone()
        .oneshot(post_json(
            "/api/runner/execute",
            serde_json::json!({ "scriptId": id, "projectId": "other" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = api
        .clone()
        .oneshot(post_json(
            "/api/runner/execute",
            serde_json::json!({ "scriptId": id, "projectId": "p1" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let run_id = body_json(res).await["runId"].as_str().unwrap().to_string();

    // Poll until the spawned run settles.
    let mut last = serde_json::Value::Null;
    for _ in 0..100 {
        let res = api
            .clone()
            .oneshot(get(&format!("/api/runner/runs/{}", run_id)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        last = body_json(res).await;
        let status = last["status"].as_str().unwrap();
        if status != "pending" && status != "running" {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(last["status"], "passed");
    assert_eq!(last["stepResults"].as_array().unwrap().len(), 3);

    let res = api
        .oneshot(get("/api/runner/runs/nonexistent"))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_unknown_run() {
    let env = make_env(None);
    let res = app(env.state.clone(), None)
        .oneshot(post_json(
            "/api/runner/runs/nonexistent/cancel",
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
