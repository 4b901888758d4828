//! IPC router tests via `tower::ServiceExt::oneshot`.

use aurora_shell::config::BackendConfig;
use aurora_shell::ipc::IpcServer;
use aurora_shell::resolver::EntryResolver;
use aurora_shell::supervisor::BackendSupervisor;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn server(supervisor: BackendSupervisor) -> axum::Router {
    IpcServer::new(Arc::new(supervisor), "127.0.0.1:0").router()
}

async fn call(app: &axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), 1024 * 64).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn missing_entry_supervisor() -> BackendSupervisor {
    BackendSupervisor::new(
        BackendConfig::default(),
        EntryResolver::new([PathBuf::from("/nonexistent/a.js")]),
    )
}

#[tokio::test]
async fn status_reports_stopped_initially() {
    let app = server(missing_entry_supervisor());

    let (status, json) = call(&app, "GET", "/api/backend/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["state"], "stopped");
    assert_eq!(json["port"], 8000);
    assert_eq!(json["generation"], 0);
    assert!(json["pid"].is_null());
    assert!(json["last_exit"].is_null());
}

#[tokio::test]
async fn start_without_entry_is_404() {
    let app = server(missing_entry_supervisor());

    let (status, json) = call(&app, "POST", "/api/backend/start").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
    assert_eq!(json["error_code"], "ENTRY_NOT_FOUND");
    assert!(json["error"].as_str().unwrap().contains("/nonexistent/a.js"));
}

#[tokio::test]
async fn stop_when_stopped_reports_not_running() {
    let app = server(missing_entry_supervisor());

    let (status, json) = call(&app, "POST", "/api/backend/stop").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["was_running"], false);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let app = server(missing_entry_supervisor());
    let req = Request::builder()
        .uri("/api/backend/restart")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[cfg(unix)]
#[tokio::test]
async fn start_status_stop_roundtrip() {
    let tmp = tempfile::TempDir::new().unwrap();
    let entry = tmp.path().join("server.sh");
    std::fs::write(&entry, "exec sleep 30\n").unwrap();

    let config = BackendConfig {
        program: "sh".to_string(),
        ..BackendConfig::default()
    };
    let app = server(BackendSupervisor::new(config, EntryResolver::fixed(entry.clone())));

    let (status, json) = call(&app, "POST", "/api/backend/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "started");
    assert_eq!(json["generation"], 1);

    let (_, json) = call(&app, "POST", "/api/backend/start").await;
    assert_eq!(json["outcome"], "already_running");

    let (_, json) = call(&app, "GET", "/api/backend/status").await;
    assert_eq!(json["state"], "running");
    assert!(json["pid"].as_u64().is_some());
    assert_eq!(json["entry"], entry.to_str().unwrap());

    let (_, json) = call(&app, "POST", "/api/backend/stop").await;
    assert_eq!(json["was_running"], true);

    let (_, json) = call(&app, "GET", "/api/backend/status").await;
    assert_eq!(json["state"], "stopped");
}
