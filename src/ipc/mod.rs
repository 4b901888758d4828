//! Local HTTP control surface for the window host.
//!
//! `GET  /api/backend/status` - supervisor snapshot
//! `POST /api/backend/start`  - start (idempotent)
//! `POST /api/backend/stop`   - fire-and-forget stop

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::supervisor::{BackendSupervisor, SupervisorError};

#[derive(Debug, Clone, Serialize)]
pub struct StopResponse {
    pub success: bool,
    pub was_running: bool,
}

/// IPC server state
#[derive(Clone)]
pub struct IpcServer {
    pub supervisor: Arc<BackendSupervisor>,
    pub listen_addr: String,
}

impl IpcServer {
    pub fn new(supervisor: Arc<BackendSupervisor>, listen_addr: &str) -> Self {
        Self {
            supervisor,
            listen_addr: listen_addr.to_string(),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/backend/status", get(status_handler))
            .route("/api/backend/start", post(start_handler))
            .route("/api/backend/stop", post(stop_handler))
            .with_state(self.clone())
    }

    pub async fn start(self) -> Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(&self.listen_addr).await?;
        tracing::info!("IPC listening on http://{}", self.listen_addr);

        axum::serve(listener, router).await?;
        Ok(())
    }
}

/// GET /api/backend/status
async fn status_handler(State(state): State<IpcServer>) -> impl IntoResponse {
    Json(state.supervisor.status().await)
}

/// POST /api/backend/start
async fn start_handler(State(state): State<IpcServer>) -> Result<impl IntoResponse, SupervisorError> {
    let outcome = state.supervisor.try_start().await.map_err(|e| {
        tracing::warn!("IPC start failed: {}", e);
        e
    })?;
    Ok((StatusCode::OK, Json(outcome)))
}

/// POST /api/backend/stop
async fn stop_handler(State(state): State<IpcServer>) -> impl IntoResponse {
    let was_running = state.supervisor.stop().await;
    Json(StopResponse {
        success: true,
        was_running,
    })
}
