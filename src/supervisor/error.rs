//! 백엔드 Supervisor 전용 에러 타입
//!
//! 라이프사이클 호출은 로그만 남기고 삼키며, IPC 계층은 HTTP 상태 코드로 변환한다.

use axum::http::StatusCode;

/// Errors that can occur while driving the backend process.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error("No backend entry point found (tried: {})", .candidates.join(", "))]
    EntryNotFound { candidates: Vec<String> },

    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to terminate backend (pid {pid}): {reason}")]
    TerminationFailed { pid: u32, reason: String },

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl SupervisorError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EntryNotFound { .. } => StatusCode::NOT_FOUND,
            Self::SpawnFailed { .. } | Self::TerminationFailed { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EntryNotFound { .. } => "ENTRY_NOT_FOUND",
            Self::SpawnFailed { .. } => "SPAWN_FAILED",
            Self::TerminationFailed { .. } => "TERMINATION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "error_code": self.error_code(),
        })
    }
}

impl axum::response::IntoResponse for SupervisorError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = axum::Json(self.to_json());
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_not_found_lists_candidates() {
        let err = SupervisorError::EntryNotFound {
            candidates: vec!["/nonexistent/a.js".into(), "backend/server.js".into()],
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "ENTRY_NOT_FOUND");
        assert!(err.to_string().contains("/nonexistent/a.js, backend/server.js"));
    }

    #[test]
    fn termination_and_internal_map_to_500() {
        let err = SupervisorError::TerminationFailed {
            pid: 4242,
            reason: "process did not exit after kill".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "TERMINATION_FAILED");
        assert!(err.to_string().contains("pid 4242"));

        let err = SupervisorError::from(anyhow::anyhow!("Spawned backend has no PID"));
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn spawn_failure_maps_to_500() {
        let err = SupervisorError::SpawnFailed {
            program: "node".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = err.to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error_code"], "SPAWN_FAILED");
        assert!(json["error"].as_str().unwrap().contains("node"));
    }
}
