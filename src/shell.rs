//! Application lifecycle wiring for the desktop shell.
//!
//! The shell owns a single `BackendSupervisor` and translates window and
//! quit events into supervisor calls.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ShellConfig;
use crate::readiness::{Readiness, ReadinessProbe};
use crate::supervisor::{BackendSupervisor, StartOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Main window constructed and ready to show
    WindowReady,
    /// 모든 창이 닫힘 (종료 대기 없이 stop)
    AllWindowsClosed,
    /// 앱 종료 직전 (유예 시간 + 강제 종료)
    BeforeQuit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellAction {
    /// Load this URL into the main window
    LoadUrl(String),
    Nothing,
}

pub struct DesktopShell {
    supervisor: Arc<BackendSupervisor>,
    readiness: Option<ReadinessProbe>,
    shutdown_grace: Duration,
}

impl DesktopShell {
    pub fn new(config: &ShellConfig) -> Self {
        let supervisor = Arc::new(BackendSupervisor::from_config(&config.backend));
        let readiness = config
            .readiness
            .enabled
            .then(|| ReadinessProbe::new(config.backend.port, &config.readiness));
        Self::with_supervisor(supervisor, readiness, config.backend.shutdown_grace())
    }

    pub fn with_supervisor(
        supervisor: Arc<BackendSupervisor>,
        readiness: Option<ReadinessProbe>,
        shutdown_grace: Duration,
    ) -> Self {
        Self {
            supervisor,
            readiness,
            shutdown_grace,
        }
    }

    pub fn supervisor(&self) -> Arc<BackendSupervisor> {
        self.supervisor.clone()
    }

    pub fn window_url(&self) -> String {
        format!("http://localhost:{}", self.supervisor.port())
    }

    pub async fn handle(&self, event: LifecycleEvent) -> ShellAction {
        tracing::debug!("Lifecycle event: {:?}", event);
        match event {
            LifecycleEvent::WindowReady => {
                let outcome = self.supervisor.start().await;
                if let (StartOutcome::Started { .. }, Some(probe)) = (&outcome, &self.readiness) {
                    let result = probe.wait_while_running(self.supervisor.subscribe()).await;
                    if !matches!(result, Readiness::Ready { .. }) {
                        tracing::warn!("Loading window without a ready backend ({:?})", result);
                    }
                }
                // the window loads even if nothing started: a backend may
                // already be listening on the port
                ShellAction::LoadUrl(self.window_url())
            }
            LifecycleEvent::AllWindowsClosed => {
                self.supervisor.stop().await;
                ShellAction::Nothing
            }
            LifecycleEvent::BeforeQuit => {
                match self.supervisor.shutdown(self.shutdown_grace).await {
                    Ok(Some(report)) => tracing::info!("Backend shut down ({})", report),
                    Ok(None) => {}
                    Err(e) => tracing::error!("Backend shutdown failed: {}", e),
                }
                ShellAction::Nothing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    fn shell_without_entry() -> DesktopShell {
        let config = ShellConfig {
            backend: BackendConfig {
                port: 8123,
                candidates: vec!["/nonexistent/a.js".to_string()],
                ..BackendConfig::default()
            },
            ..ShellConfig::default()
        };
        DesktopShell::new(&config)
    }

    #[tokio::test]
    async fn window_loads_even_without_backend() {
        let shell = shell_without_entry();
        let action = shell.handle(LifecycleEvent::WindowReady).await;
        assert_eq!(action, ShellAction::LoadUrl("http://localhost:8123".to_string()));
        assert!(!shell.supervisor().is_running());
    }

    #[tokio::test]
    async fn close_and_quit_are_safe_when_stopped() {
        let shell = shell_without_entry();
        assert_eq!(shell.handle(LifecycleEvent::AllWindowsClosed).await, ShellAction::Nothing);
        assert_eq!(shell.handle(LifecycleEvent::BeforeQuit).await, ShellAction::Nothing);
        assert!(!shell.supervisor().is_running());
    }
}
