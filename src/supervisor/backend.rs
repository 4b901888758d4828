//! Backend supervisor - owns at most one child server process.
//!
//! - `start()` is idempotent and never fails: a missing entry or a spawn
//!   error leaves the supervisor Stopped and is only logged
//! - `stop()` signals the child and returns without waiting
//! - `shutdown()` is the bounded variant: terminate, wait, then kill. It
//!   also covers children a previous `stop()` signalled that are still alive
//! - the child's exit is observed by one task per launch; there is no restart
//! - signals go through that task, which owns the `Child` and never signals
//!   a reaped PID

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{mpsc, watch, Mutex};

use super::error::SupervisorError;
use super::launch::LaunchPlan;
use super::signal;
use super::state::{State, StateMachine};
use crate::config::BackendConfig;
use crate::resolver::EntryResolver;

/// How long to wait for the reap after a forced kill.
const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

// ─── Reports ─────────────────────────────────────────────────

/// How a backend process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitReport {
    pub code: Option<i32>,
    /// Terminating signal (unix only)
    pub signal: Option<i32>,
    pub success: bool,
}

impl ExitReport {
    fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
            success: status.success(),
        }
    }

    fn wait_failed() -> Self {
        Self {
            code: None,
            signal: None,
            success: false,
        }
    }
}

impl fmt::Display for ExitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(sig)) => write!(f, "signal {}", sig),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StartOutcome {
    Started {
        pid: u32,
        generation: u64,
        entry: PathBuf,
    },
    AlreadyRunning {
        pid: u32,
        generation: u64,
    },
    /// Entry missing or spawn failed; details were logged.
    NotStarted,
}

/// Point-in-time view of the supervisor, served over IPC.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub state: State,
    pub pid: Option<u32>,
    pub port: u16,
    pub entry: Option<PathBuf>,
    /// Launch counter; 0 until the first successful spawn
    pub generation: u64,
    pub last_exit: Option<ExitReport>,
}

// ─── Supervisor ──────────────────────────────────────────────

/// Requests handled by the exit observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Terminate,
    Kill,
}

struct ChildHandle {
    pid: u32,
    generation: u64,
    entry: PathBuf,
    control_tx: mpsc::Sender<Control>,
    exit_rx: watch::Receiver<Option<ExitReport>>,
}

impl ChildHandle {
    /// 전송 실패 = observer가 이미 종료됨 (보낼 대상 없음)
    fn request(&self, control: Control) {
        if let Err(e) = self.control_tx.try_send(control) {
            tracing::debug!(
                "Backend (pid {}) already gone, {:?} dropped: {}",
                self.pid,
                control,
                e
            );
        }
    }
}

struct Inner {
    state: StateMachine,
    child: Option<ChildHandle>,
    /// Children released by `stop()` whose exit has not been observed yet
    stopping: Vec<ChildHandle>,
    generation: u64,
    last_exit: Option<ExitReport>,
}

impl Inner {
    /// Drop the current handle and mark Stopped. Returns the handle, if any.
    fn release(&mut self, running_tx: &watch::Sender<bool>) -> Option<ChildHandle> {
        let child = self.child.take()?;
        if let Err(e) = self.state.transition(State::Stopped) {
            tracing::debug!("{}", e);
        }
        let _ = running_tx.send(false);
        Some(child)
    }
}

pub struct BackendSupervisor {
    config: BackendConfig,
    resolver: EntryResolver,
    inner: Arc<Mutex<Inner>>,
    running_tx: Arc<watch::Sender<bool>>,
    running_rx: watch::Receiver<bool>,
}

impl BackendSupervisor {
    pub fn new(config: BackendConfig, resolver: EntryResolver) -> Self {
        let (running_tx, running_rx) = watch::channel(false);
        Self {
            config,
            resolver,
            inner: Arc::new(Mutex::new(Inner {
                state: StateMachine::new(),
                child: None,
                stopping: Vec::new(),
                generation: 0,
                last_exit: None,
            })),
            running_tx: Arc::new(running_tx),
            running_rx,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::new(config.clone(), EntryResolver::from_config(config))
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Start the backend unless it is already running. Failures are logged
    /// and reported as `NotStarted`; the UI may still find a server that was
    /// started externally.
    pub async fn start(&self) -> StartOutcome {
        match self.try_start().await {
            Ok(outcome) => outcome,
            Err(e @ SupervisorError::EntryNotFound { .. }) => {
                tracing::warn!("{}; backend not started", e);
                StartOutcome::NotStarted
            }
            Err(e) => {
                tracing::error!("Backend failed to start: {}", e);
                StartOutcome::NotStarted
            }
        }
    }

    /// Like `start()`, but hands the failure back to the caller.
    pub async fn try_start(&self) -> Result<StartOutcome, SupervisorError> {
        let mut inner = self.inner.lock().await;

        if let Some(child) = &inner.child {
            tracing::debug!("Backend already running (pid {}), start ignored", child.pid);
            return Ok(StartOutcome::AlreadyRunning {
                pid: child.pid,
                generation: child.generation,
            });
        }

        let entry = self
            .resolver
            .resolve()
            .ok_or_else(|| SupervisorError::EntryNotFound {
                candidates: self.resolver.describe(),
            })?;

        let plan = LaunchPlan::new(
            &self.config.program,
            &self.config.args,
            &entry,
            self.config.port,
            &self.config.env,
        );
        let child = plan
            .command()
            .spawn()
            .map_err(|source| SupervisorError::SpawnFailed {
                program: plan.program.clone(),
                source,
            })?;
        let pid = child
            .id()
            .ok_or_else(|| anyhow::anyhow!("Spawned backend has no PID"))?;

        inner.generation += 1;
        let generation = inner.generation;

        let (control_tx, control_rx) = mpsc::channel(4);
        let (exit_tx, exit_rx) = watch::channel(None);
        self.spawn_exit_observer(child, generation, control_rx, exit_tx);

        inner.child = Some(ChildHandle {
            pid,
            generation,
            entry: entry.clone(),
            control_tx,
            exit_rx,
        });
        if let Err(e) = inner.state.transition(State::Running) {
            tracing::debug!("{}", e);
        }
        let _ = self.running_tx.send(true);

        tracing::info!(
            "Backend started: {} {} (pid {}, port {})",
            plan.program,
            entry.display(),
            pid,
            self.config.port
        );
        Ok(StartOutcome::Started {
            pid,
            generation,
            entry,
        })
    }

    /// Signal the child and mark Stopped immediately. Returns whether a
    /// child was owned. The handle is kept until the exit is observed so a
    /// later `shutdown()` can still escalate.
    pub async fn stop(&self) -> bool {
        let mut inner = self.inner.lock().await;
        let Some(child) = inner.release(&self.running_tx) else {
            tracing::debug!("Backend not running, stop ignored");
            return false;
        };

        child.request(Control::Terminate);
        inner.stopping.push(child);
        true
    }

    /// Terminate, wait up to `grace` for the exit, then force kill. Applies
    /// to the running child and to any child still stopping. Returns the
    /// running child's report, else the last stopping child's; `Ok(None)`
    /// when nothing was alive.
    pub async fn shutdown(&self, grace: Duration) -> Result<Option<ExitReport>, SupervisorError> {
        let (current, stopping) = {
            let mut inner = self.inner.lock().await;
            let current = inner.release(&self.running_tx);
            (current, std::mem::take(&mut inner.stopping))
        };

        let mut report = None;
        for handle in stopping.iter().chain(current.iter()) {
            if let Some(r) = reap(handle, grace).await? {
                report = Some(r);
            }
        }
        Ok(report)
    }

    pub fn is_running(&self) -> bool {
        *self.running_rx.borrow()
    }

    /// Running flag updates.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.running_rx.clone()
    }

    /// Wait until the running flag drops.
    pub async fn wait_for_exit(&self) {
        let mut rx = self.running_rx.clone();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    pub async fn pid(&self) -> Option<u32> {
        self.inner.lock().await.child.as_ref().map(|c| c.pid)
    }

    /// Generation of the owned child; a fresh launch never reuses one.
    pub async fn handle_id(&self) -> Option<u64> {
        self.inner.lock().await.child.as_ref().map(|c| c.generation)
    }

    pub async fn status(&self) -> BackendStatus {
        let inner = self.inner.lock().await;
        BackendStatus {
            state: inner.state.state,
            pid: inner.child.as_ref().map(|c| c.pid),
            port: self.config.port,
            entry: inner.child.as_ref().map(|c| c.entry.clone()),
            generation: inner.generation,
            last_exit: inner.last_exit.clone(),
        }
    }

    fn spawn_exit_observer(
        &self,
        mut child: Child,
        generation: u64,
        mut control_rx: mpsc::Receiver<Control>,
        exit_tx: watch::Sender<Option<ExitReport>>,
    ) {
        let inner = self.inner.clone();
        let running_tx = self.running_tx.clone();

        tokio::spawn(async move {
            let waited = loop {
                tokio::select! {
                    status = child.wait() => break status,
                    control = control_rx.recv() => match control {
                        Some(Control::Terminate) => {
                            // 아직 reap 전인지 확인 후에만 PID로 시그널 전송
                            if let (Ok(None), Some(pid)) = (child.try_wait(), child.id()) {
                                if let Err(e) = signal::request_termination(pid) {
                                    tracing::debug!("Ignoring termination error: {}", e);
                                }
                            }
                        }
                        Some(Control::Kill) => {
                            if let Err(e) = child.start_kill() {
                                tracing::debug!("Force kill failed: {}", e);
                            }
                        }
                        // 핸들이 모두 drop됨: 종료만 기다림
                        None => break child.wait().await,
                    },
                }
            };

            let report = match waited {
                Ok(status) => ExitReport::from_status(status),
                Err(e) => {
                    tracing::error!("Failed to wait for backend: {}", e);
                    ExitReport::wait_failed()
                }
            };
            if report.success {
                tracing::info!("Backend exited with {}", report);
            } else {
                tracing::warn!("Backend exited with {}", report);
            }

            {
                let mut inner = inner.lock().await;
                inner.stopping.retain(|h| h.generation != generation);
                // a newer launch owns the state now
                if inner.generation == generation {
                    inner.last_exit = Some(report.clone());
                    inner.release(&running_tx);
                }
            }
            let _ = exit_tx.send(Some(report));
        });
    }
}

/// Bounded terminate-then-kill for one handle.
async fn reap(handle: &ChildHandle, grace: Duration) -> Result<Option<ExitReport>, SupervisorError> {
    let mut exit_rx = handle.exit_rx.clone();
    handle.request(Control::Terminate);

    if let Ok(report) = tokio::time::timeout(grace, wait_exit(&mut exit_rx)).await {
        return Ok(report);
    }

    tracing::warn!(
        "Backend (pid {}) still alive after {:?}, killing",
        handle.pid,
        grace
    );
    handle.request(Control::Kill);

    tokio::time::timeout(KILL_REAP_TIMEOUT, wait_exit(&mut exit_rx))
        .await
        .map_err(|_| SupervisorError::TerminationFailed {
            pid: handle.pid,
            reason: "process did not exit after kill".to_string(),
        })
}

async fn wait_exit(rx: &mut watch::Receiver<Option<ExitReport>>) -> Option<ExitReport> {
    loop {
        if let Some(report) = rx.borrow_and_update().clone() {
            return Some(report);
        }
        if rx.changed().await.is_err() {
            return rx.borrow().clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supervisor_with(candidates: Vec<PathBuf>) -> BackendSupervisor {
        BackendSupervisor::new(BackendConfig::default(), EntryResolver::new(candidates))
    }

    #[tokio::test]
    async fn start_without_entry_stays_stopped() {
        let sup = supervisor_with(vec![]);
        assert_eq!(sup.start().await, StartOutcome::NotStarted);
        assert!(!sup.is_running());
        assert!(sup.pid().await.is_none());

        let status = sup.status().await;
        assert_eq!(status.state, State::Stopped);
        assert_eq!(status.generation, 0);
    }

    #[tokio::test]
    async fn try_start_reports_missing_entry() {
        let sup = supervisor_with(vec![PathBuf::from("/nonexistent/a.js")]);
        let err = sup.try_start().await.unwrap_err();
        assert_eq!(err.error_code(), "ENTRY_NOT_FOUND");
    }

    #[tokio::test]
    async fn spawn_failure_degrades_to_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("server.js");
        std::fs::write(&entry, "").unwrap();

        let config = BackendConfig {
            program: "/nonexistent/runtime/node".to_string(),
            ..BackendConfig::default()
        };
        let sup = BackendSupervisor::new(config, EntryResolver::fixed(entry));

        assert_eq!(sup.start().await, StartOutcome::NotStarted);
        assert!(!sup.is_running());
        assert_eq!(sup.status().await.generation, 0);
    }

    #[tokio::test]
    async fn stop_when_stopped_is_a_noop() {
        let sup = supervisor_with(vec![]);
        assert!(!sup.stop().await);
        assert!(!sup.stop().await);
        assert!(!sup.is_running());
        assert_eq!(sup.status().await.state, State::Stopped);
    }

    #[tokio::test]
    async fn shutdown_when_stopped_returns_none() {
        let sup = supervisor_with(vec![]);
        let report = sup.shutdown(Duration::from_millis(10)).await.unwrap();
        assert!(report.is_none());
    }

    #[test]
    fn exit_report_display() {
        let clean = ExitReport { code: Some(0), signal: None, success: true };
        assert_eq!(clean.to_string(), "exit code 0");

        let killed = ExitReport { code: None, signal: Some(9), success: false };
        assert_eq!(killed.to_string(), "signal 9");
    }

    #[test]
    fn start_outcome_serializes_with_tag() {
        let json = serde_json::to_value(StartOutcome::AlreadyRunning { pid: 42, generation: 3 }).unwrap();
        assert_eq!(json["outcome"], "already_running");
        assert_eq!(json["pid"], 42);

        let json = serde_json::to_value(StartOutcome::NotStarted).unwrap();
        assert_eq!(json["outcome"], "not_started");
    }
}
