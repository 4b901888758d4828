//! Readiness handshake: poll the backend's health endpoint before the
//! window URL is handed out.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::ReadinessConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Any non-5xx answer counts as listening.
    Ready { status: u16, elapsed: Duration },
    TimedOut { elapsed: Duration },
    /// The child went away while we were waiting.
    BackendExited,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    client: reqwest::Client,
    url: String,
    interval: Duration,
    timeout: Duration,
}

impl ReadinessProbe {
    pub fn new(port: u16, cfg: &ReadinessConfig) -> Self {
        let path = if cfg.health_path.starts_with('/') {
            cfg.health_path.clone()
        } else {
            format!("/{}", cfg.health_path)
        };
        let interval = Duration::from_millis(cfg.poll_interval_ms.max(10));

        // a single attempt never outlives the poll interval by much
        let client = reqwest::Client::builder()
            .timeout(interval.max(Duration::from_millis(500)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: format!("http://127.0.0.1:{}{}", port, path),
            interval,
            timeout: Duration::from_millis(cfg.timeout_ms),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn wait(&self) -> Readiness {
        self.poll(None).await
    }

    /// Poll until ready, timed out, or `running` drops to false.
    pub async fn wait_while_running(&self, running: watch::Receiver<bool>) -> Readiness {
        self.poll(Some(running)).await
    }

    async fn poll(&self, running: Option<watch::Receiver<bool>>) -> Readiness {
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut attempts = 0u32;

        loop {
            if let Some(rx) = &running {
                if !*rx.borrow() {
                    tracing::warn!("Backend exited before becoming ready");
                    return Readiness::BackendExited;
                }
            }

            attempts += 1;
            match self.client.get(&self.url).send().await {
                Ok(resp) if !resp.status().is_server_error() => {
                    let elapsed = started.elapsed();
                    tracing::info!(
                        "Backend ready at {} ({} after {} attempt(s), {:?})",
                        self.url,
                        resp.status(),
                        attempts,
                        elapsed
                    );
                    return Readiness::Ready {
                        status: resp.status().as_u16(),
                        elapsed,
                    };
                }
                Ok(resp) => {
                    tracing::debug!("Health check returned {}", resp.status());
                }
                Err(e) => {
                    tracing::debug!("Health check attempt {} failed: {}", attempts, e);
                }
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    "Backend not ready at {} after {:?}; continuing anyway",
                    self.url,
                    self.timeout
                );
                return Readiness::TimedOut {
                    elapsed: started.elapsed(),
                };
            }
            tokio::time::sleep(self.interval.min(deadline - now)).await;
        }
    }
}
