use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/shell.toml";

/// Port the bundled backend listens on.
pub const DEFAULT_BACKEND_PORT: u16 = 8000;

pub const DEFAULT_IPC_PORT: u16 = 57480;

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ShellConfig {
    pub backend: BackendConfig,
    pub readiness: ReadinessConfig,
    pub ipc: IpcConfig,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub port: u16,
    /// Runtime used to run the entry script (e.g. `node`)
    pub program: String,
    /// Extra runtime arguments, placed before the entry path
    pub args: Vec<String>,
    /// Ordered entry candidates. `{exe_dir}` expands to the directory of the
    /// running executable; glob patterns are allowed.
    pub candidates: Vec<String>,
    /// Pre-resolved entry. When set, candidates are not probed.
    pub entry: Option<PathBuf>,
    /// Base directory for relative candidates (defaults to the working directory)
    pub base_dir: Option<PathBuf>,
    pub shutdown_grace_ms: u64,
    /// Extra environment for the child. The desktop overlay always wins.
    pub env: BTreeMap<String, String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_BACKEND_PORT,
            program: "node".to_string(),
            args: Vec::new(),
            candidates: vec![
                "{exe_dir}/resources/app/backend/server.js".to_string(),
                "backend/server.js".to_string(),
            ],
            entry: None,
            base_dir: None,
            shutdown_grace_ms: 5_000,
            env: BTreeMap::new(),
        }
    }
}

impl BackendConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ReadinessConfig {
    pub enabled: bool,
    pub health_path: String,
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            health_path: "/api/health".to_string(),
            poll_interval_ms: 250,
            timeout_ms: 15_000,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct IpcConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: DEFAULT_IPC_PORT,
        }
    }
}

impl ShellConfig {
    /// Load from `AURORA_SHELL_CONFIG` (or `config/shell.toml`), then apply
    /// environment overrides. A missing file yields the defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("AURORA_SHELL_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut cfg = Self::load_from(Path::new(&path))?;
        cfg.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&s).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Apply `AURORA_*` overrides through `lookup` so tests don't touch the
    /// process environment.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("AURORA_BACKEND_PORT") {
            self.backend.port = port
                .trim()
                .parse()
                .with_context(|| format!("AURORA_BACKEND_PORT is not a port: {}", port))?;
        }
        if let Some(program) = lookup("AURORA_BACKEND_PROGRAM") {
            self.backend.program = program;
        }
        if let Some(entry) = lookup("AURORA_BACKEND_ENTRY") {
            self.backend.entry = Some(PathBuf::from(entry));
        }
        if let Some(port) = lookup("AURORA_IPC_PORT") {
            self.ipc.port = port
                .trim()
                .parse()
                .with_context(|| format!("AURORA_IPC_PORT is not a port: {}", port))?;
        }
        Ok(())
    }
}
