//! Command construction for the backend child.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

pub const NODE_ENV: &str = "NODE_ENV";
/// Marker telling the backend it runs inside the desktop shell.
pub const DESKTOP_MARKER: &str = "AURORA_DESKTOP";
pub const PORT: &str = "PORT";

/// Everything needed to spawn the backend once the entry is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: String,
    pub args: Vec<String>,
    /// Overlay applied on top of the inherited environment
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
}

impl LaunchPlan {
    /// `program [runtime_args..] <entry>` with the desktop overlay. Extra
    /// variables are applied first so they can never mask the fixed ones.
    pub fn new(
        program: &str,
        runtime_args: &[String],
        entry: &Path,
        port: u16,
        extra_env: &BTreeMap<String, String>,
    ) -> Self {
        let mut args = runtime_args.to_vec();
        args.push(entry.to_string_lossy().into_owned());

        let mut env = extra_env.clone();
        env.insert(NODE_ENV.to_string(), "production".to_string());
        env.insert(DESKTOP_MARKER.to_string(), "true".to_string());
        env.insert(PORT.to_string(), port.to_string());

        Self {
            program: program.to_string(),
            args,
            env,
            working_dir: entry
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf),
        }
    }

    /// Stdio is inherited; the child's output goes straight to ours.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        hide_console_window(&mut cmd);
        cmd
    }
}

#[cfg(target_os = "windows")]
fn hide_console_window(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x08000000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(target_os = "windows"))]
fn hide_console_window(_cmd: &mut Command) {}
