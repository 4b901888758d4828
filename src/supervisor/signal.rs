//! Cross-platform termination request for a child PID.

use super::error::SupervisorError;

/// Ask the process to terminate. On unix this is `SIGTERM`; Windows has no
/// polite equivalent for a console-less child, so it is `TerminateProcess`.
pub fn request_termination(pid: u32) -> Result<(), SupervisorError> {
    tracing::info!("Sending termination request to backend (pid: {})", pid);

    #[cfg(target_os = "windows")]
    {
        use winapi::um::handleapi::CloseHandle;
        use winapi::um::processthreadsapi::{OpenProcess, TerminateProcess};
        use winapi::um::winnt::PROCESS_TERMINATE;

        unsafe {
            let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
            if handle.is_null() {
                return Err(SupervisorError::TerminationFailed {
                    pid,
                    reason: "OpenProcess failed".to_string(),
                });
            }
            let result = TerminateProcess(handle, 0);
            CloseHandle(handle);

            if result == 0 {
                return Err(SupervisorError::TerminationFailed {
                    pid,
                    reason: "TerminateProcess failed".to_string(),
                });
            }
        }
    }

    #[cfg(not(target_os = "windows"))]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let raw = i32::try_from(pid).map_err(|_| SupervisorError::TerminationFailed {
            pid,
            reason: "pid out of range".to_string(),
        })?;
        signal::kill(Pid::from_raw(raw), Signal::SIGTERM).map_err(|e| {
            SupervisorError::TerminationFailed {
                pid,
                reason: format!("Failed to send SIGTERM: {}", e),
            }
        })?;
    }

    Ok(())
}
