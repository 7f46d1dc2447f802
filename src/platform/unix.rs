//! Unix-specific process control and privilege checks

use anyhow::Result;
use tracing::debug;

/// Root is the Unix equivalent of an elevated token
pub fn is_elevated() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Force kill a process (SIGKILL)
pub fn kill_process(pid: u32) -> Result<()> {
    unsafe {
        let result = libc::kill(pid as i32, libc::SIGKILL);
        if result == 0 {
            debug!("Sent SIGKILL to {}", pid);
            Ok(())
        } else {
            anyhow::bail!(
                "Failed to kill process {}: {}",
                pid,
                std::io::Error::last_os_error()
            )
        }
    }
}
