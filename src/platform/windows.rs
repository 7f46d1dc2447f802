//! Windows-specific process control and privilege checks

use std::ffi::c_void;
use std::mem;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use windows::Win32::Foundation::{CloseHandle, FALSE, HANDLE};
use windows::Win32::Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY};
use windows::Win32::System::Threading::*;

/// Check whether the process token is elevated
pub fn is_elevated() -> bool {
    unsafe {
        let mut token = HANDLE::default();
        if let Err(e) = OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) {
            warn!("Could not open process token: {}", e);
            return false;
        }

        let mut elevation = TOKEN_ELEVATION::default();
        let mut returned: u32 = 0;
        let result = GetTokenInformation(
            token,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut c_void),
            mem::size_of::<TOKEN_ELEVATION>() as u32,
            &mut returned,
        );
        let _ = CloseHandle(token);

        match result {
            Ok(()) => elevation.TokenIsElevated != 0,
            Err(e) => {
                warn!("Could not query token elevation: {}", e);
                false
            }
        }
    }
}

/// Force kill a process
pub fn kill_process(pid: u32) -> Result<()> {
    unsafe {
        let handle =
            OpenProcess(PROCESS_TERMINATE, FALSE, pid).context("Failed to open process")?;

        let result = TerminateProcess(handle, 1);
        CloseHandle(handle)?;

        if result.is_ok() {
            debug!("Terminated process {}", pid);
            Ok(())
        } else {
            anyhow::bail!("Failed to kill process {}", pid)
        }
    }
}
