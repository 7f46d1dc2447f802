//! Host process control - Talking to the subsystem client and the process table

use std::cell::RefCell;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::monitor::ProcessMonitor;
use super::settings::Settings;
use crate::platform;

/// Everything the rotation needs from the host OS
pub trait HostController {
    /// Whether the current process holds administrator rights
    fn is_elevated(&self) -> bool;

    /// Ask the subsystem client to shut the subsystem down
    fn request_shutdown(&self) -> Result<()>;

    /// Force-terminate every process with this image name, returning how many were killed
    fn force_kill(&self, image_name: &str) -> Result<usize>;

    /// Whether a process with this image name is listed
    fn is_running(&self, image_name: &str) -> bool;

    /// Start the subsystem client without waiting for it
    fn start_client(&self) -> Result<()>;

    /// Ask the client to open an app by launch URI
    fn launch_app(&self, uri: &str) -> Result<()>;

    /// Block for a settle interval
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Host controller backed by the real client executable and process table
pub struct SystemHost {
    client_path: PathBuf,
    monitor: RefCell<ProcessMonitor>,
}

impl SystemHost {
    pub fn new(client_path: PathBuf) -> Self {
        Self {
            client_path,
            monitor: RefCell::new(ProcessMonitor::new()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.get_client_path())
    }

    /// Run the client with arguments and wait for it to exit
    fn run_client(&self, args: &[&str]) -> Result<()> {
        debug!("Running {} {:?}", self.client_path.display(), args);
        let output = Command::new(&self.client_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to run {}", self.client_path.display()))?;

        if output.status.success() {
            Ok(())
        } else {
            anyhow::bail!(
                "{} {} exited with {}: {}",
                self.client_path.display(),
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )
        }
    }
}

impl HostController for SystemHost {
    fn is_elevated(&self) -> bool {
        platform::is_elevated()
    }

    fn request_shutdown(&self) -> Result<()> {
        self.run_client(&["/shutdown"])
    }

    fn force_kill(&self, image_name: &str) -> Result<usize> {
        let pids = {
            let mut monitor = self.monitor.borrow_mut();
            monitor.refresh();
            monitor.find_processes_by_name(image_name)
        };

        let mut killed = 0;
        for pid in pids {
            match platform::kill_process(pid) {
                Ok(()) => killed += 1,
                Err(e) => warn!("Failed to force terminate {} ({}): {}", image_name, pid, e),
            }
        }

        if killed > 0 {
            info!("Force terminated {} {} process(es)", killed, image_name);
        }
        Ok(killed)
    }

    fn is_running(&self, image_name: &str) -> bool {
        self.monitor.borrow_mut().is_running(image_name)
    }

    fn start_client(&self) -> Result<()> {
        let mut cmd = Command::new(&self.client_path);

        if let Some(parent) = self.client_path.parent() {
            cmd.current_dir(parent);
        }

        // Detach from our console
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            cmd.creation_flags(0x00000008); // DETACHED_PROCESS
        }

        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.client_path.display()))?;

        info!("Spawned subsystem client with PID {}", child.id());
        Ok(())
    }

    fn launch_app(&self, uri: &str) -> Result<()> {
        self.run_client(&["/launch", uri])
    }
}
