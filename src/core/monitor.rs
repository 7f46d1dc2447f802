//! Process list lookups by image name

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::trace;

/// Snapshot of the host process table
pub struct ProcessMonitor {
    system: System,
}

impl ProcessMonitor {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Re-read the process table
    pub fn refresh(&mut self) {
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::everything(),
        );
        trace!("Process table refreshed");
    }

    /// PIDs whose image name matches `name` exactly, ignoring ASCII case
    pub fn find_processes_by_name(&self, name: &str) -> Vec<u32> {
        self.system
            .processes()
            .iter()
            .filter(|(_, proc)| image_matches(&proc.name().to_string_lossy(), name))
            .map(|(pid, _)| pid.as_u32())
            .collect()
    }

    /// Refresh and check whether any process with this image name is listed
    pub fn is_running(&mut self, name: &str) -> bool {
        self.refresh();
        !self.find_processes_by_name(name).is_empty()
    }
}

impl Default for ProcessMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Windows lists `WsaClient.exe`, other hosts may drop the extension
fn image_matches(process_name: &str, wanted: &str) -> bool {
    strip_exe(process_name).eq_ignore_ascii_case(strip_exe(wanted))
}

fn strip_exe(name: &str) -> &str {
    let split = name.len().checked_sub(4).filter(|&i| i > 0);
    match split.and_then(|i| name.get(i..).map(|ext| (i, ext))) {
        Some((i, ext)) if ext.eq_ignore_ascii_case(".exe") => &name[..i],
        _ => name,
    }
}
