//! Profile rotation - Stop the subsystem, swap the active profile, start it again

use std::fmt;
use std::fs;
use std::path::Path;

use tracing::{debug, error, info, warn};

use super::error::{Result, RotatorError};
use super::heartbeat::Heartbeat;
use super::process::HostController;
use super::profile::{Discovery, Profile, ProfileStore};
use super::queue::{ActiveMarker, ProfileQueue, QueueFile};
use super::settings::Settings;
use crate::platform;

/// Where a rotation currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Stopping,
    Swapping,
    Starting,
    LaunchingApp,
    Done,
    Failed,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Stopping => "stopping",
            Self::Swapping => "swapping",
            Self::Starting => "starting",
            Self::LaunchingApp => "launching app",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only view of the profile store and queue
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub discovery: Discovery,
    /// Queue as the next rotation would see it
    pub queue: ProfileQueue,
    pub active: Option<String>,
    pub next: Option<String>,
}

/// Drives one stop → swap → start → launch sequence
pub struct Rotator<H: HostController> {
    settings: Settings,
    store: ProfileStore,
    queue_file: QueueFile,
    marker: ActiveMarker,
    host: H,
    heartbeat: Option<Box<dyn Heartbeat>>,
    phase: Phase,
    failed_during: Option<Phase>,
}

impl<H: HostController> Rotator<H> {
    pub fn new(settings: Settings, host: H) -> Self {
        Self {
            store: ProfileStore::from_settings(&settings),
            queue_file: QueueFile::new(settings.get_queue_file()),
            marker: ActiveMarker::new(settings.get_active_file()),
            settings,
            host,
            heartbeat: None,
            phase: Phase::Idle,
            failed_during: None,
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Box<dyn Heartbeat>) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Phase that was active when the run failed
    pub fn failed_during(&self) -> Option<Phase> {
        self.failed_during
    }

    /// Run a full rotation, returning the activated profile name
    pub fn run(&mut self) -> Result<String> {
        let result = self.rotate();
        if let Err(ref e) = result {
            error!("Rotation failed while {}: {}", self.phase, e);
            self.failed_during = Some(self.phase);
            self.phase = Phase::Failed;
        }
        result
    }

    fn rotate(&mut self) -> Result<String> {
        if !self.host.is_elevated() {
            error!("This tool requires administrator privileges");
            return Err(RotatorError::Permission);
        }

        self.store.ensure_exists()?;

        let queue = self.update_queue()?;
        let (next, rotated) = queue.select_next()?;
        info!("Switching to profile: {}", next);

        let profile = self.store.require(&next)?;

        self.enter(Phase::Stopping);
        self.stop_subsystem()?;

        self.enter(Phase::Swapping);
        self.swap_profile(&profile)?;

        // A swapped profile counts as used even if the restart below fails
        self.queue_file.save(&rotated)?;
        self.marker.write(&next)?;

        self.enter(Phase::Starting);
        self.start_subsystem()?;

        self.enter(Phase::LaunchingApp);
        self.launch_app()?;

        self.enter(Phase::Done);
        self.send_heartbeat();
        info!("Success");
        Ok(next)
    }

    fn enter(&mut self, phase: Phase) {
        debug!("{} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Reconcile the stored queue with the profiles on disk and write it back
    pub fn update_queue(&self) -> Result<ProfileQueue> {
        let discovery = self.store.discover()?;
        let queue = self
            .queue_file
            .load()?
            .reconcile(&discovery.valid, &self.settings.default_profile);
        self.queue_file.save(&queue)?;
        Ok(queue)
    }

    /// Describe the store without modifying anything
    pub fn status(&self) -> Result<StatusReport> {
        let discovery = self.store.discover()?;
        let (queue, seeded) = self
            .queue_file
            .load()?
            .merge(&discovery.valid, &self.settings.default_profile);
        if seeded {
            debug!("No valid profiles, a rotation would fall back to the default");
        }
        let next = queue.head().map(str::to_string);
        Ok(StatusReport {
            discovery,
            queue,
            active: self.marker.read()?,
            next,
        })
    }

    fn stop_subsystem(&self) -> Result<()> {
        let processes = self.settings.subsystem_processes();

        if let Err(e) = self.host.request_shutdown() {
            warn!("First shutdown attempt failed: {:#}", e);
            for name in &processes {
                if let Err(e) = self.host.force_kill(name) {
                    warn!("Failed to terminate {}: {:#}", name, e);
                }
            }
            self.host.sleep(self.settings.shutdown_settle());
        }

        if let Err(e) = self.host.request_shutdown() {
            warn!("Second shutdown attempt failed: {:#}", e);
        }

        self.host.sleep(self.settings.shutdown_settle());

        for name in &processes {
            if self.host.is_running(name) {
                warn!("Process {} is still running", name);
                if let Err(e) = self.host.force_kill(name) {
                    warn!("Failed to force terminate {}: {:#}", name, e);
                }
            }
        }

        self.host.sleep(self.settings.kill_settle());

        if let Some(survivor) = processes.iter().find(|name| self.host.is_running(name)) {
            error!("Subsystem processes still running after shutdown attempts");
            return Err(RotatorError::StopFailed {
                process: survivor.to_string(),
            });
        }

        info!("Subsystem stopped");
        Ok(())
    }

    fn swap_profile(&self, profile: &Profile) -> Result<()> {
        if !profile.is_complete() {
            return Err(RotatorError::ProfileMissing {
                name: profile.name.clone(),
            });
        }

        let target_disk = self.settings.get_target_disk_image();
        let target_settings = self.settings.get_target_settings();

        remove_existing(&target_disk)?;
        remove_existing(&target_settings)?;
        ensure_parent(&target_disk)?;
        ensure_parent(&target_settings)?;

        platform::symlink_file(&profile.disk_image, &target_disk)
            .map_err(|e| RotatorError::io("Failed to link disk image at", &target_disk, e))?;
        copy_preserving(&profile.settings_file, &target_settings)?;

        info!(
            "Activated profile {}: {} -> {}",
            profile.name,
            target_disk.display(),
            profile.disk_image.display()
        );
        Ok(())
    }

    fn start_subsystem(&self) -> Result<()> {
        let client = &self.settings.client_process;

        if let Err(e) = self.host.start_client() {
            error!("Error starting subsystem: {:#}", e);
            return Err(RotatorError::StartFailed {
                reason: format!("{:#}", e),
            });
        }

        self.host.sleep(self.settings.startup_grace());

        if !self.host.is_running(client) {
            error!("Error starting subsystem: {} is not running", client);
            return Err(RotatorError::StartFailed {
                reason: format!("{} is not running", client),
            });
        }

        info!("Subsystem started");
        Ok(())
    }

    fn launch_app(&self) -> Result<()> {
        let attempts = self.settings.launch_attempts;
        let package = &self.settings.app_package;
        let client = &self.settings.client_process;
        let uri = self.settings.launch_uri();

        for attempt in 1..=attempts {
            info!("Launching {} (attempt {}/{})", package, attempt, attempts);
            match self.host.launch_app(&uri) {
                Ok(()) => {
                    self.host.sleep(self.settings.launch_grace());
                    if self.host.is_running(client) {
                        info!("Launched {}", package);
                        return Ok(());
                    }
                    warn!("{} exited after launching {}", client, package);
                }
                Err(e) => warn!("Error launching {}: {:#}", package, e),
            }

            if attempt < attempts {
                self.host.sleep(self.settings.launch_backoff());
            }
        }

        warn!("Failed to launch {} after {} attempts", package, attempts);
        Err(RotatorError::LaunchFailed {
            package: package.clone(),
            attempts,
        })
    }

    fn send_heartbeat(&self) {
        let (Some(url), Some(heartbeat)) = (self.settings.heartbeat_url.as_deref(), &self.heartbeat)
        else {
            debug!("No heartbeat configured");
            return;
        };

        match heartbeat.send(url) {
            Ok(()) => info!("Successfully sent heartbeat to uptime monitoring"),
            Err(e) => warn!("Failed to send heartbeat: {:#}", e),
        }
    }
}

/// Remove a file or link, dangling links included
fn remove_existing(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(_) => {
            fs::remove_file(path).map_err(|e| RotatorError::io("Failed to remove", path, e))?;
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RotatorError::io("Failed to inspect", path, e)),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| RotatorError::io("Failed to create directory", parent, e)),
        _ => Ok(()),
    }
}

/// Copy contents, permissions and modification time
fn copy_preserving(from: &Path, to: &Path) -> Result<()> {
    fs::copy(from, to).map_err(|e| RotatorError::io("Failed to copy settings to", to, e))?;

    let modified = fs::metadata(from)
        .and_then(|m| m.modified())
        .map_err(|e| RotatorError::io("Failed to read timestamps of", from, e))?;

    match fs::OpenOptions::new().write(true).open(to) {
        Ok(file) => file
            .set_modified(modified)
            .map_err(|e| RotatorError::io("Failed to set timestamps on", to, e))?,
        Err(e) => debug!("Keeping copy timestamp on {}: {}", to.display(), e),
    }
    Ok(())
}
