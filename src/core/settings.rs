//! Rotator settings management

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Package family name of the Windows Subsystem for Android
pub const SUBSYSTEM_PACKAGE: &str = "MicrosoftCorporationII.WindowsSubsystemForAndroid_8wekyb3d8bbwe";

/// Queue file name inside the profile store
pub const QUEUE_FILE: &str = "_queue.txt";
/// Active-profile marker file name inside the profile store
pub const ACTIVE_FILE: &str = "_active.txt";
/// Log file name inside the profile store
pub const LOG_FILE: &str = "_logs.log";

/// Rotator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Locations
    /// Subsystem package data root (defaults to %LOCALAPPDATA%\Packages\<package>)
    pub subsystem_root: Option<PathBuf>,
    /// Subsystem client executable
    pub client_path: Option<PathBuf>,
    /// Directory holding the saved profiles
    pub profiles_dir: Option<PathBuf>,
    /// Path the subsystem reads its user data disk from
    pub target_disk_image: Option<PathBuf>,
    /// Path the subsystem reads its settings from
    pub target_settings: Option<PathBuf>,

    // Profiles
    /// Extension of profile disk images
    pub disk_image_extension: String,
    /// Extension of profile settings files
    pub settings_extension: String,
    /// Queue seed used when no valid profile exists
    pub default_profile: String,

    // Subsystem processes
    /// Image name of the subsystem client
    pub client_process: String,
    /// Other subsystem processes that must be gone before swapping
    pub auxiliary_processes: Vec<String>,
    /// Android package launched after the restart
    pub app_package: String,

    // Timing
    pub shutdown_settle_secs: u64,
    pub kill_settle_secs: u64,
    pub startup_grace_secs: u64,
    pub launch_grace_secs: u64,
    pub launch_backoff_secs: u64,
    /// Launch attempts before giving up
    pub launch_attempts: u32,

    // Monitoring
    /// Uptime monitor pinged after a successful run
    pub heartbeat_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            subsystem_root: None,
            client_path: None,
            profiles_dir: None,
            target_disk_image: None,
            target_settings: None,

            disk_image_extension: "vhdx".to_string(),
            settings_extension: "dat".to_string(),
            default_profile: "profile1".to_string(),

            client_process: "WsaClient.exe".to_string(),
            auxiliary_processes: vec!["WsaSettings.exe".to_string()],
            app_package: "com.google.android.apps.photos".to_string(),

            shutdown_settle_secs: 2,
            kill_settle_secs: 1,
            startup_grace_secs: 10,
            launch_grace_secs: 20,
            launch_backoff_secs: 5,
            launch_attempts: 3,

            heartbeat_url: None,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let mut settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        settings.validate();
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load from an explicit path, the default config location, or fall back to defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_config_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => {
                debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// `<config_dir>/wsa-rotator/config.json`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("wsa-rotator").join("config.json"))
    }

    /// Export settings to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Get the subsystem package root, using default if not set
    pub fn get_subsystem_root(&self) -> PathBuf {
        self.subsystem_root.clone().unwrap_or_else(|| {
            local_app_data().join("Packages").join(SUBSYSTEM_PACKAGE)
        })
    }

    /// Get the client executable path
    pub fn get_client_path(&self) -> PathBuf {
        self.client_path.clone().unwrap_or_else(|| {
            local_app_data()
                .join("Microsoft")
                .join("WindowsApps")
                .join(SUBSYSTEM_PACKAGE)
                .join(&self.client_process)
        })
    }

    /// Get the profile store directory
    pub fn get_profiles_directory(&self) -> PathBuf {
        self.profiles_dir
            .clone()
            .unwrap_or_else(|| self.get_subsystem_root().join("Profiles"))
    }

    /// Get the active disk image path
    pub fn get_target_disk_image(&self) -> PathBuf {
        self.target_disk_image.clone().unwrap_or_else(|| {
            self.get_subsystem_root()
                .join("LocalCache")
                .join("userdata.2.vhdx")
        })
    }

    /// Get the active settings file path
    pub fn get_target_settings(&self) -> PathBuf {
        self.target_settings.clone().unwrap_or_else(|| {
            self.get_subsystem_root()
                .join("Settings")
                .join("settings.dat")
        })
    }

    pub fn get_queue_file(&self) -> PathBuf {
        self.get_profiles_directory().join(QUEUE_FILE)
    }

    pub fn get_active_file(&self) -> PathBuf {
        self.get_profiles_directory().join(ACTIVE_FILE)
    }

    pub fn get_log_file(&self) -> PathBuf {
        self.get_profiles_directory().join(LOG_FILE)
    }

    /// All subsystem image names, client first
    pub fn subsystem_processes(&self) -> Vec<&str> {
        std::iter::once(self.client_process.as_str())
            .chain(self.auxiliary_processes.iter().map(String::as_str))
            .collect()
    }

    /// URI handed to the client's launch command
    pub fn launch_uri(&self) -> String {
        format!("wsa://{}", self.app_package)
    }

    pub fn shutdown_settle(&self) -> Duration {
        Duration::from_secs(self.shutdown_settle_secs)
    }

    pub fn kill_settle(&self) -> Duration {
        Duration::from_secs(self.kill_settle_secs)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_secs(self.startup_grace_secs)
    }

    pub fn launch_grace(&self) -> Duration {
        Duration::from_secs(self.launch_grace_secs)
    }

    pub fn launch_backoff(&self) -> Duration {
        Duration::from_secs(self.launch_backoff_secs)
    }

    /// Validate settings and fix any invalid values
    pub fn validate(&mut self) {
        self.launch_attempts = self.launch_attempts.max(1);
        if self.default_profile.trim().is_empty() {
            self.default_profile = Self::default().default_profile;
        }
        if self.client_process.trim().is_empty() {
            self.client_process = Self::default().client_process;
        }
        self.auxiliary_processes.retain(|p| !p.trim().is_empty());
        for ext in [&mut self.disk_image_extension, &mut self.settings_extension] {
            *ext = ext.trim_start_matches('.').to_string();
        }
        self.heartbeat_url = self
            .heartbeat_url
            .take()
            .filter(|url| !url.trim().is_empty());
    }
}

fn local_app_data() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "profiles_dir": "/srv/profiles", "launch_attempts": 0, "heartbeat_url": "  " }"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.get_profiles_directory(), PathBuf::from("/srv/profiles"));
        assert_eq!(settings.launch_attempts, 1);
        assert_eq!(settings.heartbeat_url, None);
        assert_eq!(settings.client_process, "WsaClient.exe");
        assert_eq!(
            settings.get_queue_file(),
            PathBuf::from("/srv/profiles").join(QUEUE_FILE)
        );
    }

    #[test]
    fn targets_derive_from_subsystem_root() {
        let settings = Settings {
            subsystem_root: Some(PathBuf::from("/wsa")),
            ..Default::default()
        };
        assert_eq!(
            settings.get_target_disk_image(),
            PathBuf::from("/wsa").join("LocalCache").join("userdata.2.vhdx")
        );
        assert_eq!(
            settings.get_target_settings(),
            PathBuf::from("/wsa").join("Settings").join("settings.dat")
        );
        assert_eq!(settings.get_profiles_directory(), PathBuf::from("/wsa").join("Profiles"));
    }

    #[test]
    fn extensions_lose_leading_dot() {
        let mut settings = Settings {
            disk_image_extension: ".vhdx".into(),
            auxiliary_processes: vec!["".into(), "WsaSettings.exe".into()],
            ..Default::default()
        };
        settings.validate();
        assert_eq!(settings.disk_image_extension, "vhdx");
        assert_eq!(settings.subsystem_processes(), vec!["WsaClient.exe", "WsaSettings.exe"]);
        assert_eq!(settings.launch_uri(), "wsa://com.google.android.apps.photos");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::load(&dir.path().join("nope.json")).is_err());
    }
}
