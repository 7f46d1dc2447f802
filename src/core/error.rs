//! Error taxonomy for a rotation run

use std::path::PathBuf;

use thiserror::Error;

/// Everything that can abort a rotation
#[derive(Debug, Error)]
pub enum RotatorError {
    /// The process is not elevated
    #[error("Administrator privileges required")]
    Permission,

    /// Another rotation holds the process lock
    #[error("Another rotation is already running")]
    AlreadyRunning,

    /// Queue is empty after reconciliation
    #[error("No profiles in queue")]
    NoProfiles,

    /// The selected profile lost its disk image or settings file
    #[error("Profile files not found for {name}")]
    ProfileMissing { name: String },

    /// Subsystem processes survived every shutdown attempt
    #[error("Failed to stop subsystem completely: {process} still running")]
    StopFailed { process: String },

    /// The client did not come up after starting it
    #[error("Failed to start subsystem: {reason}")]
    StartFailed { reason: String },

    /// The app never stayed up within the retry bound
    #[error("Failed to launch {package} after {attempts} attempts")]
    LaunchFailed { package: String, attempts: u32 },

    #[error("{action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RotatorError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = RotatorError> = std::result::Result<T, E>;
