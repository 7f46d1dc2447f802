//! Profile store - Saved disk image / settings pairs

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::{Result, RotatorError};
use super::settings::Settings;

/// A saved subsystem state: a disk image and a settings file sharing one stem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Stem shared by both artifacts
    pub name: String,
    /// `<store>/<name>.<disk ext>`
    pub disk_image: PathBuf,
    /// `<store>/<name>.<settings ext>`
    pub settings_file: PathBuf,
}

impl Profile {
    /// Check both artifacts exist
    pub fn is_complete(&self) -> bool {
        self.disk_image.is_file() && self.settings_file.is_file()
    }
}

/// Result of scanning the profile store
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Names with both artifacts present, sorted
    pub valid: Vec<String>,
    /// Disk images without a settings file
    pub orphans: Vec<PathBuf>,
}

/// Directory of saved profiles
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
    disk_ext: String,
    settings_ext: String,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>, disk_ext: impl Into<String>, settings_ext: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            disk_ext: disk_ext.into(),
            settings_ext: settings_ext.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.get_profiles_directory(),
            settings.disk_image_extension.clone(),
            settings.settings_extension.clone(),
        )
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the store directory if it doesn't exist
    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| RotatorError::io("Failed to create profile store", &self.dir, e))
    }

    /// Build the artifact paths for a profile name
    pub fn profile(&self, name: &str) -> Profile {
        Profile {
            name: name.to_string(),
            disk_image: self.dir.join(format!("{}.{}", name, self.disk_ext)),
            settings_file: self.dir.join(format!("{}.{}", name, self.settings_ext)),
        }
    }

    /// Look up a profile, failing if either artifact is gone
    pub fn require(&self, name: &str) -> Result<Profile> {
        let profile = self.profile(name);
        if profile.is_complete() {
            Ok(profile)
        } else {
            Err(RotatorError::ProfileMissing {
                name: name.to_string(),
            })
        }
    }

    /// Scan the store for valid profiles, logging orphaned disk images
    pub fn discover(&self) -> Result<Discovery> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Profile store {} does not exist yet", self.dir.display());
                return Ok(Discovery::default());
            }
            Err(e) => return Err(RotatorError::io("Failed to scan profile store", &self.dir, e)),
        };

        let mut discovery = Discovery::default();
        for entry in entries {
            let entry = entry.map_err(|e| RotatorError::io("Failed to scan profile store", &self.dir, e))?;
            let path = entry.path();

            let is_disk_image = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(&self.disk_ext));
            if !is_disk_image || !path.is_file() {
                continue;
            }

            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping disk image with a non UTF-8 name: {}", path.display());
                continue;
            };

            // Valid only if the paths `require` builds resolve, so a case
            // mismatch in the extension is an orphan on case-sensitive stores
            if self.profile(stem).is_complete() {
                discovery.valid.push(stem.to_string());
            } else {
                warn!(
                    "Found orphaned disk image: {}",
                    path.file_name().unwrap_or_default().to_string_lossy()
                );
                discovery.orphans.push(path);
            }
        }

        discovery.valid.sort();
        discovery.orphans.sort();
        debug!(
            "Discovered {} valid profile(s), {} orphan(s)",
            discovery.valid.len(),
            discovery.orphans.len()
        );
        Ok(discovery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store(dir: &Path) -> ProfileStore {
        ProfileStore::new(dir, "vhdx", "dat")
    }

    #[test]
    fn discovers_complete_profiles_and_orphans() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["beta.vhdx", "beta.dat", "alpha.vhdx", "alpha.dat", "lonely.vhdx", "stray.dat"] {
            fs::write(dir.path().join(file), b"x").unwrap();
        }
        fs::write(dir.path().join("_queue.txt"), b"alpha\n").unwrap();

        let discovery = store(dir.path()).discover().unwrap();
        assert_eq!(discovery.valid, vec!["alpha", "beta"]);
        assert_eq!(discovery.orphans, vec![dir.path().join("lonely.vhdx")]);
    }

    #[test]
    fn missing_store_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = store(&dir.path().join("absent")).discover().unwrap();
        assert!(discovery.valid.is_empty());
        assert!(discovery.orphans.is_empty());
    }

    #[test]
    fn require_rejects_half_profiles() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("p1.vhdx"), b"disk").unwrap();

        let err = store(dir.path()).require("p1").unwrap_err();
        assert!(matches!(err, RotatorError::ProfileMissing { ref name } if name == "p1"));

        fs::write(dir.path().join("p1.dat"), b"settings").unwrap();
        let profile = store(dir.path()).require("p1").unwrap();
        assert_eq!(profile.disk_image, dir.path().join("p1.vhdx"));
        assert_eq!(profile.settings_file, dir.path().join("p1.dat"));
    }

    #[test]
    fn discovered_profiles_pass_require() {
        let dir = tempfile::tempdir().unwrap();
        for file in ["P1.VHDX", "P1.dat", "p2.vhdx", "p2.dat"] {
            fs::write(dir.path().join(file), b"x").unwrap();
        }
        let store = store(dir.path());

        let discovery = store.discover().unwrap();
        for name in &discovery.valid {
            assert!(store.require(name).is_ok(), "{name} discovered but not usable");
        }
        assert!(discovery.valid.contains(&"p2".to_string()));

        // Case-sensitive filesystems cannot resolve P1.vhdx
        if !dir.path().join("P1.vhdx").exists() {
            assert_eq!(discovery.valid, vec!["p2"]);
            assert_eq!(discovery.orphans, vec![dir.path().join("P1.VHDX")]);
        }
    }

    #[test]
    fn directories_named_like_images_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("weird.vhdx")).unwrap();
        fs::write(dir.path().join("weird.dat"), b"x").unwrap();

        let discovery = store(dir.path()).discover().unwrap();
        assert!(discovery.valid.is_empty());
    }
}
