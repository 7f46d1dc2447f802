//! Rotation queue - Persistent FIFO of profile names

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::{Result, RotatorError};

/// Ordered profile names, head activates next
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileQueue {
    names: Vec<String>,
}

impl ProfileQueue {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn head(&self) -> Option<&str> {
        self.names.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Parse the on-disk form, one name per line
    pub fn parse(contents: &str) -> Self {
        Self::new(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        )
    }

    /// Render the on-disk form, a trailing newline after every entry
    pub fn render(&self) -> String {
        self.names.iter().map(|name| format!("{name}\n")).collect()
    }

    /// Drop entries that are no longer valid, append new valid names at the end,
    /// and fall back to `default` when nothing is left
    pub fn reconcile(&self, valid: &[String], default: &str) -> Self {
        let (queue, seeded) = self.merge(valid, default);
        if seeded {
            warn!("No valid profiles found. Created default profile.");
        }
        queue
    }

    /// Same result as `reconcile` without logging; the flag reports whether
    /// the default entry had to be seeded
    pub fn merge(&self, valid: &[String], default: &str) -> (Self, bool) {
        let valid_set: HashSet<&str> = valid.iter().map(String::as_str).collect();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut names = Vec::with_capacity(valid.len());

        for name in &self.names {
            if valid_set.contains(name.as_str()) && seen.insert(name.as_str()) {
                names.push(name.clone());
            }
        }

        for name in valid {
            if seen.insert(name.as_str()) {
                names.push(name.clone());
            }
        }

        let seeded = names.is_empty();
        if seeded {
            names.push(default.to_string());
        }

        (Self { names }, seeded)
    }

    /// Return the head and the queue with the head moved to the tail
    pub fn select_next(&self) -> Result<(String, Self)> {
        let (head, rest) = self.names.split_first().ok_or(RotatorError::NoProfiles)?;
        let mut names = rest.to_vec();
        names.push(head.clone());
        Ok((head.clone(), Self { names }))
    }
}

/// Queue persisted as a plain text file
#[derive(Debug, Clone)]
pub struct QueueFile {
    path: PathBuf,
}

impl QueueFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the queue, a missing file is an empty queue
    pub fn load(&self) -> Result<ProfileQueue> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(ProfileQueue::parse(&contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Queue file {} not found, starting empty", self.path.display());
                Ok(ProfileQueue::default())
            }
            Err(e) => Err(RotatorError::io("Failed to read queue", &self.path, e)),
        }
    }

    /// Rewrite the whole queue file
    pub fn save(&self, queue: &ProfileQueue) -> Result<()> {
        std::fs::write(&self.path, queue.render())
            .map_err(|e| RotatorError::io("Failed to write queue", &self.path, e))?;
        debug!("Queue saved: {:?}", queue.names());
        Ok(())
    }
}

/// Single-line record of the last activated profile
#[derive(Debug, Clone)]
pub struct ActiveMarker {
    path: PathBuf,
}

impl ActiveMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents.trim().to_string()).filter(|s| !s.is_empty())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RotatorError::io("Failed to read active profile", &self.path, e)),
        }
    }

    pub fn write(&self, name: &str) -> Result<()> {
        std::fs::write(&self.path, name)
            .map_err(|e| RotatorError::io("Failed to write active profile", &self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reconcile_drops_stale_and_appends_new() {
        let queue = ProfileQueue::new(["p3", "gone", "p1"]);
        let valid = names(&["p1", "p2", "p3", "p4"]);

        let reconciled = queue.reconcile(&valid, "profile1");
        assert_eq!(reconciled.names(), ["p3", "p1", "p2", "p4"]);
    }

    #[test]
    fn reconcile_is_idempotent() {
        let queue = ProfileQueue::new(["b", "x", "a", "b"]);
        let valid = names(&["a", "b", "c"]);

        let once = queue.reconcile(&valid, "profile1");
        let twice = once.reconcile(&valid, "profile1");
        assert_eq!(once, twice);
        assert_eq!(once.names(), ["b", "a", "c"]);
    }

    #[test]
    fn reconcile_falls_back_to_default() {
        let queue = ProfileQueue::new(["old1", "old2"]);
        let reconciled = queue.reconcile(&[], "profile1");
        assert_eq!(reconciled.names(), ["profile1"]);

        let from_empty = ProfileQueue::default().reconcile(&[], "profile1");
        assert_eq!(from_empty.names(), ["profile1"]);
    }

    #[test]
    fn merge_reports_seeding() {
        let (queue, seeded) = ProfileQueue::new(["gone"]).merge(&[], "profile1");
        assert!(seeded);
        assert_eq!(queue.names(), ["profile1"]);

        let (queue, seeded) = ProfileQueue::default().merge(&names(&["a"]), "profile1");
        assert!(!seeded);
        assert_eq!(queue, ProfileQueue::default().reconcile(&names(&["a"]), "profile1"));
    }

    #[test]
    fn select_next_moves_head_to_tail() {
        let queue = ProfileQueue::new(["p1", "p2", "p3"]);
        let (next, rotated) = queue.select_next().unwrap();
        assert_eq!(next, "p1");
        assert_eq!(rotated.names(), ["p2", "p3", "p1"]);
    }

    #[test]
    fn full_cycle_visits_each_profile_once() {
        let original = ProfileQueue::new(["a", "b", "c", "d"]);
        let mut queue = original.clone();
        let mut selected = Vec::new();

        for _ in 0..original.len() {
            let (next, rotated) = queue.select_next().unwrap();
            selected.push(next);
            queue = rotated;
        }

        assert_eq!(selected, original.names());
        assert_eq!(queue, original);
    }

    #[test]
    fn select_next_on_empty_queue_fails() {
        let err = ProfileQueue::default().select_next().unwrap_err();
        assert!(matches!(err, RotatorError::NoProfiles));
    }

    #[test]
    fn parse_skips_blank_lines_and_trims() {
        let queue = ProfileQueue::parse("  p1 \r\n\n p2\n\n");
        assert_eq!(queue.names(), ["p1", "p2"]);
        assert_eq!(queue.render(), "p1\np2\n");
    }

    #[test]
    fn queue_file_rewrites_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = QueueFile::new(dir.path().join("_queue.txt"));

        assert!(file.load().unwrap().is_empty());

        file.save(&ProfileQueue::new(["a", "b", "c"])).unwrap();
        file.save(&ProfileQueue::new(["b"])).unwrap();

        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "b\n");
        assert_eq!(file.load().unwrap().names(), ["b"]);
    }

    #[test]
    fn active_marker_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let marker = ActiveMarker::new(dir.path().join("_active.txt"));

        assert_eq!(marker.read().unwrap(), None);
        marker.write("first-profile").unwrap();
        marker.write("p2").unwrap();

        assert_eq!(std::fs::read_to_string(dir.path().join("_active.txt")).unwrap(), "p2");
        assert_eq!(marker.read().unwrap().as_deref(), Some("p2"));
    }
}
