//! Per-run logging to the console and the profile store's log file

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Dispatch;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Local wall-clock timestamps in a chrono format
struct LocalTime(&'static str);

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Local::now().format(self.0))
    }
}

/// Logger for one run, scoped instead of installed globally
pub struct RunLog {
    dispatch: Dispatch,
    file: Option<PathBuf>,
}

impl RunLog {
    /// Console output only
    pub fn console() -> Self {
        Self {
            dispatch: build_dispatch(None),
            file: None,
        }
    }

    /// Console output plus an append-only log file; falls back to the console
    /// alone if the file cannot be opened
    pub fn with_file(path: &Path) -> Self {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Self {
                dispatch: build_dispatch(Some(file)),
                file: Some(path.to_path_buf()),
            },
            Err(e) => {
                let log = Self::console();
                log.scope(|| {
                    tracing::warn!("Cannot open log file {}: {}", path.display(), e);
                });
                log
            }
        }
    }

    /// Run `f` with this logger as the active subscriber
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        tracing::dispatcher::with_default(&self.dispatch, f)
    }

    /// Run `f` under this logger, log its failure, then write the run separator
    pub fn run<T>(&self, f: impl FnOnce() -> anyhow::Result<T>) -> Option<T> {
        let outcome = self.scope(|| match f() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Script failed: {:#}", e);
                None
            }
        });
        self.separate();
        outcome
    }

    /// Append the blank line separating runs
    pub fn separate(&self) {
        let Some(path) = &self.file else {
            return;
        };
        if let Err(e) = OpenOptions::new()
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(b"\n"))
        {
            eprintln!("Failed to write run separator to {}: {}", path.display(), e);
        }
    }
}

fn build_dispatch(file: Option<File>) -> Dispatch {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wsa_rotator=info"));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_timer(LocalTime("%H:%M:%S"));

    let file = file.map(|f| {
        tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(f))
            .with_ansi(false)
            .with_target(false)
            .with_timer(LocalTime("%Y-%m-%d %H:%M:%S"))
    });

    Dispatch::new(
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .with(file),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_gets_entries_and_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_logs.log");

        for run in ["first", "second"] {
            let log = RunLog::with_file(&path);
            log.scope(|| tracing::warn!(target: "wsa_rotator", "{} run", run));
            log.separate();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("first run"), "{}", lines[0]);
        assert!(lines[0].contains("WARN"));
        assert_eq!(lines[1], "");
        assert!(lines[2].ends_with("second run"));
        assert_eq!(lines[3], "");
    }

    #[test]
    fn run_logs_failure_before_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_logs.log");
        let log = RunLog::with_file(&path);

        assert_eq!(log.run(|| Ok::<_, anyhow::Error>(7)), Some(7));
        assert_eq!(log.run(|| -> anyhow::Result<()> { anyhow::bail!("disk on fire") }), None);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3, "{contents:?}");
        assert_eq!(lines[0], "");
        assert!(lines[1].contains("ERROR"));
        assert!(lines[1].ends_with("Script failed: disk on fire"));
        assert_eq!(lines[2], "");
    }

    #[test]
    fn unopenable_file_falls_back_to_console() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::with_file(&dir.path().join("missing").join("_logs.log"));
        assert!(log.file.is_none());
        log.separate();
    }
}
