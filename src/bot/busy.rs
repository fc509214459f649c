//! Busy indicator
//!
//! Counts running commands. When a busy file is configured it exists exactly
//! while at least one command runs, so deploy tooling can wait for an idle bot
//! before restarting it.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::BotError;

#[derive(Debug)]
pub struct CommandTracker {
    running: Mutex<usize>,
    busy_file: Option<PathBuf>,
}

impl CommandTracker {
    pub fn new(busy_file: Option<PathBuf>) -> Self {
        Self {
            running: Mutex::new(0),
            busy_file,
        }
    }

    pub fn busy_file(&self) -> Option<&Path> {
        self.busy_file.as_deref()
    }

    pub fn running(&self) -> usize {
        *self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark a command as started; it ends when the guard drops.
    pub fn begin(self: &Arc<Self>) -> Result<CommandGuard, BotError> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if *running == 0 {
            if let Some(path) = &self.busy_file {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| BotError::BusyFile {
                        path: path.clone(),
                        source,
                    })?;
                tracing::debug!(path = %path.display(), "busy file created");
            }
        }
        *running += 1;
        Ok(CommandGuard {
            tracker: Arc::clone(self),
        })
    }

    fn end(&self) {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        *running = running.saturating_sub(1);
        if *running == 0 {
            self.remove_busy_file();
        }
    }

    /// Remove the busy file if present
    pub fn remove_busy_file(&self) {
        let Some(path) = &self.busy_file else {
            return;
        };
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "busy file removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove busy file")
            }
        }
    }
}

impl Drop for CommandTracker {
    fn drop(&mut self) {
        self.remove_busy_file();
    }
}

/// Held for the duration of one command
#[derive(Debug)]
pub struct CommandGuard {
    tracker: Arc<CommandTracker>,
}

impl Drop for CommandGuard {
    fn drop(&mut self) {
        self.tracker.end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_counts_without_busy_file() {
        let tracker = Arc::new(CommandTracker::new(None));
        let a = tracker.begin().unwrap();
        let b = tracker.begin().unwrap();
        assert_eq!(tracker.running(), 2);
        drop(a);
        assert_eq!(tracker.running(), 1);
        drop(b);
        assert_eq!(tracker.running(), 0);
    }

    #[test]
    fn test_busy_file_exists_while_running() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("busy");
        let tracker = Arc::new(CommandTracker::new(Some(path.clone())));

        assert!(!path.exists());
        let first = tracker.begin().unwrap();
        assert!(path.exists());
        let second = tracker.begin().unwrap();
        drop(first);
        assert!(path.exists(), "file stays while a command still runs");
        drop(second);
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_busy_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("busy");
        std::fs::write(&path, "").unwrap();

        drop(CommandTracker::new(Some(path.clone())));
        assert!(!path.exists());
    }

    #[test]
    fn test_unwritable_busy_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("busy");
        let tracker = Arc::new(CommandTracker::new(Some(path)));

        let err = tracker.begin().unwrap_err();
        assert!(matches!(err, BotError::BusyFile { .. }));
        assert_eq!(tracker.running(), 0);
    }
}
