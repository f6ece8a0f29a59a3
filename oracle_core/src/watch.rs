//! Config file change detection by modification time.

use crate::error::ConfigError;
use crate::matrix::{self, AdjacencyMatrix};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Polls a config file's mtime and reparses it when it changes.
#[derive(Debug, Clone)]
pub struct ConfigWatcher {
    path: PathBuf,

    /// Last observed mtime; `None` while the file cannot be stat'ed
    last_modified: Option<SystemTime>,
}

impl ConfigWatcher {
    /// Starts watching `path`, taking its current mtime as the baseline.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified(&path);
        Self { path, last_modified }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses the file as it is now, without touching the baseline.
    ///
    /// Loading through a watcher created first means any edit racing the
    /// initial load is still seen by the next `reload`.
    pub fn load(&self) -> Result<AdjacencyMatrix, ConfigError> {
        matrix::load(&self.path)
    }

    /// Returns true if the mtime differs from the last observation, and
    /// records the new value.
    pub fn poll_changed(&mut self) -> bool {
        let current = modified(&self.path);
        if current == self.last_modified {
            return false;
        }
        self.last_modified = current;
        true
    }

    /// Reparses the file if it changed since the last poll.
    ///
    /// * `None` - unchanged
    /// * `Some(Ok(m))` - changed and parsed into a matrix of `expected_size` nodes
    /// * `Some(Err(e))` - changed but unusable; the caller keeps its matrix
    pub fn reload(&mut self, expected_size: usize) -> Option<Result<AdjacencyMatrix, ConfigError>> {
        if !self.poll_changed() {
            return None;
        }
        Some(self.load().and_then(|m| {
            if m.size() == expected_size {
                Ok(m)
            } else {
                Err(ConfigError::SizeMismatch {
                    expected: expected_size,
                    found: m.size(),
                })
            }
        }))
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, OpenOptions};
    use std::io::Write;
    use std::time::Duration;

    /// Rewrites the file and pushes its mtime forward so the change is
    /// visible even on coarse-grained filesystems.
    fn rewrite(path: &Path, text: &str, bump: u64) {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        let mtime = SystemTime::now() + Duration::from_secs(bump);
        file.set_modified(mtime).unwrap();
    }

    #[test]
    fn test_unchanged_file_not_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.conf");
        std::fs::write(&path, "10 5\n7\n").unwrap();

        let mut watcher = ConfigWatcher::new(&path);
        assert!(!watcher.poll_changed());
        assert!(watcher.reload(3).is_none());
    }

    #[test]
    fn test_touched_file_reloaded_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.conf");
        std::fs::write(&path, "10 5\n7\n").unwrap();
        let mut watcher = ConfigWatcher::new(&path);

        rewrite(&path, "1 2\n3\n", 10);
        let matrix = watcher.reload(3).unwrap().unwrap();
        assert_eq!(matrix.cost(0, 1), Some(1));

        // Second poll sees the same mtime
        assert!(watcher.reload(3).is_none());
    }

    #[test]
    fn test_bad_reload_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.conf");
        std::fs::write(&path, "10 5\n7\n").unwrap();
        let mut watcher = ConfigWatcher::new(&path);

        rewrite(&path, "10 five\n7\n", 10);
        assert!(matches!(watcher.reload(3), Some(Err(ConfigError::InvalidToken { .. }))));

        rewrite(&path, "1\n", 20);
        assert!(matches!(
            watcher.reload(3),
            Some(Err(ConfigError::SizeMismatch { expected: 3, found: 2 }))
        ));
    }

    #[test]
    fn test_edit_after_baseline_not_missed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.conf");
        std::fs::write(&path, "10 5\n7\n").unwrap();

        let mut watcher = ConfigWatcher::new(&path);
        assert_eq!(watcher.path(), path.as_path());

        // The edit lands between taking the baseline and the initial load
        rewrite(&path, "1 2\n3\n", 10);
        let initial = watcher.load().unwrap();
        assert_eq!(initial.cost(0, 1), Some(1));

        let reloaded = watcher.reload(3).unwrap().unwrap();
        assert_eq!(reloaded, initial);
    }

    #[test]
    fn test_deleted_file_counts_as_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("topology.conf");
        File::create(&path).unwrap();
        let mut watcher = ConfigWatcher::new(&path);

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(watcher.reload(3), Some(Err(ConfigError::Io(_)))));
        assert!(watcher.reload(3).is_none());
    }
}
