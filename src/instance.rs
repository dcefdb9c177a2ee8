//! Single-instance guard.
//!
//! An exclusive advisory lock on a file in the data directory. The OS drops
//! the lock when the process exits, so a crashed agent never leaves a stale
//! guard behind.

use std::fs::{File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("Another instance is already running (lock held on {})", .0.display())]
    AlreadyRunning(PathBuf),
    #[error("Could not open lock file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held for the lifetime of the agent process.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock at `path`, creating the file if needed.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, InstanceError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source| InstanceError::Io {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(io_err)?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(InstanceError::AlreadyRunning(path.clone()))
            }
            Err(TryLockError::Error(e)) => return Err(io_err(e)),
        }

        // Informational only; the lock is what matters.
        file.set_len(0).map_err(io_err)?;
        write!(file, "{}", std::process::id()).map_err(io_err)?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.lock");

        let first = InstanceLock::acquire(&path).unwrap();
        assert_eq!(first.path(), path.as_path());
        match InstanceLock::acquire(&path) {
            Err(InstanceError::AlreadyRunning(p)) => assert_eq!(p, path),
            other => panic!("expected AlreadyRunning, got {other:?}"),
        }
    }

    #[test]
    fn test_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("agent.lock");

        drop(InstanceLock::acquire(&path).unwrap());
        let again = InstanceLock::acquire(&path).unwrap();
        let pid = std::fs::read_to_string(again.path()).unwrap();
        assert_eq!(pid, std::process::id().to_string());
    }
}
