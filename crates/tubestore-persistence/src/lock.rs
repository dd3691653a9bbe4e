//! Cross-process advisory lock on a sidecar file.
//!
//! The lock only excludes other cooperating processes. Threads inside one
//! process are serialized by the store's in-memory lock instead.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// Default polling interval between lock attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An exclusive lock held on a sidecar file.
///
/// Released on [`release`](Self::release) or drop. Releasing removes the file.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    file: Option<File>,
}

impl FileLock {
    /// Acquires the lock with the default poll interval.
    pub fn acquire(path: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        Self::acquire_with_interval(path, timeout, DEFAULT_POLL_INTERVAL)
    }

    /// Polls for an exclusive lock on `path` until it succeeds or `timeout` elapses.
    ///
    /// The file is created if absent. On timeout no handle is kept open.
    pub fn acquire_with_interval(
        path: impl Into<PathBuf>,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self> {
        let path = path.into();
        let started = Instant::now();

        loop {
            let file = open_lock_file(&path)?;
            match file.try_lock() {
                // A releasing holder may have unlinked the file between our open and lock.
                Ok(()) if is_current_file(&file, &path) => {
                    let mut lock = Self {
                        path,
                        file: Some(file),
                    };
                    lock.write_owner();
                    debug!(path = %lock.path.display(), elapsed = ?started.elapsed(), "Acquired file lock");
                    return Ok(lock);
                }
                Ok(()) => drop(file),
                Err(TryLockError::WouldBlock) => drop(file),
                Err(TryLockError::Error(source)) => {
                    return Err(StoreError::LockError { path, source });
                }
            }

            if started.elapsed() >= timeout {
                return Err(StoreError::LockTimeout { path, timeout });
            }
            thread::sleep(poll_interval);
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True while the lock is held.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Unlocks and removes the lock file. Releasing twice is a no-op.
    pub fn release(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };

        // Remove while still locked so no waiter can lock the stale inode and keep it.
        let removed = fs::remove_file(&self.path);
        let unlocked = file.unlock();
        drop(file);

        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                warn!(path = %self.path.display(), error = %source, "Failed to remove lock file");
            }
        }

        unlocked.map_err(|source| StoreError::LockError {
            path: self.path.clone(),
            source,
        })?;
        debug!(path = %self.path.display(), "Released file lock");
        Ok(())
    }

    /// Records the owning process in the lock file. Diagnostic only.
    fn write_owner(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let result = file
                .set_len(0)
                .and_then(|()| writeln!(file, "{}", std::process::id()));
            if let Err(e) = result {
                debug!(path = %self.path.display(), error = %e, "Could not record lock owner");
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(path = %self.path.display(), error = %e, "Failed to release file lock");
        }
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|source| StoreError::LockError {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(unix)]
fn is_current_file(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(on_disk)) => held.dev() == on_disk.dev() && held.ino() == on_disk.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn is_current_file(_file: &File, path: &Path) -> bool {
    path.exists()
}
