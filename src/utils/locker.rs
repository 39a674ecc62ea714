//! File-based locking to prevent concurrent runs of the same target

use anyhow::{Context, Result};
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lock file for one target
///
/// Open it, then hold the guard from [`TargetLock::try_acquire`] for the
/// duration of the run.
pub struct TargetLock {
    lock: RwLock<File>,
    lock_path: PathBuf,
}

impl TargetLock {
    /// Open (or create) the lock file for `target` inside `lock_dir`
    pub fn open(lock_dir: &Path, target: &str) -> Result<Self> {
        let lock_path = Self::lock_path(lock_dir, target);

        debug!("Opening lock file: {:?}", lock_path);

        std::fs::create_dir_all(lock_dir)
            .context("Failed to create lock directory")?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .context(format!("Failed to open lock file: {:?}", lock_path))?;

        Ok(Self {
            lock: RwLock::new(file),
            lock_path,
        })
    }

    /// Take the exclusive lock without waiting
    ///
    /// Fails if another process is running the same target.
    pub fn try_acquire(&mut self) -> Result<TargetLockGuard<'_>> {
        let guard = self
            .lock
            .try_write()
            .context(format!("Target is already running (lock held: {:?})", self.lock_path))?;

        info!("Acquired lock: {:?}", self.lock_path);

        Ok(TargetLockGuard {
            _guard: guard,
            lock_path: self.lock_path.clone(),
        })
    }

    /// Lock file path for a target
    pub fn lock_path(lock_dir: &Path, target: &str) -> PathBuf {
        lock_dir.join(format!("autobackup-{}.lock", target))
    }

    /// Get the lock file path (for cleanup or inspection)
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

/// Held lock, released on drop
///
/// The lock file stays on disk: every process must lock the same inode.
pub struct TargetLockGuard<'a> {
    _guard: RwLockWriteGuard<'a, File>,
    lock_path: PathBuf,
}

impl Drop for TargetLockGuard<'_> {
    fn drop(&mut self) {
        info!("Released lock: {:?}", self.lock_path);
    }
}
