//!
//! Advisory run locks that keep two runs of the same job from overlapping.
//!
use crate::Result;
use fs2::FileExt;
use std::path::{Path, PathBuf};

/// Creates named, non-blocking file locks in a directory
#[derive(Clone, Debug)]
pub struct RunLock {
    dir: PathBuf,
}

impl RunLock {
    /// Locks are created as `<dir>/<name>.lock`
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Try to take the lock called `name`.
    ///
    /// Returns `Ok(None)` if another process (or another guard in this process) holds it.
    pub fn try_acquire(&self, name: &str) -> Result<Option<LockGuard>> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{name}.lock"));
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!("Acquired lock {}", path.display());
                Ok(Some(LockGuard { file, path }))
            }
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    err.kind() == std::io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Held lock, released when dropped
#[derive(Debug)]
pub struct LockGuard {
    file: std::fs::File,
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("Released lock {}", self.path.display());
        }
    }
}
