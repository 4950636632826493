//! File-based locking for the snapshot root.
//!
//! A run is a check-then-act over the snapshot tree (pending check + write),
//! so overlapping invocations must be excluded. fs2 advisory lock at
//! <out_dir>/LOCK; a second invocation fails fast instead of blocking.
//! Released on Drop.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use crate::consts::LOCK_FILE;

pub struct LockGuard {
    file: std::fs::File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // fs2 unlock errors on drop are ignored deliberately.
        let _ = self.file.unlock();
    }
}

/// Try to take the exclusive run lock. Errors if another run holds it.
pub fn try_acquire_exclusive(out_dir: &Path) -> Result<LockGuard> {
    let path = out_dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("open lock file {}", path.display()))?;
    file.try_lock_exclusive()
        .with_context(|| format!("another run holds the lock {}", path.display()))?;
    Ok(LockGuard { file, path })
}
