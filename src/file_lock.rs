//! Advisory locking for dataset write-exclusion (spec §4.10, §5).
//!
//! A dataset's `lock` file is held exclusively for the duration of a
//! writer transaction or a maintenance pass; a `try_*` variant is used
//! so callers can surface `IndexBusy` instead of blocking forever.

use std::{fs, path::Path};

use fs2::FileExt;

use crate::err_at;
use crate::error::Result;

pub struct FileLock {
    file: fs::File,
}

impl FileLock {
    /// Open (creating if needed) the lock file at `path` without
    /// acquiring it yet.
    pub fn open(path: &Path) -> Result<FileLock> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(FileLock { file })
    }

    /// Block until the exclusive lock is acquired. Used by a single
    /// writer/maintenance pass that owns the dataset for its duration.
    pub fn lock_exclusive(&self) -> Result<()> {
        match self.file.lock_exclusive() {
            Ok(()) => Ok(()),
            Err(err) => err_at!(IndexBusy, Err(err)),
        }
    }

    /// Non-blocking exclusive lock; returns `IndexBusy` if another
    /// writer or maintenance pass holds it.
    pub fn try_lock_exclusive(&self) -> Result<()> {
        match self.file.try_lock_exclusive() {
            Ok(()) => Ok(()),
            Err(_) => err_at!(IndexBusy, "dataset lock held by another process"),
        }
    }

    /// Shared lock, used by readers that only need to exclude a
    /// concurrent repack from truncating a segment out from under them.
    pub fn try_lock_shared(&self) -> Result<()> {
        match self.file.try_lock_shared() {
            Ok(()) => Ok(()),
            Err(_) => err_at!(IndexBusy, "segment locked exclusively for repack"),
        }
    }

    pub fn unlock(&self) -> Result<()> {
        self.file.unlock()?;
        Ok(())
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // best-effort, mirrors the teacher's rollback_nothrow() destructor
        // discipline: never panic or propagate from a Drop impl.
        self.file.unlock().ok();
    }
}
