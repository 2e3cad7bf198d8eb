//! Cross-process advisory locking for the on-disk store.
//!
//! One exclusive writer OR any number of concurrent readers may hold the
//! lock on a store directory at a time. The lock is an OS-level advisory
//! file lock (`flock`) so the guarantee holds across independent processes,
//! not just threads. The guard releases the lock on every exit path.

use crate::errors::{EnvError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Name of the lock file inside the store marker directory.
pub const LOCK_FILE_NAME: &str = "store.lock";

/// Whether the handle needs exclusive (write) or shared (read) access.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LockKind {
    Exclusive,
    Shared,
}

/// How long an acquisition attempt is willing to wait for a contended lock.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockWait {
    /// Block until the current holder releases.
    Block,
    /// Fail immediately with `LockHeld` if the lock is contended.
    NoWait,
    /// Retry for at most the given number of milliseconds, then fail
    /// with `LockTimeout`.
    TimeoutMs(u64),
}

impl Default for LockWait {
    fn default() -> Self {
        LockWait::Block
    }
}

/// RAII guard over the store lock file. Dropping the guard releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
    kind: LockKind,
}

impl LockGuard {
    /// Acquires the store lock under `dir` (the marker directory).
    ///
    /// The lock file is created on first use. Readers and writers share one
    /// lock file so exclusion is symmetric across processes.
    pub fn acquire(dir: &Path, kind: LockKind, wait: LockWait) -> Result<Self> {
        let path = dir.join(LOCK_FILE_NAME);
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        lock_file(&file, &path, kind, wait)?;
        debug!(path = %path.display(), ?kind, "acquired store lock");
        Ok(Self { file, path, kind })
    }

    pub fn kind(&self) -> LockKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        unlock_file(&self.file);
        debug!(path = %self.path.display(), "released store lock");
    }
}

#[cfg(unix)]
fn lock_file(file: &File, path: &Path, kind: LockKind, wait: LockWait) -> Result<()> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let op = match kind {
        LockKind::Exclusive => libc::LOCK_EX,
        LockKind::Shared => libc::LOCK_SH,
    };

    match wait {
        LockWait::Block => loop {
            let rc = unsafe { libc::flock(fd, op) };
            if rc == 0 {
                return Ok(());
            }
            let err = std::io::Error::last_os_error();
            // flock can be interrupted by signals; everything else is fatal
            if err.kind() != std::io::ErrorKind::Interrupted {
                return Err(EnvError::Io(err));
            }
        },
        LockWait::NoWait => {
            let rc = unsafe { libc::flock(fd, op | libc::LOCK_NB) };
            if rc == 0 {
                return Ok(());
            }
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                return Err(EnvError::LockHeld {
                    path: path.to_path_buf(),
                });
            }
            Err(EnvError::Io(err))
        }
        LockWait::TimeoutMs(ms) => {
            let deadline = Instant::now() + Duration::from_millis(ms);
            loop {
                let rc = unsafe { libc::flock(fd, op | libc::LOCK_NB) };
                if rc == 0 {
                    return Ok(());
                }
                let err = std::io::Error::last_os_error();
                if err.kind() != std::io::ErrorKind::WouldBlock
                    && err.kind() != std::io::ErrorKind::Interrupted
                {
                    return Err(EnvError::Io(err));
                }
                if Instant::now() >= deadline {
                    return Err(EnvError::LockTimeout {
                        path: path.to_path_buf(),
                        waited_ms: ms,
                    });
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
}

#[cfg(unix)]
fn unlock_file(file: &File) {
    use std::os::unix::io::AsRawFd;
    // Best-effort unlock; close() releases the lock anyway
    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn lock_file(_file: &File, _path: &Path, _kind: LockKind, _wait: LockWait) -> Result<()> {
    // Windows fallback: no advisory locking (Windows uses different locking APIs)
    Ok(())
}

#[cfg(not(unix))]
fn unlock_file(_file: &File) {}
