//! Single-instance guard backed by a pid lock file.
use nix::{errno::Errno, sys::signal, unistd::Pid};
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::error::LockError;

/// Holds the lock file for the lifetime of the monitor. The file is removed on
/// [`LockGuard::release`] or when the guard is dropped.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    owned: bool,
}

impl LockGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Attempts to take the lock. Returns `Ok(false)` when another live
    /// process holds it. A lock left behind by a dead process is reclaimed once.
    pub fn acquire(&mut self) -> Result<bool, LockError> {
        if self.owned {
            return Ok(true);
        }
        self.try_acquire(true)
    }

    fn try_acquire(&mut self, reclaim_stale: bool) -> Result<bool, LockError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                write!(file, "{}", std::process::id())?;
                file.flush()?;
                self.owned = true;
                debug!("Acquired lock {:?}", self.path);
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                let holder = read_lock_pid(&self.path);
                if let Some(pid) = holder
                    && process_exists(pid)
                {
                    debug!("Lock {:?} held by live process {pid}", self.path);
                    return Ok(false);
                }

                if !reclaim_stale {
                    warn!(
                        "Lock {:?} reappeared while reclaiming a stale lock",
                        self.path
                    );
                    return Ok(false);
                }

                match holder {
                    Some(pid) => info!(
                        "Removing stale lock {:?} left by dead process {pid}",
                        self.path
                    ),
                    None => info!("Removing unreadable lock {:?}", self.path),
                }

                match fs::remove_file(&self.path) {
                    Ok(()) => {}
                    Err(err) if err.kind() == ErrorKind::NotFound => {}
                    Err(source) => {
                        return Err(LockError::StaleRemoval {
                            path: self.path.clone(),
                            source,
                        });
                    }
                }

                self.try_acquire(false)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the lock file if this guard owns it. Safe to call repeatedly.
    pub fn release(&mut self) {
        if !self.owned {
            return;
        }
        self.owned = false;

        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Released lock {:?}", self.path),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => warn!("Failed to remove lock file {:?}: {err}", self.path),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Reads the pid recorded in a lock file.
pub fn read_lock_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path)
        .ok()
        .and_then(|contents| contents.trim().parse::<i32>().ok())
        .filter(|pid| *pid > 0)
}

/// Returns whether a process with `pid` currently exists.
pub fn process_exists(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    match signal::kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
