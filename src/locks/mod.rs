//! Named mutual-exclusion locks for remote mutations
//!
//! Two flows that would issue conflicting API calls on the same remote
//! resource share a lock key and therefore a lock; flows touching unrelated
//! resources never share a key and run fully in parallel.
//!
//! Locks come in two backends behind one interface: an in-process mutex,
//! and a cross-process advisory file lock for when two CLI invocations share
//! a project. Callers never branch on which backend is active.

mod chain;
mod distributor;

pub use chain::{LockChain, LockChainGuard};
pub use distributor::{LockBackend, LockDistributor};

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;

use crate::error::SyncResult;

/// A single named lock, backed by either an in-process mutex or an
/// exclusive file lock
#[derive(Debug)]
pub enum ResourceLock {
    InProcess(Mutex<()>),
    File(PathBuf),
}

impl ResourceLock {
    pub(crate) fn in_process() -> Self {
        Self::InProcess(Mutex::new(()))
    }

    pub(crate) fn file(dir: &Path, key: &str) -> Self {
        // Keys are "{logical_id}_{api_call}" strings; sanitize the path
        // separator that nested-stack IDs carry.
        let name: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '-' } else { c })
            .collect();
        Self::File(dir.join(format!("{name}.lock")))
    }

    /// Block until the lock is held; the returned guard releases on drop
    pub fn acquire(&self) -> SyncResult<LockGuard<'_>> {
        match self {
            Self::InProcess(mutex) => {
                // A poisoned lock only means a worker panicked while holding
                // it; the protected section is a remote call with no local
                // state to corrupt.
                let guard = mutex.lock().unwrap_or_else(|e| e.into_inner());
                Ok(LockGuard::InProcess(guard))
            }
            Self::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .truncate(false)
                    .read(true)
                    .write(true)
                    .open(path)?;
                file.lock_exclusive()?;
                Ok(LockGuard::File(file))
            }
        }
    }
}

/// RAII guard for a held [`ResourceLock`]
#[derive(Debug)]
pub enum LockGuard<'a> {
    InProcess(MutexGuard<'a, ()>),
    File(File),
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let LockGuard::File(file) = self {
            let _ = fs2::FileExt::unlock(file);
        }
    }
}
