//! Lock creation and distribution
//!
//! The distributor owns the key→lock table. It is constructed once per run
//! and passed by handle to the executor and to every flow; there is no
//! ambient global lock state.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::{LockChain, ResourceLock};

/// Which concurrency backend newly created locks use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockBackend {
    /// Plain mutexes; sufficient when all flows run in one process
    InProcess,
    /// Advisory file locks under the given directory; safe across OS
    /// processes sharing a project
    CrossProcess { dir: PathBuf },
}

/// Creates and hands out named locks, one per key.
///
/// `get_lock` returns the same lock for the same key for the lifetime of the
/// distributor; the internal table is the only mutable shared structure and
/// is guarded by its own mutex.
pub struct LockDistributor {
    backend: LockBackend,
    locks: Mutex<HashMap<String, Arc<ResourceLock>>>,
}

impl LockDistributor {
    pub fn new(backend: LockBackend) -> Self {
        Self {
            backend,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn in_process() -> Self {
        Self::new(LockBackend::InProcess)
    }

    pub fn cross_process(dir: impl Into<PathBuf>) -> Self {
        Self::new(LockBackend::CrossProcess { dir: dir.into() })
    }

    /// The lock for `key`, created on first use
    pub fn get_lock(&self, key: &str) -> Arc<ResourceLock> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = locks.get(key) {
            return Arc::clone(existing);
        }
        let lock = Arc::new(match &self.backend {
            LockBackend::InProcess => ResourceLock::in_process(),
            LockBackend::CrossProcess { dir } => ResourceLock::file(dir, key),
        });
        locks.insert(key.to_string(), Arc::clone(&lock));
        lock
    }

    /// Locks for a whole key set, keyed and sorted by key
    pub fn get_locks(&self, keys: &BTreeSet<String>) -> BTreeMap<String, Arc<ResourceLock>> {
        keys.iter()
            .map(|key| (key.clone(), self.get_lock(key)))
            .collect()
    }

    /// An ordered chain over the locks for `keys`
    pub fn get_lock_chain(&self, keys: &BTreeSet<String>) -> LockChain {
        LockChain::new(self.get_locks(keys))
    }
}
