//! Ordered lock bundles
//!
//! A `LockChain` acquires a set of locks as one unit, always in sorted key
//! order regardless of which flow requested them. That global ordering is
//! the sole deadlock-avoidance mechanism among flows sharing multiple
//! resources.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::SyncResult;

use super::{LockGuard, ResourceLock};

/// An ordered set of locks, acquired and released together
pub struct LockChain {
    /// Sorted by key; acquisition follows this order
    locks: Vec<(String, Arc<ResourceLock>)>,
}

impl LockChain {
    /// Build a chain from a key→lock map; `BTreeMap` iteration gives the
    /// sorted order the chain relies on
    pub fn new(locks: BTreeMap<String, Arc<ResourceLock>>) -> Self {
        Self {
            locks: locks.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// The keys in acquisition order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.locks.iter().map(|(key, _)| key.as_str())
    }

    /// Acquire every lock in the chain, in key order.
    ///
    /// The returned guard releases all locks when dropped, on every exit
    /// path including panics and early returns.
    pub fn acquire(&self) -> SyncResult<LockChainGuard<'_>> {
        let mut guards = Vec::with_capacity(self.locks.len());
        for (key, lock) in &self.locks {
            log::trace!("acquiring lock '{key}'");
            guards.push(lock.acquire()?);
        }
        Ok(LockChainGuard { guards })
    }

    /// Run `f` with the whole chain held
    pub fn with_held<T>(&self, f: impl FnOnce() -> SyncResult<T>) -> SyncResult<T> {
        let _guard = self.acquire()?;
        f()
    }
}

/// RAII guard holding every lock of a [`LockChain`]
pub struct LockChainGuard<'a> {
    guards: Vec<LockGuard<'a>>,
}

impl Drop for LockChainGuard<'_> {
    fn drop(&mut self) {
        // Release in reverse acquisition order
        while self.guards.pop().is_some() {}
    }
}
