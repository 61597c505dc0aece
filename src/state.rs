//! Persisted sync state
//!
//! Stores the last-synced content fingerprint per flow identity, letting a
//! flow skip all work (including the remote comparison call) when nothing
//! changed locally since the previous run.
//!
//! The storage format belongs to this crate's TOML implementation only; the
//! engine itself depends on the `SyncStateRepository` trait.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Identity→fingerprint store consulted before any remote work
pub trait SyncStateRepository: Send + Sync {
    /// The fingerprint recorded for `key` by a previous run, if any
    fn stored_hash(&self, key: &str) -> Option<String>;

    /// Record `hash` as the last-synced fingerprint for `key`
    fn record_hash(&self, key: &str, hash: &str) -> SyncResult<()>;
}

/// Volatile store; the default for watch sessions that only need
/// change-detection within one process lifetime
#[derive(Default)]
pub struct InMemorySyncState {
    hashes: Mutex<HashMap<String, String>>,
}

impl InMemorySyncState {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncStateRepository for InMemorySyncState {
    fn stored_hash(&self, key: &str) -> Option<String> {
        let hashes = self.hashes.lock().unwrap_or_else(|e| e.into_inner());
        hashes.get(key).cloned()
    }

    fn record_hash(&self, key: &str, hash: &str) -> SyncResult<()> {
        let mut hashes = self.hashes.lock().unwrap_or_else(|e| e.into_inner());
        hashes.insert(key.to_string(), hash.to_string());
        Ok(())
    }
}

const STATE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct TomlState {
    version: u32,
    #[serde(default)]
    hashes: HashMap<String, String>,
}

/// TOML-file-backed store, shared between CLI invocations of the same
/// project. Saves take an exclusive file lock so concurrent invocations
/// cannot interleave partial writes.
#[derive(Debug)]
pub struct TomlSyncState {
    path: PathBuf,
    hashes: Mutex<HashMap<String, String>>,
}

impl TomlSyncState {
    /// Load the state file, or start empty if it does not exist yet
    pub fn load_or_new(path: impl Into<PathBuf>) -> SyncResult<Self> {
        let path = path.into();
        let hashes = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let state: TomlState =
                toml::from_str(&content).map_err(|e| SyncError::State(e.to_string()))?;
            state.hashes
        } else {
            HashMap::new()
        };
        Ok(Self {
            path,
            hashes: Mutex::new(hashes),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn save(&self, hashes: &HashMap<String, String>) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock_file.lock_exclusive()?;

        let state = TomlState {
            version: STATE_VERSION,
            hashes: hashes.clone(),
        };
        let content = toml::to_string_pretty(&state).map_err(|e| SyncError::State(e.to_string()))?;
        let result = fs::write(&self.path, content);

        let _ = fs2::FileExt::unlock(&lock_file);
        result?;
        Ok(())
    }
}

impl SyncStateRepository for TomlSyncState {
    fn stored_hash(&self, key: &str) -> Option<String> {
        let hashes = self.hashes.lock().unwrap_or_else(|e| e.into_inner());
        hashes.get(key).cloned()
    }

    fn record_hash(&self, key: &str, hash: &str) -> SyncResult<()> {
        let mut hashes = self.hashes.lock().unwrap_or_else(|e| e.into_inner());
        hashes.insert(key.to_string(), hash.to_string());
        self.save(&hashes)
    }
}
