//! Error types for stacksync
//!
//! Uses `thiserror` for library errors. The taxonomy distinguishes
//! per-flow recoverable conditions (missing physical resource, no remote
//! counterpart, infra-sync-required) from run-fatal ones: a recoverable
//! failure abandons one flow's branch of the dependency graph, anything
//! else aborts the whole run.

use std::path::PathBuf;
use thiserror::Error;

use crate::provider::ProviderError;

/// Result type alias for stacksync operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Main error type for stacksync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// The physical-ID mapping has no entry for a logical ID the flow needs.
    /// Usually means the remote stack is out of sync with the template.
    #[error("no deployed resource found for '{logical_id}' - the stack may be out of sync, run a full deploy")]
    MissingPhysicalResource { logical_id: String },

    /// The remote side has no counterpart to update (e.g. a layer with no
    /// published versions yet)
    #[error("no remote counterpart found for '{resource_id}' - run a full deploy first")]
    NoRemoteCounterpart { resource_id: String },

    /// A flow declared remote API calls but was executed without locks.
    /// This is a programming-contract violation, always fatal.
    #[error("sync flow '{flow}' has no locks bound for its declared API calls")]
    MissingLock { flow: String },

    /// The local change cannot be applied incrementally and requires a full
    /// infrastructure deploy
    #[error("'{resource_id}' cannot be synced incrementally ({reason}) - run a full deploy")]
    InfraSyncRequired { resource_id: String, reason: String },

    /// A required build artifact was not found during local gathering
    #[error("build artifact for '{resource_id}' not found at {path}")]
    ArtifactNotFound { resource_id: String, path: PathBuf },

    /// A resource definition required by a flow was not found
    #[error("no resource definition found for '{resource_id}'")]
    DefinitionNotFound { resource_id: String },

    /// The root stack has never been deployed (first-ever sync)
    #[error("stack '{stack_name}' does not exist - run a full deploy first")]
    StackNotFound { stack_name: String },

    /// Remote service call failure
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Sync state load/save error
    #[error("sync state error: {0}")]
    State(String),
}

impl SyncError {
    /// Whether this error is recoverable at the run level.
    ///
    /// Recoverable errors are logged and the offending flow's branch of the
    /// dependency graph is abandoned; the rest of the run continues. All
    /// other errors abort the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::MissingPhysicalResource { .. }
                | SyncError::NoRemoteCounterpart { .. }
                | SyncError::InfraSyncRequired { .. }
        )
    }
}

/// An error raised inside a flow's execution, wrapped with the flow's
/// log name so diagnostics can always name the resource
#[derive(Error, Debug)]
#[error("sync flow '{flow}' failed: {source}")]
pub struct FlowError {
    pub flow: String,
    #[source]
    pub source: SyncError,
}

impl FlowError {
    pub fn new(flow: impl Into<String>, source: SyncError) -> Self {
        Self {
            flow: flow.into(),
            source,
        }
    }
}
