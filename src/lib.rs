//! StackSync - incremental synchronization engine for deployed stacks
//!
//! StackSync pushes local changes to the resources of an already-deployed
//! application without a full infrastructure deployment: code updates for
//! functions, new layer versions, API and state machine definitions. Each
//! changed resource runs as a sync flow; flows execute concurrently on a
//! worker pool, conflicting remote calls are serialized through lock
//! chains, and unchanged resources are skipped by comparing local and
//! remote content fingerprints.

pub mod context;
pub mod error;
pub mod executor;
pub mod flows;
pub mod hash;
pub mod locks;
pub mod physical;
pub mod provider;
pub mod state;
pub mod template;

// Re-exports for convenience
pub use context::SyncContext;
pub use error::{FlowError, SyncError, SyncResult};
pub use executor::{
    default_exception_handler, ContinuousSyncFlowExecutor, StopHandle, SyncFlowExecutor,
};
pub use flows::{execute_flow, FlowId, FlowOutcome, SyncFlow, SyncFlowFactory};
pub use locks::{LockChain, LockDistributor};
pub use physical::build_physical_id_mapping;
pub use provider::CloudClients;
pub use state::{InMemorySyncState, SyncStateRepository, TomlSyncState};
pub use template::{PackageType, ResourceDefinition, ResourceId, ResourceType};
