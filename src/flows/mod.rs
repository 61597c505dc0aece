//! Sync flows
//!
//! A sync flow is the unit of synchronization work for exactly one logical
//! resource (or a tightly coupled composite). Each flow runs a fixed state
//! machine: set up → gather local resources → compare against stored state →
//! compare against the remote → mutate → record the new fingerprint →
//! expand dependencies. All remote mutation is confined to `sync()` and runs
//! inside the flow's lock chain.

mod factory;
mod function;
mod http_api;
mod layer;
mod rest_api;
mod state_machine;

pub use factory::SyncFlowFactory;
pub use function::{ImageFunctionSyncFlow, ZipFunctionSyncFlow};
pub use http_api::HttpApiSyncFlow;
pub use layer::{FunctionLayerReferenceSyncFlow, LayerSyncFlow};
pub use rest_api::RestApiSyncFlow;
pub use state_machine::StateMachineSyncFlow;

use std::collections::BTreeSet;
use std::fmt;

use crate::context::SyncContext;
use crate::error::{FlowError, SyncError, SyncResult};
use crate::locks::LockChain;
use crate::template::ResourceId;

/// Kind of remote API call a flow will issue.
///
/// Two calls of conflicting kinds on the same resource (e.g. a code update
/// and a configuration update, which the cloud side cannot run
/// concurrently) must map to the same lock key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiCallKind {
    UpdateCode,
    UpdateConfig,
    PublishVersion,
    UpdateDefinition,
}

impl fmt::Display for ApiCallKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UpdateCode => "update_code",
            Self::UpdateConfig => "update_config",
            Self::PublishVersion => "publish_version",
            Self::UpdateDefinition => "update_definition",
        };
        f.write_str(name)
    }
}

/// Lock key for one call kind on one resource
pub fn lock_key(logical_id: &ResourceId, kind: ApiCallKind) -> String {
    format!("{logical_id}_{kind}")
}

/// Declares which remote verbs a flow will invoke on a shared resource.
///
/// Used solely to derive lock keys; never executed directly.
#[derive(Debug, Clone)]
pub struct ResourceApiCall {
    pub logical_id: ResourceId,
    pub calls: Vec<ApiCallKind>,
}

impl ResourceApiCall {
    pub fn new(logical_id: impl Into<ResourceId>, calls: Vec<ApiCallKind>) -> Self {
        Self {
            logical_id: logical_id.into(),
            calls,
        }
    }

    pub fn lock_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.calls
            .iter()
            .map(|kind| lock_key(&self.logical_id, *kind))
    }
}

/// Flow identity used for work-queue deduplication.
///
/// Two flows with equal IDs collapse into one queued flow. Flows whose
/// effect depends on a remote version (layer reference updates) carry the
/// version so updates to different versions stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowId {
    pub kind: &'static str,
    pub resource_id: ResourceId,
    pub version: Option<u64>,
}

impl FlowId {
    pub fn new(kind: &'static str, resource_id: impl Into<ResourceId>) -> Self {
        Self {
            kind,
            resource_id: resource_id.into(),
            version: None,
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Key under which this flow's fingerprint is persisted
    pub fn state_key(&self) -> String {
        format!("{}:{}", self.kind, self.resource_id)
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(version) => write!(f, "{} {} v{version}", self.kind, self.resource_id),
            None => write!(f, "{} {}", self.kind, self.resource_id),
        }
    }
}

/// How a flow's execution ended
pub enum FlowOutcome {
    /// The remote resource was mutated; dependents may follow
    Synced { dependents: Vec<Box<dyn SyncFlow>> },
    /// Stored fingerprint matched the fresh local one; nothing to do
    SkippedLocal,
    /// The remote content already matches the local artifact
    SkippedRemote,
}

impl FlowOutcome {
    pub fn was_synced(&self) -> bool {
        matches!(self, FlowOutcome::Synced { .. })
    }
}

impl fmt::Debug for FlowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced { dependents } => f
                .debug_struct("Synced")
                .field("dependents", &dependents.len())
                .finish(),
            Self::SkippedLocal => f.write_str("SkippedLocal"),
            Self::SkippedRemote => f.write_str("SkippedRemote"),
        }
    }
}

/// A unit of synchronization work for one logical resource.
///
/// Implementations confine all remote mutation to `sync()`; every other
/// method is observation or local computation. Failures in
/// `gather_resources` are fatal to the flow only; the executor decides at
/// run level what a failure means (see `SyncError::is_recoverable`).
pub trait SyncFlow: Send {
    /// Identity for deduplication and state storage
    fn flow_id(&self) -> FlowId;

    /// Human-readable name used in logs and error messages
    fn log_name(&self) -> String {
        self.flow_id().to_string()
    }

    /// Static declaration of the remote verbs this flow will invoke,
    /// used solely to derive lock keys
    fn resource_api_calls(&self) -> Vec<ResourceApiCall>;

    /// Acquire expensive handles (service clients). No remote side effects.
    fn set_up(&mut self, _ctx: &SyncContext) -> SyncResult<()> {
        Ok(())
    }

    /// Purely local work: resolve definitions, fingerprint artifacts.
    /// Must populate `local_sha` where the flow has a local fingerprint.
    fn gather_resources(&mut self, ctx: &SyncContext) -> SyncResult<()>;

    /// The freshly computed local fingerprint, if this flow has one
    fn local_sha(&self) -> Option<&str>;

    /// Whether the remote content already matches `local_sha`.
    ///
    /// Defaults to false for resource kinds with no cheap remote
    /// fingerprint; those rely solely on the stored local state.
    fn compare_remote(&self, _ctx: &SyncContext) -> SyncResult<bool> {
        Ok(false)
    }

    /// Perform the remote mutation(s) and wait for the remote side to reach
    /// a stable state. Runs inside the flow's lock chain.
    fn sync(&mut self, ctx: &SyncContext) -> SyncResult<()>;

    /// Flows that must run because of this flow's mutation. Only invoked
    /// after a successful, non-skipped `sync()`.
    fn gather_dependencies(&self, _ctx: &SyncContext) -> SyncResult<Vec<Box<dyn SyncFlow>>> {
        Ok(Vec::new())
    }
}

impl fmt::Debug for dyn SyncFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncFlow")
            .field("flow_id", &self.flow_id())
            .finish()
    }
}

/// All lock keys a flow needs, derived from its declared API calls
pub fn flow_lock_keys(flow: &dyn SyncFlow) -> BTreeSet<String> {
    flow.resource_api_calls()
        .iter()
        .flat_map(|call| call.lock_keys())
        .collect()
}

/// Drive one flow through its state machine.
///
/// `locks` must be `Some` whenever the flow declares API calls; executing
/// without them is a contract violation (`SyncError::MissingLock`). The
/// chain is held only around `sync()` - never during local gathering.
pub fn execute_flow(
    flow: &mut dyn SyncFlow,
    ctx: &SyncContext,
    locks: Option<&LockChain>,
) -> Result<FlowOutcome, FlowError> {
    let log_name = flow.log_name();
    run_states(flow, ctx, locks).map_err(|source| FlowError::new(log_name, source))
}

fn run_states(
    flow: &mut dyn SyncFlow,
    ctx: &SyncContext,
    locks: Option<&LockChain>,
) -> SyncResult<FlowOutcome> {
    let id = flow.flow_id();

    log::debug!("[{id}] set up");
    flow.set_up(ctx)?;

    log::debug!("[{id}] gather resources");
    flow.gather_resources(ctx)?;

    // Local comparison: skip everything, including the remote call, when a
    // stored fingerprint exists and matches the fresh one.
    if let Some(local_sha) = flow.local_sha() {
        if let Some(stored) = ctx.sync_state.stored_hash(&id.state_key()) {
            if stored == local_sha {
                log::info!("[{id}] unchanged since last sync, skipping");
                return Ok(FlowOutcome::SkippedLocal);
            }
        }
    }

    log::debug!("[{id}] compare remote");
    if flow.compare_remote(ctx)? {
        log::info!("[{id}] remote already up to date, skipping");
        if let Some(local_sha) = flow.local_sha() {
            ctx.sync_state.record_hash(&id.state_key(), local_sha)?;
        }
        return Ok(FlowOutcome::SkippedRemote);
    }

    let needs_locks = !flow.resource_api_calls().is_empty();
    if needs_locks {
        let chain = locks.ok_or_else(|| SyncError::MissingLock {
            flow: flow.log_name(),
        })?;
        log::debug!("[{id}] sync (holding {} lock(s))", chain.len());
        let _guard = chain.acquire()?;
        flow.sync(ctx)?;
    } else {
        log::debug!("[{id}] sync");
        flow.sync(ctx)?;
    }

    if let Some(local_sha) = flow.local_sha() {
        ctx.sync_state.record_hash(&id.state_key(), local_sha)?;
    }

    log::debug!("[{id}] gather dependencies");
    let dependents = flow.gather_dependencies(ctx)?;
    if !dependents.is_empty() {
        log::debug!("[{id}] produced {} dependent flow(s)", dependents.len());
    }
    Ok(FlowOutcome::Synced { dependents })
}

#[cfg(test)]
pub(crate) mod tests_support;
