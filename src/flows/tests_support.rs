//! Shared fixtures for flow and executor unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::provider::tests_support::{clients_for, MockCloud};
use crate::state::InMemorySyncState;
use crate::template::{ResourceDefinition, ResourceId};

use super::{ApiCallKind, FlowId, ResourceApiCall, SyncFlow};

/// Context with empty collaborator maps and stub clients
pub fn test_context() -> SyncContext {
    SyncContext::new(
        HashMap::new(),
        HashMap::new(),
        HashMap::new(),
        clients_for(&Arc::new(MockCloud::new())),
        Arc::new(InMemorySyncState::new()),
    )
}

/// Context builder over explicit collaborator maps and a shared mock cloud
pub fn context_with(
    cloud: &Arc<MockCloud>,
    physical_ids: &[(&str, &str)],
    resources: Vec<ResourceDefinition>,
    artifacts: &[(&str, std::path::PathBuf)],
) -> SyncContext {
    SyncContext::new(
        physical_ids
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        resources
            .into_iter()
            .map(|def| (def.id.clone(), def))
            .collect(),
        artifacts
            .iter()
            .map(|(k, v)| (ResourceId::new(*k), v.clone()))
            .collect(),
        clients_for(cloud),
        Arc::new(InMemorySyncState::new()),
    )
}

/// Flow that counts lifecycle invocations; the workhorse of driver and
/// executor tests
pub struct CountingFlow {
    id: ResourceId,
    local_sha: String,
    remote_matches: bool,
    declare_api_calls: bool,
    fail_gather: bool,
    dependents: Mutex<Vec<Box<dyn SyncFlow>>>,
    compare_remote_count: Arc<AtomicUsize>,
    sync_count: Arc<AtomicUsize>,
    dependency_count: Arc<AtomicUsize>,
}

impl CountingFlow {
    pub fn new(id: &str, local_sha: &str) -> Self {
        Self {
            id: ResourceId::new(id),
            local_sha: local_sha.to_string(),
            remote_matches: false,
            declare_api_calls: true,
            fail_gather: false,
            dependents: Mutex::new(Vec::new()),
            compare_remote_count: Arc::new(AtomicUsize::new(0)),
            sync_count: Arc::new(AtomicUsize::new(0)),
            dependency_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn remote_matches(mut self) -> Self {
        self.remote_matches = true;
        self
    }

    pub fn without_api_calls(mut self) -> Self {
        self.declare_api_calls = false;
        self
    }

    pub fn fail_gather(mut self) -> Self {
        self.fail_gather = true;
        self
    }

    /// Queue a flow to be returned from `gather_dependencies` after sync
    pub fn with_dependent(self, dependent: Box<dyn SyncFlow>) -> Self {
        self.dependents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(dependent);
        self
    }

    /// Shared handle to the sync counter, usable after the flow is boxed
    /// and handed to an executor
    pub fn sync_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.sync_count)
    }

    pub fn compare_remote_calls(&self) -> usize {
        self.compare_remote_count.load(Ordering::SeqCst)
    }

    pub fn sync_calls(&self) -> usize {
        self.sync_count.load(Ordering::SeqCst)
    }

    pub fn dependency_calls(&self) -> usize {
        self.dependency_count.load(Ordering::SeqCst)
    }
}

impl SyncFlow for CountingFlow {
    fn flow_id(&self) -> FlowId {
        FlowId::new("counting", self.id.clone())
    }

    fn resource_api_calls(&self) -> Vec<ResourceApiCall> {
        if self.declare_api_calls {
            vec![ResourceApiCall::new(
                self.id.clone(),
                vec![ApiCallKind::UpdateCode],
            )]
        } else {
            Vec::new()
        }
    }

    fn gather_resources(&mut self, _ctx: &SyncContext) -> SyncResult<()> {
        if self.fail_gather {
            return Err(SyncError::ArtifactNotFound {
                resource_id: self.id.to_string(),
                path: std::path::PathBuf::from("missing"),
            });
        }
        Ok(())
    }

    fn local_sha(&self) -> Option<&str> {
        Some(&self.local_sha)
    }

    fn compare_remote(&self, _ctx: &SyncContext) -> SyncResult<bool> {
        self.compare_remote_count.fetch_add(1, Ordering::SeqCst);
        Ok(self.remote_matches)
    }

    fn sync(&mut self, _ctx: &SyncContext) -> SyncResult<()> {
        self.sync_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn gather_dependencies(&self, _ctx: &SyncContext) -> SyncResult<Vec<Box<dyn SyncFlow>>> {
        self.dependency_count.fetch_add(1, Ordering::SeqCst);
        Ok(std::mem::take(
            &mut *self.dependents.lock().unwrap_or_else(|e| e.into_inner()),
        ))
    }
}
