//! Shared per-run context
//!
//! One `SyncContext` is built at the start of a run from collaborator data
//! (resolved physical IDs, template definitions, build artifacts, service
//! clients) and shared read-only across the executor's worker threads.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};
use crate::provider::CloudClients;
use crate::state::SyncStateRepository;
use crate::template::{ResourceDefinition, ResourceId};

/// Read-mostly collaborators shared by every flow in a run.
///
/// The physical-ID mapping is written once at construction and never
/// mutated afterwards; dependent flows receive fresh remote identifiers
/// (e.g. a new layer-version ARN) through their constructors instead.
pub struct SyncContext {
    physical_ids: HashMap<String, String>,
    resources: HashMap<ResourceId, ResourceDefinition>,
    artifacts: HashMap<ResourceId, PathBuf>,
    pub clients: CloudClients,
    pub sync_state: Arc<dyn SyncStateRepository>,
}

impl SyncContext {
    pub fn new(
        physical_ids: HashMap<String, String>,
        resources: HashMap<ResourceId, ResourceDefinition>,
        artifacts: HashMap<ResourceId, PathBuf>,
        clients: CloudClients,
        sync_state: Arc<dyn SyncStateRepository>,
    ) -> Self {
        Self {
            physical_ids,
            resources,
            artifacts,
            clients,
            sync_state,
        }
    }

    /// The deployed physical ID for a logical resource
    pub fn physical_id(&self, id: &ResourceId) -> SyncResult<&str> {
        self.physical_ids
            .get(id.as_str())
            .map(String::as_str)
            .ok_or_else(|| SyncError::MissingPhysicalResource {
                logical_id: id.to_string(),
            })
    }

    /// The template definition for a resource
    pub fn definition(&self, id: &ResourceId) -> SyncResult<&ResourceDefinition> {
        self.resources
            .get(id)
            .ok_or_else(|| SyncError::DefinitionNotFound {
                resource_id: id.to_string(),
            })
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ResourceDefinition> {
        self.resources.values()
    }

    /// The built artifact path for a resource; errors if the build context
    /// produced nothing or the path has since disappeared
    pub fn artifact(&self, id: &ResourceId) -> SyncResult<&Path> {
        let path = self
            .artifacts
            .get(id)
            .ok_or_else(|| SyncError::ArtifactNotFound {
                resource_id: id.to_string(),
                path: PathBuf::new(),
            })?;
        if !path.exists() {
            return Err(SyncError::ArtifactNotFound {
                resource_id: id.to_string(),
                path: path.clone(),
            });
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::tests_support::stub_clients;

    fn empty_context() -> SyncContext {
        SyncContext::new(
            HashMap::new(),
            HashMap::new(),
            HashMap::new(),
            stub_clients(),
            Arc::new(crate::state::InMemorySyncState::new()),
        )
    }

    #[test]
    fn test_missing_physical_id_is_taxonomy_error() {
        let ctx = empty_context();
        let err = ctx.physical_id(&ResourceId::new("FuncA")).unwrap_err();
        assert!(matches!(err, SyncError::MissingPhysicalResource { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_missing_definition_is_fatal() {
        let ctx = empty_context();
        let err = ctx.definition(&ResourceId::new("FuncA")).unwrap_err();
        assert!(matches!(err, SyncError::DefinitionNotFound { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_missing_artifact_reports_resource() {
        let ctx = empty_context();
        let err = ctx.artifact(&ResourceId::new("FuncA")).unwrap_err();
        match err {
            SyncError::ArtifactNotFound { resource_id, .. } => {
                assert_eq!(resource_id, "FuncA");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_artifact_path_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("missing.zip");

        let mut artifacts = HashMap::new();
        artifacts.insert(ResourceId::new("FuncA"), gone);
        let ctx = SyncContext::new(
            HashMap::new(),
            HashMap::new(),
            artifacts,
            stub_clients(),
            Arc::new(crate::state::InMemorySyncState::new()),
        );

        assert!(matches!(
            ctx.artifact(&ResourceId::new("FuncA")),
            Err(SyncError::ArtifactNotFound { .. })
        ));
    }
}
