//! REST API sync flow

use std::sync::Arc;

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::hash;
use crate::provider::RestApiClient;
use crate::template::ResourceId;

use super::{ApiCallKind, FlowId, ResourceApiCall, SyncFlow};

/// Overwrites a REST API's definition from its OpenAPI file, then creates
/// a deployment so the change reaches the API's stages. Both calls run
/// under one definition lock.
pub struct RestApiSyncFlow {
    id: ResourceId,
    client: Option<Arc<dyn RestApiClient>>,
    body: Option<Vec<u8>>,
    local_sha: Option<String>,
}

impl RestApiSyncFlow {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            client: None,
            body: None,
            local_sha: None,
        }
    }
}

impl SyncFlow for RestApiSyncFlow {
    fn flow_id(&self) -> FlowId {
        FlowId::new("rest_api", self.id.clone())
    }

    fn resource_api_calls(&self) -> Vec<ResourceApiCall> {
        vec![ResourceApiCall::new(
            self.id.clone(),
            vec![ApiCallKind::UpdateDefinition],
        )]
    }

    fn set_up(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        self.client = Some(Arc::clone(&ctx.clients.rest_apis));
        Ok(())
    }

    fn gather_resources(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let definition = ctx.definition(&self.id)?;
        let uri = definition
            .definition_uri()
            .ok_or_else(|| SyncError::DefinitionNotFound {
                resource_id: self.id.to_string(),
            })?;
        let body = std::fs::read(&uri).map_err(|_| SyncError::ArtifactNotFound {
            resource_id: self.id.to_string(),
            path: uri.clone(),
        })?;
        self.local_sha = Some(hash::hash_bytes(&body));
        self.body = Some(body);
        Ok(())
    }

    fn local_sha(&self) -> Option<&str> {
        self.local_sha.as_deref()
    }

    fn sync(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let physical_id = ctx.physical_id(&self.id)?;
        let body = self.body.as_ref().ok_or_else(|| SyncError::DefinitionNotFound {
            resource_id: self.id.to_string(),
        })?;

        log::info!("updating definition of REST API '{}'", self.id);
        let client = self.client.as_ref().expect("set_up not called");
        client.put_rest_api(physical_id, body)?;
        client.create_deployment(physical_id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::tests_support::context_with;
    use crate::flows::{execute_flow, flow_lock_keys, FlowOutcome};
    use crate::locks::LockDistributor;
    use crate::provider::tests_support::MockCloud;
    use crate::template::ResourceDefinition;
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn run(flow: &mut dyn SyncFlow, ctx: &SyncContext) -> Result<FlowOutcome, crate::error::FlowError> {
        let distributor = LockDistributor::in_process();
        let chain = distributor.get_lock_chain(&flow_lock_keys(flow));
        execute_flow(flow, ctx, Some(&chain))
    }

    #[test]
    fn test_rest_api_puts_and_deploys() {
        let dir = tempdir().unwrap();
        let spec_file = dir.path().join("openapi.yaml");
        fs::write(&spec_file, "openapi: 3.0.0\n").unwrap();

        let cloud = Arc::new(MockCloud::new());
        let ctx = context_with(
            &cloud,
            &[("Api", "rest-api-id")],
            vec![ResourceDefinition::new("Api", "AWS::Serverless::Api")
                .with_properties(json!({"DefinitionUri": spec_file.to_str().unwrap()}))],
            &[],
        );

        let mut flow = RestApiSyncFlow::new("Api");
        let outcome = run(&mut flow, &ctx).unwrap();

        assert!(outcome.was_synced());
        // The deployment follows the definition update while the lock is held
        assert_eq!(
            cloud.call_log(),
            vec!["put_rest_api:rest-api-id", "create_deployment:rest-api-id"]
        );
    }

    #[test]
    fn test_rest_api_unchanged_definition_skips() {
        let dir = tempdir().unwrap();
        let spec_file = dir.path().join("openapi.yaml");
        fs::write(&spec_file, "openapi: 3.0.0\n").unwrap();

        let cloud = Arc::new(MockCloud::new());
        let ctx = context_with(
            &cloud,
            &[("Api", "rest-api-id")],
            vec![ResourceDefinition::new("Api", "AWS::Serverless::Api")
                .with_properties(json!({"DefinitionUri": spec_file.to_str().unwrap()}))],
            &[],
        );

        let mut first = RestApiSyncFlow::new("Api");
        run(&mut first, &ctx).unwrap();

        let mut second = RestApiSyncFlow::new("Api");
        let outcome = run(&mut second, &ctx).unwrap();

        assert!(matches!(outcome, FlowOutcome::SkippedLocal));
        assert_eq!(cloud.calls_matching("put_rest_api"), 1);
    }

    #[test]
    fn test_rest_api_without_definition_uri_fails_gather() {
        let cloud = Arc::new(MockCloud::new());
        let ctx = context_with(
            &cloud,
            &[("Api", "rest-api-id")],
            vec![ResourceDefinition::new("Api", "AWS::Serverless::Api")],
            &[],
        );

        let mut flow = RestApiSyncFlow::new("Api");
        let err = run(&mut flow, &ctx).unwrap_err();
        assert!(matches!(err.source, SyncError::DefinitionNotFound { .. }));
    }

    #[test]
    fn test_rest_api_missing_definition_file_fails_gather() {
        let cloud = Arc::new(MockCloud::new());
        let ctx = context_with(
            &cloud,
            &[("Api", "rest-api-id")],
            vec![ResourceDefinition::new("Api", "AWS::Serverless::Api")
                .with_properties(json!({"DefinitionUri": "/nonexistent/openapi.yaml"}))],
            &[],
        );

        let mut flow = RestApiSyncFlow::new("Api");
        let err = run(&mut flow, &ctx).unwrap_err();
        assert!(matches!(err.source, SyncError::ArtifactNotFound { .. }));
    }
}
