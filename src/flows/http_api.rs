//! HTTP API sync flow

use std::sync::Arc;

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::hash;
use crate::provider::HttpApiClient;
use crate::template::ResourceId;

use super::{ApiCallKind, FlowId, ResourceApiCall, SyncFlow};

/// Reimports an HTTP API's OpenAPI definition, replacing its routes in
/// one call. Unlike the REST variant there is no separate deployment
/// step; the reimport takes effect directly.
pub struct HttpApiSyncFlow {
    id: ResourceId,
    client: Option<Arc<dyn HttpApiClient>>,
    body: Option<Vec<u8>>,
    local_sha: Option<String>,
}

impl HttpApiSyncFlow {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            client: None,
            body: None,
            local_sha: None,
        }
    }
}

impl SyncFlow for HttpApiSyncFlow {
    fn flow_id(&self) -> FlowId {
        FlowId::new("http_api", self.id.clone())
    }

    fn resource_api_calls(&self) -> Vec<ResourceApiCall> {
        vec![ResourceApiCall::new(
            self.id.clone(),
            vec![ApiCallKind::UpdateDefinition],
        )]
    }

    fn set_up(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        self.client = Some(Arc::clone(&ctx.clients.http_apis));
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

        log::info!("reimporting definition of HTTP API '{}'", self.id);
        let client = self.client.as_ref().expect("set_up not called");
        client.reimport_api(physical_id, body)?;
        Ok(())
    }
}
