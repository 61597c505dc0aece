//! Function sync flows
//!
//! Two variants, selected by the factory from the resource's declared
//! packaging: `ZipFunctionSyncFlow` pushes a built code artifact and
//! `ImageFunctionSyncFlow` points the function at a rebuilt container
//! image. Both wait for the function to stabilize before releasing their
//! lock, so a second flow cannot race an update against one in flight.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::hash;
use crate::provider::FunctionClient;
use crate::template::ResourceId;

use super::{ApiCallKind, FlowId, ResourceApiCall, SyncFlow};

/// Sync flow for a zip-packaged function
pub struct ZipFunctionSyncFlow {
    id: ResourceId,
    client: Option<Arc<dyn FunctionClient>>,
    artifact: Option<PathBuf>,
    local_sha: Option<String>,
}

impl ZipFunctionSyncFlow {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            client: None,
            artifact: None,
            local_sha: None,
        }
    }

    fn client(&self) -> &Arc<dyn FunctionClient> {
        // set_up runs before any stage that reaches here
        self.client.as_ref().expect("set_up not called")
    }
}

impl SyncFlow for ZipFunctionSyncFlow {
    fn flow_id(&self) -> FlowId {
        FlowId::new("function", self.id.clone())
    }

    fn resource_api_calls(&self) -> Vec<ResourceApiCall> {
        vec![ResourceApiCall::new(
            self.id.clone(),
            vec![ApiCallKind::UpdateCode],
        )]
    }

    fn set_up(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        self.client = Some(Arc::clone(&ctx.clients.functions));
        Ok(())
    }

    fn gather_resources(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let artifact = ctx.artifact(&self.id)?.to_path_buf();
        self.local_sha = Some(hash::hash_artifact(&artifact)?);
        self.artifact = Some(artifact);
        Ok(())
    }

    fn local_sha(&self) -> Option<&str> {
        self.local_sha.as_deref()
    }

    fn compare_remote(&self, ctx: &SyncContext) -> SyncResult<bool> {
        let physical_id = ctx.physical_id(&self.id)?;
        let remote_sha = self.client().code_sha256(physical_id)?;
        Ok(Some(remote_sha.as_str()) == self.local_sha())
    }

    fn sync(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let physical_id = ctx.physical_id(&self.id)?;
        let artifact = self.artifact.as_ref().ok_or_else(|| SyncError::ArtifactNotFound {
            resource_id: self.id.to_string(),
            path: PathBuf::new(),
        })?;

        log::info!("updating code of function '{}'", self.id);
        let client = self.client();
        client.update_function_code(physical_id, artifact)?;
        client.wait_until_stable(physical_id)?;
        Ok(())
    }
}

/// Sync flow for an image-packaged function.
///
/// The build context writes the pushed image reference to a marker file;
/// its content doubles as the local fingerprint. There is no cheap remote
/// fingerprint for images, so this flow relies solely on stored local
/// state (`compare_remote` stays false).
pub struct ImageFunctionSyncFlow {
    id: ResourceId,
    client: Option<Arc<dyn FunctionClient>>,
    image_uri: Option<String>,
    local_sha: Option<String>,
}

impl ImageFunctionSyncFlow {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            client: None,
            image_uri: None,
            local_sha: None,
        }
    }
}

impl SyncFlow for ImageFunctionSyncFlow {
    fn flow_id(&self) -> FlowId {
        FlowId::new("function", self.id.clone())
    }

    fn resource_api_calls(&self) -> Vec<ResourceApiCall> {
        vec![ResourceApiCall::new(
            self.id.clone(),
            vec![ApiCallKind::UpdateCode],
        )]
    }

    fn set_up(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        self.client = Some(Arc::clone(&ctx.clients.functions));
        Ok(())
    }

    fn gather_resources(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let marker = ctx.artifact(&self.id)?;
        let image_uri = fs::read_to_string(marker)?.trim().to_string();
        if image_uri.is_empty() {
            return Err(SyncError::ArtifactNotFound {
                resource_id: self.id.to_string(),
                path: marker.to_path_buf(),
            });
        }
        self.local_sha = Some(hash::hash_bytes(image_uri.as_bytes()));
        self.image_uri = Some(image_uri);
        Ok(())
    }

    fn local_sha(&self) -> Option<&str> {
        self.local_sha.as_deref()
    }

    fn sync(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let physical_id = ctx.physical_id(&self.id)?;
        let image_uri = self.image_uri.as_ref().ok_or_else(|| SyncError::ArtifactNotFound {
            resource_id: self.id.to_string(),
            path: PathBuf::new(),
        })?;

        log::info!("updating image of function '{}'", self.id);
        let client = self.client.as_ref().expect("set_up not called");
        client.update_function_image(physical_id, image_uri)?;
        client.wait_until_stable(physical_id)?;
        Ok(())
    }
}
