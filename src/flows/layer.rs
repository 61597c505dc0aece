//! Layer sync flows
//!
//! Syncing a layer publishes exactly one new layer version, then expands
//! into one `FunctionLayerReferenceSyncFlow` per function that uses the
//! layer. Those dependent flows rewrite the version suffix of the matching
//! layer ARN in each function's configuration, leaving unrelated layer
//! ARNs untouched.

use std::path::PathBuf;
use std::sync::Arc;

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::hash;
use crate::provider::{FunctionClient, LayerClient, LayerVersion, ProviderError};
use crate::template::ResourceId;

use super::{ApiCallKind, FlowId, ResourceApiCall, SyncFlow};

/// Sync flow for a layer. Identity stays version-less; the published
/// version only matters to the dependent reference flows.
pub struct LayerSyncFlow {
    id: ResourceId,
    client: Option<Arc<dyn LayerClient>>,
    artifact: Option<PathBuf>,
    compatible_runtimes: Vec<String>,
    local_sha: Option<String>,
    published: Option<LayerVersion>,
}

impl LayerSyncFlow {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            client: None,
            artifact: None,
            compatible_runtimes: Vec::new(),
            local_sha: None,
            published: None,
        }
    }

    /// Whether `reference` (a logical ID or a layer-version ARN) points at
    /// this layer
    fn is_reference_to_self(&self, reference: &str, physical_name: &str) -> bool {
        if reference == self.id.as_str() {
            return true;
        }
        // Literal ARN reference: arn:...:layer:{name}:{version}
        reference
            .rsplit_once(':')
            .map(|(prefix, _)| prefix.ends_with(&format!(":layer:{physical_name}")))
            .unwrap_or(false)
    }
}

impl SyncFlow for LayerSyncFlow {
    fn flow_id(&self) -> FlowId {
        FlowId::new("layer", self.id.clone())
    }

    fn resource_api_calls(&self) -> Vec<ResourceApiCall> {
        vec![ResourceApiCall::new(
            self.id.clone(),
            vec![ApiCallKind::PublishVersion],
        )]
    }

    fn set_up(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        self.client = Some(Arc::clone(&ctx.clients.layers));
        Ok(())
    }

    fn gather_resources(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let artifact = ctx.artifact(&self.id)?.to_path_buf();
        self.local_sha = Some(hash::hash_artifact(&artifact)?);
        self.artifact = Some(artifact);
        self.compatible_runtimes = ctx.definition(&self.id)?.compatible_runtimes();
        Ok(())
    }

    fn local_sha(&self) -> Option<&str> {
        self.local_sha.as_deref()
    }

    // Layers expose no cheap remote content fingerprint; change detection
    // relies on the stored local state (compare_remote stays false).

    fn sync(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let physical_name = ctx.physical_id(&self.id)?;
        let artifact = self.artifact.as_ref().ok_or_else(|| SyncError::ArtifactNotFound {
            resource_id: self.id.to_string(),
            path: PathBuf::new(),
        })?;
        let client = self.client.as_ref().expect("set_up not called");

        let previous = match client.latest_version(physical_name) {
            Ok(version) => Some(version.version),
            Err(ProviderError::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };

        let published =
            client.publish_layer_version(physical_name, artifact, &self.compatible_runtimes)?;
        match previous {
            Some(previous) => log::info!(
                "published layer '{}' version {} (previous {previous})",
                self.id,
                published.version
            ),
            None => log::info!(
                "published first version of layer '{}' ({})",
                self.id,
                published.version
            ),
        }
        self.published = Some(published);
        Ok(())
    }

    fn gather_dependencies(&self, ctx: &SyncContext) -> SyncResult<Vec<Box<dyn SyncFlow>>> {
        let Some(published) = &self.published else {
            return Ok(Vec::new());
        };
        let physical_name = ctx.physical_id(&self.id)?;

        let mut dependents: Vec<Box<dyn SyncFlow>> = Vec::new();
        for definition in ctx.definitions() {
            let references_self = definition
                .layer_refs()
                .iter()
                .any(|r| self.is_reference_to_self(r, physical_name));
            if references_self {
                dependents.push(Box::new(FunctionLayerReferenceSyncFlow::new(
                    definition.id.clone(),
                    published.clone(),
                )));
            }
        }
        Ok(dependents)
    }
}

/// Updates one function's configuration to reference a newly published
/// layer version.
///
/// Identity includes the layer version: references to different versions
/// are distinct units of work, while duplicate updates to the same version
/// collapse in the executor queue.
pub struct FunctionLayerReferenceSyncFlow {
    function_id: ResourceId,
    layer: LayerVersion,
    client: Option<Arc<dyn FunctionClient>>,
}

impl FunctionLayerReferenceSyncFlow {
    pub fn new(function_id: impl Into<ResourceId>, layer: LayerVersion) -> Self {
        Self {
            function_id: function_id.into(),
            layer,
            client: None,
        }
    }
}

impl SyncFlow for FunctionLayerReferenceSyncFlow {
    fn flow_id(&self) -> FlowId {
        FlowId::new("layer_reference", self.function_id.clone()).with_version(self.layer.version)
    }

    fn resource_api_calls(&self) -> Vec<ResourceApiCall> {
        vec![ResourceApiCall::new(
            self.function_id.clone(),
            vec![ApiCallKind::UpdateConfig],
        )]
    }

    fn set_up(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        self.client = Some(Arc::clone(&ctx.clients.functions));
        Ok(())
    }

    fn gather_resources(&mut self, _ctx: &SyncContext) -> SyncResult<()> {
        // Nothing local to build; the new ARN came from the layer flow
        Ok(())
    }

    fn local_sha(&self) -> Option<&str> {
        None
    }

    fn compare_remote(&self, ctx: &SyncContext) -> SyncResult<bool> {
        let physical_id = ctx.physical_id(&self.function_id)?;
        let client = self.client.as_ref().expect("set_up not called");
        let arns = client.layer_arns(physical_id)?;
        Ok(arns.iter().any(|arn| arn == &self.layer.arn))
    }

    fn sync(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let physical_id = ctx.physical_id(&self.function_id)?;
        let client = self.client.as_ref().expect("set_up not called");

        let mut arns = client.layer_arns(physical_id)?;
        let target_prefix = self.layer.arn_prefix();
        let slot = arns.iter_mut().find(|arn| {
            arn.rsplit_once(':')
                .map(|(prefix, _)| prefix == target_prefix)
                .unwrap_or(false)
        });

        match slot {
            Some(slot) => *slot = self.layer.arn.clone(),
            // The deployed function carries no reference to this layer at
            // all; the stack is out of sync with the template.
            None => {
                return Err(SyncError::NoRemoteCounterpart {
                    resource_id: self.function_id.to_string(),
                })
            }
        }

        log::info!(
            "updating layer reference of function '{}' to version {}",
            self.function_id,
            self.layer.version
        );
        client.update_layers(physical_id, &arns)?;
        client.wait_until_stable(physical_id)?;
        Ok(())
    }
}
