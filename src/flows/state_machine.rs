//! State machine sync flow

use std::sync::Arc;

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::hash;
use crate::provider::StateMachineClient;
use crate::template::ResourceId;

use super::{ApiCallKind, FlowId, ResourceApiCall, SyncFlow};

/// Replaces a state machine's definition from the template's inline
/// definition or its external definition file.
///
/// Definitions containing unresolved `${...}` substitutions depend on
/// values only a full infrastructure deployment can resolve; gathering
/// fails with a recoverable error so the run can tell the caller to fall
/// back instead of pushing a broken definition.
pub struct StateMachineSyncFlow {
    id: ResourceId,
    client: Option<Arc<dyn StateMachineClient>>,
    definition: Option<String>,
    local_sha: Option<String>,
}

impl StateMachineSyncFlow {
    pub fn new(id: impl Into<ResourceId>) -> Self {
        Self {
            id: id.into(),
            client: None,
            definition: None,
            local_sha: None,
        }
    }
}

impl SyncFlow for StateMachineSyncFlow {
    fn flow_id(&self) -> FlowId {
        FlowId::new("state_machine", self.id.clone())
    }

    fn resource_api_calls(&self) -> Vec<ResourceApiCall> {
        vec![ResourceApiCall::new(
            self.id.clone(),
            vec![ApiCallKind::UpdateDefinition],
        )]
    }

    fn set_up(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        self.client = Some(Arc::clone(&ctx.clients.state_machines));
        Ok(())
    }

    fn gather_resources(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let resource = ctx.definition(&self.id)?;

        let definition = match resource.inline_definition() {
            Some(inline) => inline,
            None => {
                let uri = resource
                    .definition_uri()
                    .ok_or_else(|| SyncError::DefinitionNotFound {
                        resource_id: self.id.to_string(),
                    })?;
                std::fs::read_to_string(&uri).map_err(|_| SyncError::ArtifactNotFound {
                    resource_id: self.id.to_string(),
                    path: uri.clone(),
                })?
            }
        };

        if definition.contains("${") {
            return Err(SyncError::InfraSyncRequired {
                resource_id: self.id.to_string(),
                reason: "definition contains unresolved substitutions".to_string(),
            });
        }

        self.local_sha = Some(hash::hash_bytes(definition.as_bytes()));
        self.definition = Some(definition);
        Ok(())
    }

    fn local_sha(&self) -> Option<&str> {
        self.local_sha.as_deref()
    }

    fn sync(&mut self, ctx: &SyncContext) -> SyncResult<()> {
        let physical_arn = ctx.physical_id(&self.id)?;
        let definition = self
            .definition
            .as_ref()
            .ok_or_else(|| SyncError::DefinitionNotFound {
                resource_id: self.id.to_string(),
            })?;

        log::info!("updating definition of state machine '{}'", self.id);
        let client = self.client.as_ref().expect("set_up not called");
        client.update_state_machine(physical_arn, definition)?;
        Ok(())
    }
}
