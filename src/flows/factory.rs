//! Maps template resources to the flows that sync them

use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::template::{PackageType, ResourceDefinition, ResourceId, ResourceType};

use super::{
    HttpApiSyncFlow, ImageFunctionSyncFlow, LayerSyncFlow, RestApiSyncFlow, StateMachineSyncFlow,
    SyncFlow, ZipFunctionSyncFlow,
};

/// Selects the sync flow for a resource from its template type.
///
/// Functions additionally route on their package type. Types with no
/// synchronizable representation yield `None`; the caller treats that as
/// "nothing to sync", not a failure.
pub struct SyncFlowFactory;

impl SyncFlowFactory {
    pub fn create(definition: &ResourceDefinition) -> Option<Box<dyn SyncFlow>> {
        let resource_type = match definition.resource_type() {
            Some(t) => t,
            None => {
                log::debug!(
                    "resource '{}' has no syncable type ({})",
                    definition.id,
                    definition.raw_type
                );
                return None;
            }
        };

        let flow: Box<dyn SyncFlow> = match resource_type {
            ResourceType::Function => match definition.package_type {
                PackageType::Zip => Box::new(ZipFunctionSyncFlow::new(definition.id.clone())),
                PackageType::Image => Box::new(ImageFunctionSyncFlow::new(definition.id.clone())),
            },
            ResourceType::Layer => Box::new(LayerSyncFlow::new(definition.id.clone())),
            ResourceType::RestApi => Box::new(RestApiSyncFlow::new(definition.id.clone())),
            ResourceType::HttpApi => Box::new(HttpApiSyncFlow::new(definition.id.clone())),
            ResourceType::StateMachine => {
                Box::new(StateMachineSyncFlow::new(definition.id.clone()))
            }
        };
        Some(flow)
    }

    /// Flows for an explicit set of changed resources.
    ///
    /// Unknown IDs fail; IDs of unsyncable types are silently dropped.
    pub fn create_for(
        ctx: &SyncContext,
        resource_ids: &[ResourceId],
    ) -> SyncResult<Vec<Box<dyn SyncFlow>>> {
        let mut flows = Vec::new();
        for id in resource_ids {
            if let Some(flow) = Self::create(ctx.definition(id)?) {
                flows.push(flow);
            }
        }
        Ok(flows)
    }

    /// Flows for every syncable resource in the context
    pub fn create_all(ctx: &SyncContext) -> Vec<Box<dyn SyncFlow>> {
        ctx.definitions().filter_map(Self::create).collect()
    }
}
