//! Physical resource resolution
//!
//! Walks a deployed stack, recursing through nested stacks, to build the
//! flat logical-ID→physical-ID mapping the rest of the engine depends on.
//! Nested-stack resources are keyed by a `/`-joined path, e.g.
//! `NestedStack1/FunctionA`.

use std::collections::HashMap;

use crate::error::{SyncError, SyncResult};
use crate::provider::{ProviderError, ProviderResult};

/// Template type marking a resource as a nested stack
pub const NESTED_STACK_TYPE: &str = "AWS::CloudFormation::Stack";

/// One entry of a stack's resource listing
#[derive(Debug, Clone)]
pub struct StackResource {
    pub logical_id: String,
    pub physical_id: String,
    pub resource_type: String,
}

impl StackResource {
    pub fn new(
        logical_id: impl Into<String>,
        physical_id: impl Into<String>,
        resource_type: impl Into<String>,
    ) -> Self {
        Self {
            logical_id: logical_id.into(),
            physical_id: physical_id.into(),
            resource_type: resource_type.into(),
        }
    }
}

/// Lists a deployed stack's resource summaries
pub trait StackResourceProvider: Send + Sync {
    fn list_stack_resources(&self, stack_name: &str) -> ProviderResult<Vec<StackResource>>;
}

/// Build the flat logical→physical mapping for `root_stack`.
///
/// A missing root stack is a distinct first-ever-sync condition
/// (`SyncError::StackNotFound`): the caller should fall back to a full
/// infrastructure deploy rather than treat it as a generic failure.
pub fn build_physical_id_mapping(
    provider: &dyn StackResourceProvider,
    root_stack: &str,
) -> SyncResult<HashMap<String, String>> {
    let mut mapping = HashMap::new();
    walk_stack(provider, root_stack, None, &mut mapping).map_err(|e| match e {
        ProviderError::StackNotFound(name) => SyncError::StackNotFound { stack_name: name },
        other => SyncError::Provider(other),
    })?;
    log::debug!(
        "resolved {} physical resource IDs from stack '{root_stack}'",
        mapping.len()
    );
    Ok(mapping)
}

fn walk_stack(
    provider: &dyn StackResourceProvider,
    stack_name: &str,
    prefix: Option<&str>,
    mapping: &mut HashMap<String, String>,
) -> ProviderResult<()> {
    for resource in provider.list_stack_resources(stack_name)? {
        let key = match prefix {
            Some(prefix) => format!("{prefix}/{}", resource.logical_id),
            None => resource.logical_id.clone(),
        };

        if resource.resource_type == NESTED_STACK_TYPE {
            // Descend using the child's physical ID as its stack name
            walk_stack(provider, &resource.physical_id, Some(&key), mapping)?;
        } else {
            mapping.insert(key, resource.physical_id);
        }
    }
    Ok(())
}
