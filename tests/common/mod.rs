//! Shared fixtures for integration tests.
//!
//! The library's unit-test mock is `#[cfg(test)]` and not visible here,
//! so this module carries its own mock cloud with the same shape.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use stacksync::provider::{
    CloudClients, FunctionClient, HttpApiClient, LayerClient, LayerVersion, ProviderError,
    ProviderResult, RestApiClient, StateMachineClient,
};
use stacksync::state::InMemorySyncState;
use stacksync::{ResourceDefinition, ResourceId, SyncContext};

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
pub struct MockCloud {
    pub code_shas: Mutex<HashMap<String, String>>,
    pub function_layers: Mutex<HashMap<String, Vec<String>>>,
    pub layer_versions: Mutex<HashMap<String, LayerVersion>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, prefix: &str) -> usize {
        self.call_log()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn set_code_sha(&self, function_name: &str, sha: &str) {
        self.code_shas
            .lock()
            .unwrap()
            .insert(function_name.to_string(), sha.to_string());
    }

    pub fn set_function_layers(&self, function_name: &str, arns: &[&str]) {
        self.function_layers.lock().unwrap().insert(
            function_name.to_string(),
            arns.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn layers_of(&self, function_name: &str) -> Vec<String> {
        self.function_layers
            .lock()
            .unwrap()
            .get(function_name)
            .cloned()
            .unwrap_or_default()
    }
}

impl FunctionClient for MockCloud {
    fn update_function_code(&self, function_name: &str, _artifact: &Path) -> ProviderResult<()> {
        self.record(format!("update_function_code:{function_name}"));
        Ok(())
    }

    fn update_function_image(&self, function_name: &str, image_uri: &str) -> ProviderResult<()> {
        self.record(format!("update_function_image:{function_name}:{image_uri}"));
        Ok(())
    }

    fn code_sha256(&self, function_name: &str) -> ProviderResult<String> {
        self.record(format!("code_sha256:{function_name}"));
        self.code_shas
            .lock()
            .unwrap()
            .get(function_name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(function_name.to_string()))
    }

    fn layer_arns(&self, function_name: &str) -> ProviderResult<Vec<String>> {
        self.record(format!("layer_arns:{function_name}"));
        Ok(self.layers_of(function_name))
    }

    fn update_layers(&self, function_name: &str, layer_arns: &[String]) -> ProviderResult<()> {
        self.record(format!("update_layers:{function_name}"));
        self.function_layers
            .lock()
            .unwrap()
            .insert(function_name.to_string(), layer_arns.to_vec());
        Ok(())
    }

    fn wait_until_stable(&self, function_name: &str) -> ProviderResult<()> {
        self.record(format!("wait_until_stable:{function_name}"));
        Ok(())
    }
}

impl LayerClient for MockCloud {
    fn publish_layer_version(
        &self,
        layer_name: &str,
        _artifact: &Path,
        _compatible_runtimes: &[String],
    ) -> ProviderResult<LayerVersion> {
        self.record(format!("publish_layer_version:{layer_name}"));
        let mut versions = self.layer_versions.lock().unwrap();
        let next = versions.get(layer_name).map(|v| v.version + 1).unwrap_or(1);
        let published = LayerVersion {
            arn: format!("arn:aws:lambda:us-east-1:123456789012:layer:{layer_name}:{next}"),
            version: next,
        };
        versions.insert(layer_name.to_string(), published.clone());
        Ok(published)
    }

    fn latest_version(&self, layer_name: &str) -> ProviderResult<LayerVersion> {
        self.record(format!("latest_version:{layer_name}"));
        self.layer_versions
            .lock()
            .unwrap()
            .get(layer_name)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(layer_name.to_string()))
    }
}

impl RestApiClient for MockCloud {
    fn put_rest_api(&self, api_id: &str, _body: &[u8]) -> ProviderResult<()> {
        self.record(format!("put_rest_api:{api_id}"));
        Ok(())
    }

    fn create_deployment(&self, api_id: &str) -> ProviderResult<()> {
        self.record(format!("create_deployment:{api_id}"));
        Ok(())
    }
}

impl HttpApiClient for MockCloud {
    fn reimport_api(&self, api_id: &str, _body: &[u8]) -> ProviderResult<()> {
        self.record(format!("reimport_api:{api_id}"));
        Ok(())
    }
}

impl StateMachineClient for MockCloud {
    fn update_state_machine(
        &self,
        state_machine_arn: &str,
        _definition: &str,
    ) -> ProviderResult<()> {
        self.record(format!("update_state_machine:{state_machine_arn}"));
        Ok(())
    }
}

pub fn clients_for(cloud: &Arc<MockCloud>) -> CloudClients {
    CloudClients {
        functions: Arc::clone(cloud) as Arc<dyn FunctionClient>,
        layers: Arc::clone(cloud) as Arc<dyn LayerClient>,
        rest_apis: Arc::clone(cloud) as Arc<dyn RestApiClient>,
        http_apis: Arc::clone(cloud) as Arc<dyn HttpApiClient>,
        state_machines: Arc::clone(cloud) as Arc<dyn StateMachineClient>,
    }
}

/// Context over explicit collaborator maps, backed by one shared mock
/// cloud and an in-memory state store
pub fn context_with(
    cloud: &Arc<MockCloud>,
    physical_ids: &[(&str, &str)],
    resources: Vec<ResourceDefinition>,
    artifacts: &[(&str, PathBuf)],
) -> SyncContext {
    context_with_state(
        cloud,
        physical_ids,
        resources,
        artifacts,
        Arc::new(InMemorySyncState::new()),
    )
}

pub fn context_with_state(
    cloud: &Arc<MockCloud>,
    physical_ids: &[(&str, &str)],
    resources: Vec<ResourceDefinition>,
    artifacts: &[(&str, PathBuf)],
    sync_state: Arc<dyn stacksync::SyncStateRepository>,
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
        sync_state,
    )
}
