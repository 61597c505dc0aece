//! Service-client seams for remote mutation
//!
//! The engine never owns credentials or sessions: the caller's session
//! factory constructs concrete clients and hands them in through
//! `CloudClients`. Upload mechanics (S3/ECR) live behind these traits.
//!
//! Every trait is object-safe and `Send + Sync` so client handles can be
//! shared across the executor's worker threads.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

/// Remote service call failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The requested stack has never been deployed
    #[error("stack '{0}' does not exist")]
    StackNotFound(String),

    /// The remote resource does not exist
    #[error("remote resource '{0}' not found")]
    NotFound(String),

    /// The service throttled the request
    #[error("request throttled: {0}")]
    Throttled(String),

    /// Any other service-side failure
    #[error("service error: {0}")]
    Service(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A published layer version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerVersion {
    /// Full layer-version ARN, ending in `:{version}`
    pub arn: String,
    pub version: u64,
}

impl LayerVersion {
    /// The ARN with its trailing `:{version}` suffix removed
    pub fn arn_prefix(&self) -> &str {
        self.arn.rsplit_once(':').map(|(p, _)| p).unwrap_or(&self.arn)
    }
}

/// Function service operations used by the sync flows
pub trait FunctionClient: Send + Sync {
    /// Upload new function code from a built artifact
    fn update_function_code(&self, function_name: &str, artifact: &Path) -> ProviderResult<()>;

    /// Point the function at a new container image
    fn update_function_image(&self, function_name: &str, image_uri: &str) -> ProviderResult<()>;

    /// The deployed code fingerprint, in `sha256:<hex>` form
    fn code_sha256(&self, function_name: &str) -> ProviderResult<String>;

    /// Layer-version ARNs currently attached to the function
    fn layer_arns(&self, function_name: &str) -> ProviderResult<Vec<String>>;

    /// Replace the function's attached layer-version ARNs
    fn update_layers(&self, function_name: &str, layer_arns: &[String]) -> ProviderResult<()>;

    /// Block until an in-flight update reaches a terminal state.
    ///
    /// Called inside the flow's lock chain so a second flow cannot race an
    /// update against one still in progress.
    fn wait_until_stable(&self, function_name: &str) -> ProviderResult<()>;
}

/// Layer service operations
pub trait LayerClient: Send + Sync {
    /// Publish a new layer version from a built artifact
    fn publish_layer_version(
        &self,
        layer_name: &str,
        artifact: &Path,
        compatible_runtimes: &[String],
    ) -> ProviderResult<LayerVersion>;

    /// The most recently published version, or `NotFound` if none exist
    fn latest_version(&self, layer_name: &str) -> ProviderResult<LayerVersion>;
}

/// REST API service operations
pub trait RestApiClient: Send + Sync {
    /// Overwrite the API's definition with a new OpenAPI body
    fn put_rest_api(&self, api_id: &str, body: &[u8]) -> ProviderResult<()>;

    /// Deploy the updated definition to the API's stages
    fn create_deployment(&self, api_id: &str) -> ProviderResult<()>;
}

/// HTTP API service operations
pub trait HttpApiClient: Send + Sync {
    /// Reimport the API's OpenAPI definition, replacing existing routes
    fn reimport_api(&self, api_id: &str, body: &[u8]) -> ProviderResult<()>;
}

/// State machine service operations
pub trait StateMachineClient: Send + Sync {
    /// Replace the state machine's definition
    fn update_state_machine(&self, state_machine_arn: &str, definition: &str)
        -> ProviderResult<()>;
}

/// Bundle of service clients handed in by the caller's session factory
#[derive(Clone)]
pub struct CloudClients {
    pub functions: Arc<dyn FunctionClient>,
    pub layers: Arc<dyn LayerClient>,
    pub rest_apis: Arc<dyn RestApiClient>,
    pub http_apis: Arc<dyn HttpApiClient>,
    pub state_machines: Arc<dyn StateMachineClient>,
}
