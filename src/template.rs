//! Core data model for template resources
//!
//! Defines the fundamental structures the sync engine works with:
//! - `ResourceId`: path-qualified logical identifier of a resource
//! - `ResourceType`: the closed set of resource types the engine can sync
//! - `PackageType`: how a function's code is packaged
//! - `ResourceDefinition`: a template resource plus its declared properties

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Path-qualified logical ID of a template resource.
///
/// Resources in nested stacks are keyed by a `/`-joined path, e.g.
/// `NestedStack1/FunctionA`. Root-stack resources use their logical ID as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Key for a resource nested under a parent stack's logical ID
    pub fn nested(parent: &str, logical_id: &str) -> Self {
        Self(format!("{parent}/{logical_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The bare logical ID, without any nested-stack prefix
    pub fn logical_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Resource types the engine knows how to sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Function,
    Layer,
    RestApi,
    HttpApi,
    StateMachine,
}

impl ResourceType {
    /// Map a raw template type string to a syncable resource type.
    ///
    /// Returns `None` for types that have no synchronizable representation
    /// (the caller treats those as "nothing to sync", not a failure).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "AWS::Serverless::Function" | "AWS::Lambda::Function" => Some(Self::Function),
            "AWS::Serverless::LayerVersion" | "AWS::Lambda::LayerVersion" => Some(Self::Layer),
            "AWS::Serverless::Api" | "AWS::ApiGateway::RestApi" => Some(Self::RestApi),
            "AWS::Serverless::HttpApi" | "AWS::ApiGatewayV2::Api" => Some(Self::HttpApi),
            "AWS::Serverless::StateMachine" | "AWS::StepFunctions::StateMachine" => {
                Some(Self::StateMachine)
            }
            _ => None,
        }
    }
}

/// How a function's code is packaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PackageType {
    /// Code archive / build directory
    #[default]
    Zip,
    /// Container image
    Image,
}

/// A template resource and its declared properties.
///
/// Properties are kept as raw JSON; typed accessors below cover the fields
/// the sync flows read. Definitions are provided by the template-translation
/// collaborator, which this crate does not own.
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    pub id: ResourceId,
    /// Raw template type string, e.g. `AWS::Serverless::Function`
    pub raw_type: String,
    pub package_type: PackageType,
    pub properties: serde_json::Value,
}

impl ResourceDefinition {
    pub fn new(id: impl Into<ResourceId>, raw_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_type: raw_type.into(),
            package_type: PackageType::default(),
            properties: serde_json::Value::Null,
        }
    }

    pub fn with_package_type(mut self, package_type: PackageType) -> Self {
        self.package_type = package_type;
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn resource_type(&self) -> Option<ResourceType> {
        ResourceType::parse(&self.raw_type)
    }

    fn str_property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }

    /// Layer references declared on a function (`Layers` property).
    ///
    /// Entries are either logical IDs of layers in the same template or
    /// literal layer-version ARNs.
    pub fn layer_refs(&self) -> Vec<String> {
        self.properties
            .get("Layers")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Runtimes a layer is compatible with (`CompatibleRuntimes` property)
    pub fn compatible_runtimes(&self) -> Vec<String> {
        self.properties
            .get("CompatibleRuntimes")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Path to an external API / state machine definition file
    pub fn definition_uri(&self) -> Option<PathBuf> {
        self.str_property("DefinitionUri").map(PathBuf::from)
    }

    /// Inline state machine definition, if declared in the template
    pub fn inline_definition(&self) -> Option<String> {
        match self.properties.get("Definition") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(v @ serde_json::Value::Object(_)) => serde_json::to_string(v).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_id_nested_path() {
        let id = ResourceId::nested("NestedStack1", "FunctionA");
        assert_eq!(id.as_str(), "NestedStack1/FunctionA");
        assert_eq!(id.logical_id(), "FunctionA");
    }

    #[test]
    fn test_resource_id_root_logical_id() {
        let id = ResourceId::new("HelloWorldFunction");
        assert_eq!(id.logical_id(), "HelloWorldFunction");
    }

    #[test]
    fn test_resource_type_parse_known() {
        assert_eq!(
            ResourceType::parse("AWS::Serverless::Function"),
            Some(ResourceType::Function)
        );
        assert_eq!(
            ResourceType::parse("AWS::Lambda::LayerVersion"),
            Some(ResourceType::Layer)
        );
        assert_eq!(
            ResourceType::parse("AWS::Serverless::Api"),
            Some(ResourceType::RestApi)
        );
        assert_eq!(
            ResourceType::parse("AWS::ApiGatewayV2::Api"),
            Some(ResourceType::HttpApi)
        );
        assert_eq!(
            ResourceType::parse("AWS::StepFunctions::StateMachine"),
            Some(ResourceType::StateMachine)
        );
    }

    #[test]
    fn test_resource_type_parse_unknown_is_none() {
        assert_eq!(ResourceType::parse("AWS::S3::Bucket"), None);
        assert_eq!(ResourceType::parse(""), None);
    }

    #[test]
    fn test_definition_layer_refs() {
        let def = ResourceDefinition::new("Func", "AWS::Serverless::Function").with_properties(
            json!({
                "Layers": ["DepsLayer", "arn:aws:lambda:us-east-1:123:layer:shared:4"]
            }),
        );
        assert_eq!(
            def.layer_refs(),
            vec![
                "DepsLayer".to_string(),
                "arn:aws:lambda:us-east-1:123:layer:shared:4".to_string()
            ]
        );
    }

    #[test]
    fn test_definition_layer_refs_absent() {
        let def = ResourceDefinition::new("Func", "AWS::Serverless::Function");
        assert!(def.layer_refs().is_empty());
    }

    #[test]
    fn test_definition_uri_property() {
        let def = ResourceDefinition::new("Api", "AWS::Serverless::Api")
            .with_properties(json!({"DefinitionUri": "api/openapi.yaml"}));
        assert_eq!(def.definition_uri(), Some(PathBuf::from("api/openapi.yaml")));
    }

    #[test]
    fn test_inline_definition_object_serializes() {
        let def = ResourceDefinition::new("Machine", "AWS::Serverless::StateMachine")
            .with_properties(json!({"Definition": {"StartAt": "First", "States": {}}}));
        let inline = def.inline_definition().unwrap();
        assert!(inline.contains("StartAt"));
    }

    #[test]
    fn test_package_type_defaults_to_zip() {
        let def = ResourceDefinition::new("Func", "AWS::Serverless::Function");
        assert_eq!(def.package_type, PackageType::Zip);
    }
}
