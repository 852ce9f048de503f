//! Datadog software catalog records
//!
//! [`DatadogEntity`] is the schema v3 entity; [`ServiceDefinition`] is the
//! older v2.2 service definition, kept for catalogs that still consume it.

use serde::{Deserialize, Serialize};

/// Schema version written by the serializers
pub const API_VERSION_V3: &str = "v3";

/// Schema version of [`ServiceDefinition`]
pub const SCHEMA_VERSION_V2_2: &str = "v2.2";

/// Entity kind written by the serializers
pub const KIND_SERVICE: &str = "service";

/// Link types Datadog accepts; anything else is reported as `other`
pub const LINK_TYPES: [&str; 5] = ["runbook", "doc", "repo", "dashboard", "other"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatadogEntity {
    pub api_version: String,
    pub kind: String,
    pub metadata: DatadogMetadata,
    #[serde(default)]
    pub spec: DatadogSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datadog: Option<DatadogIntegrations>,
}

impl DatadogEntity {
    /// An empty v3 service record
    pub fn service(name: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION_V3.to_string(),
            kind: KIND_SERVICE.to_string(),
            metadata: DatadogMetadata {
                name: name.into(),
                ..Default::default()
            },
            spec: DatadogSpec::default(),
            datadog: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatadogMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub links: Vec<DatadogLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<DatadogContact>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatadogLink {
    pub name: String,
    #[serde(rename = "type")]
    pub link_type: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatadogContact {
    pub name: String,
    #[serde(rename = "type")]
    pub contact_type: String,
    pub contact: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatadogSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatadogIntegrations {
    #[serde(default)]
    pub code_locations: Vec<CodeLocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    #[serde(rename = "repositoryURL")]
    pub repository_url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub paths: Vec<String>,
}

/// Service definition, schema v2.2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ServiceDefinition {
    pub schema_version: String,
    pub dd_service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<DatadogLink>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contacts: Option<Vec<DatadogContact>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ServiceDefinition {
    pub fn new(dd_service: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V2_2.to_string(),
            dd_service: dd_service.into(),
            team: None,
            application: None,
            description: None,
            lifecycle: None,
            links: Vec::new(),
            contacts: None,
            tags: Vec::new(),
        }
    }
}

/// Either record shape a serializer can produce
///
/// Untagged on the wire, so dry-run output is the body Datadog receives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatadogRecord {
    Entity(DatadogEntity),
    ServiceDefinition(ServiceDefinition),
}

impl DatadogRecord {
    /// Service name Datadog keys the record by
    pub fn name(&self) -> &str {
        match self {
            DatadogRecord::Entity(entity) => &entity.metadata.name,
            DatadogRecord::ServiceDefinition(definition) => &definition.dd_service,
        }
    }

    pub fn as_entity(&self) -> Option<&DatadogEntity> {
        match self {
            DatadogRecord::Entity(entity) => Some(entity),
            DatadogRecord::ServiceDefinition(_) => None,
        }
    }

    pub fn as_service_definition(&self) -> Option<&ServiceDefinition> {
        match self {
            DatadogRecord::ServiceDefinition(definition) => Some(definition),
            DatadogRecord::Entity(_) => None,
        }
    }
}

impl From<DatadogEntity> for DatadogRecord {
    fn from(entity: DatadogEntity) -> Self {
        DatadogRecord::Entity(entity)
    }
}

impl From<ServiceDefinition> for DatadogRecord {
    fn from(definition: ServiceDefinition) -> Self {
        DatadogRecord::ServiceDefinition(definition)
    }
}
