//! Catalog entity model and entity references

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Namespace assumed when an entity or reference omits one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Relation from an entity to its owner
pub const RELATION_OWNED_BY: &str = "ownedBy";

/// Annotation pointing at the entity's source code
pub const ANNOTATION_SOURCE_LOCATION: &str = "backstage.io/source-location";

/// Annotation marking an entity as having TechDocs
pub const ANNOTATION_TECHDOCS_REF: &str = "backstage.io/techdocs-ref";

/// Annotation overriding the Datadog service name
pub const ANNOTATION_DATADOG_SERVICE_NAME: &str = "datadoghq.com/service-name";

/// A software catalog entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub api_version: String,
    pub kind: String,
    pub metadata: EntityMetadata,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub spec: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<EntityRelation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<EntityLink>,
}

/// External link attached to an entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLink {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRelation {
    #[serde(rename = "type")]
    pub relation_type: String,
    pub target_ref: String,
}

/// Parsed `backstage.io/source-location` annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Location type, usually `url`
    pub location_type: String,
    /// Location target, e.g. a repository URL
    pub target: String,
}

impl Entity {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            api_version: "backstage.io/v1alpha1".to_string(),
            kind: kind.into(),
            metadata: EntityMetadata {
                name: name.into(),
                ..Default::default()
            },
            spec: Map::new(),
            relations: Vec::new(),
        }
    }

    pub fn namespace(&self) -> &str {
        self.metadata
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    pub fn compound_ref(&self) -> CompoundEntityRef {
        CompoundEntityRef {
            kind: self.kind.clone(),
            namespace: self.namespace().to_string(),
            name: self.metadata.name.clone(),
        }
    }

    /// Canonical, fully lowercased `kind:namespace/name` reference
    pub fn entity_ref(&self) -> String {
        self.compound_ref().to_string()
    }

    /// Title if present, otherwise the name
    pub fn display_name(&self) -> &str {
        self.metadata
            .title
            .as_deref()
            .unwrap_or(&self.metadata.name)
    }

    pub fn is_component(&self) -> bool {
        self.kind.eq_ignore_ascii_case("component")
    }

    pub fn is_group(&self) -> bool {
        self.kind.eq_ignore_ascii_case("group")
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }

    /// String value of a top-level `spec` field
    pub fn spec_str(&self, key: &str) -> Option<&str> {
        self.spec.get(key).and_then(Value::as_str)
    }

    pub fn relations_of_type<'a>(
        &'a self,
        relation_type: &'a str,
    ) -> impl Iterator<Item = &'a EntityRelation> + 'a {
        self.relations
            .iter()
            .filter(move |r| r.relation_type == relation_type)
    }

    pub fn source_location(&self) -> Option<SourceLocation> {
        let value = self.annotation(ANNOTATION_SOURCE_LOCATION)?;
        let (location_type, target) = value.split_once(':')?;
        if location_type.is_empty() || target.is_empty() {
            return None;
        }
        Some(SourceLocation {
            location_type: location_type.to_string(),
            target: target.to_string(),
        })
    }
}

/// Fully qualified entity reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompoundEntityRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl CompoundEntityRef {
    /// Parse `kind:namespace/name` or `kind:name`
    ///
    /// Returns `None` when the kind or the name is missing.
    pub fn parse(entity_ref: &str) -> Option<Self> {
        let (kind, rest) = entity_ref.split_once(':')?;
        let (namespace, name) = match rest.split_once('/') {
            Some((namespace, name)) => (namespace, name),
            None => (DEFAULT_NAMESPACE, rest),
        };
        if kind.is_empty() || namespace.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for CompoundEntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.kind.to_lowercase(),
            self.namespace.to_lowercase(),
            self.name.to_lowercase()
        )
    }
}
