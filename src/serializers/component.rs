//! Baseline component -> Datadog service transform

use super::repository::RepositoryInfo;
use super::ExtraSerializationInfo;
use crate::catalog::entity::{
    ANNOTATION_DATADOG_SERVICE_NAME, ANNOTATION_TECHDOCS_REF, RELATION_OWNED_BY,
};
use crate::catalog::{CompoundEntityRef, Entity};
use crate::datadog::models::LINK_TYPES;
use crate::datadog::{CodeLocation, DatadogEntity, DatadogIntegrations, DatadogLink};
use crate::error::SerializeError;

pub(super) fn ensure_component(entity: &Entity) -> Result<(), SerializeError> {
    if entity.is_component() {
        Ok(())
    } else {
        Err(SerializeError::NotAComponent(entity.entity_ref()))
    }
}

/// Labels as `key:value`, then `system:<system>`
pub(super) fn labels_to_tags(entity: &Entity) -> Vec<String> {
    let mut tags: Vec<String> = entity
        .metadata
        .labels
        .iter()
        .map(|(key, value)| format!("{}:{}", key, value))
        .collect();

    if let Some(system) = entity.spec_str("system").filter(|s| !s.is_empty()) {
        tags.push(format!("system:{}", system));
    }

    tags
}

/// Service name annotation, falling back to the entity name
pub(super) fn service_name(entity: &Entity) -> &str {
    entity
        .annotation(ANNOTATION_DATADOG_SERVICE_NAME)
        .unwrap_or(&entity.metadata.name)
}

pub(super) fn datadog_style_links(
    entity: &Entity,
    repository: Option<&RepositoryInfo>,
    extra: &ExtraSerializationInfo,
) -> Vec<DatadogLink> {
    let mut links: Vec<DatadogLink> = entity
        .metadata
        .links
        .iter()
        .filter_map(|link| {
            let title = link.title.as_deref().filter(|t| !t.is_empty())?;
            if link.url.is_empty() {
                return None;
            }
            let link_type = link
                .link_type
                .as_deref()
                .filter(|t| LINK_TYPES.contains(t))
                .unwrap_or("other");
            Some(DatadogLink {
                name: title.to_string(),
                link_type: link_type.to_string(),
                url: link.url.clone(),
                provider: None,
            })
        })
        .collect();

    if let Some(base_url) = extra.app_base_url.as_deref().filter(|u| !u.is_empty()) {
        let CompoundEntityRef {
            kind,
            namespace,
            name,
        } = entity.compound_ref();

        links.push(DatadogLink {
            name: "Backstage".to_string(),
            link_type: "doc".to_string(),
            url: format!("{}/catalog/{}/{}/{}", base_url, namespace, kind, name),
            provider: Some("backstage".to_string()),
        });

        if entity.annotation(ANNOTATION_TECHDOCS_REF).is_some() {
            links.push(DatadogLink {
                name: "TechDocs".to_string(),
                link_type: "doc".to_string(),
                url: format!("{}/docs/{}/{}/{}", base_url, namespace, kind, name),
                provider: Some("backstage".to_string()),
            });
        }
    }

    if let Some(repository) = repository {
        links.push(DatadogLink {
            name: "Source".to_string(),
            link_type: "repo".to_string(),
            url: repository.url.clone(),
            provider: Some(repository.provider.clone()),
        });
    }

    links
}

/// Serialize a component into a Datadog v3 service record
///
/// Fails with [`SerializeError::NotAComponent`] for any other kind.
pub fn default_component_serializer(
    entity: &Entity,
    extra: &ExtraSerializationInfo,
) -> Result<DatadogEntity, SerializeError> {
    ensure_component(entity)?;

    let repository = RepositoryInfo::from_entity(entity);

    let mut record = DatadogEntity::service(service_name(entity));
    record.metadata.description = entity.metadata.description.clone();
    record.metadata.owner = entity
        .relations_of_type(RELATION_OWNED_BY)
        .next()
        .map(|relation| match CompoundEntityRef::parse(&relation.target_ref) {
            Some(owner) => owner.name,
            None => relation.target_ref.clone(),
        });

    record.metadata.tags = labels_to_tags(entity);
    record
        .metadata
        .tags
        .extend(entity.metadata.tags.iter().cloned());
    record.metadata.links = datadog_style_links(entity, repository.as_ref(), extra);
    record.spec.lifecycle = entity.spec_str("lifecycle").map(str::to_string);

    record.datadog = repository.map(|repository| DatadogIntegrations {
        code_locations: vec![CodeLocation {
            repository_url: repository.repository_url,
            paths: vec![repository.path],
        }],
    });

    Ok(record)
}
