//! Component -> Datadog service definition (schema v2.2)
//!
//! Same inputs as the v3 serializers, written in the older shape accepted
//! by `/api/v2/services/definitions`.

use super::component::{
    datadog_style_links, ensure_component, labels_to_tags, service_name,
};
use super::repository::RepositoryInfo;
use super::team::team_contacts;
use super::{ExtraSerializationInfo, TeamSerializationInfo};
use crate::catalog::Entity;
use crate::datadog::ServiceDefinition;
use crate::error::SerializeError;

/// Serialize a component into a v2.2 service definition
///
/// `team` is the raw `spec.owner` and `application` the component's system.
pub fn serialize_component_to_service_definition(
    entity: &Entity,
    extra: &ExtraSerializationInfo,
) -> Result<ServiceDefinition, SerializeError> {
    ensure_component(entity)?;

    let repository = RepositoryInfo::from_entity(entity);

    let mut definition = ServiceDefinition::new(service_name(entity));
    definition.team = entity.spec_str("owner").map(str::to_string);
    definition.application = entity
        .spec_str("system")
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    definition.description = entity.metadata.description.clone();
    definition.lifecycle = entity.spec_str("lifecycle").map(str::to_string);
    definition.links = datadog_style_links(entity, repository.as_ref(), extra);
    definition.tags = labels_to_tags(entity);
    definition.tags.extend(entity.metadata.tags.iter().cloned());

    Ok(definition)
}

/// v2.2 definition owned by the resolved group
///
/// The group's name becomes the team handle and its Slack channels the
/// contacts. Without a group the plain definition is returned.
pub fn serialize_service_definition_with_team(
    entity: &Entity,
    team: Option<&Entity>,
    extra: &TeamSerializationInfo,
) -> Result<ServiceDefinition, SerializeError> {
    let mut definition = serialize_component_to_service_definition(entity, &extra.base())?;

    if let Some(team) = team {
        definition.team = Some(team.metadata.name.clone());
        definition.contacts = team_contacts(team, extra);
    }

    Ok(definition)
}
