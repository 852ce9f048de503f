//! Component serializer enriched with the owning group
//!
//! Owner becomes the group's display name and the group's Slack channels
//! become Datadog contacts. Groups are fetched once per run by
//! [`GroupPreload`].

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use super::component::default_component_serializer;
use super::ExtraSerializationInfo;
use crate::catalog::entity::RELATION_OWNED_BY;
use crate::catalog::{CompoundEntityRef, Entity, EntityQuery, FilterClause, FilterValue};
use crate::datadog::{DatadogContact, DatadogEntity};
use crate::error::{SerializeError, SyncError};
use crate::sync::{Clients, Preload};

/// Fields requested for groups during preload
pub const GROUP_FIELDS: [&str; 6] = [
    "spec.contacts",
    "metadata.name",
    "metadata.title",
    "kind",
    "metadata.namespace",
    "relations",
];

const CONTACT_SLACK_CHANNEL: &str = "slack-channel";

/// Serialization settings for the team-aware serializer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamSerializationInfo {
    pub app_base_url: Option<String>,
    /// Workspace URL used to build channel links
    pub slack_base_url: Option<String>,
}

impl TeamSerializationInfo {
    pub(super) fn base(&self) -> ExtraSerializationInfo {
        ExtraSerializationInfo {
            app_base_url: self.app_base_url.clone(),
        }
    }
}

/// Groups keyed by their canonical entity ref
#[derive(Debug, Clone, Default)]
pub struct GroupIndex {
    groups: HashMap<String, Entity>,
}

impl GroupIndex {
    pub fn new(groups: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            groups: groups
                .into_iter()
                .map(|group| (group.entity_ref(), group))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Look up a group by any spelling of its ref
    pub fn get(&self, entity_ref: &str) -> Option<&Entity> {
        let canonical = CompoundEntityRef::parse(entity_ref)?.to_string();
        self.groups.get(&canonical)
    }

    /// The group owning `entity`, via its first `ownedBy` relation
    pub fn owner_of(&self, entity: &Entity) -> Option<&Entity> {
        let owner_ref = entity.relations_of_type(RELATION_OWNED_BY).next()?;
        self.get(&owner_ref.target_ref)
    }
}

/// Fetches every group once per run
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupPreload;

#[async_trait]
impl Preload<GroupIndex> for GroupPreload {
    async fn preload(&self, clients: &Clients, _entities: &[Entity]) -> Result<GroupIndex, SyncError> {
        let credentials = clients.auth.get_own_service_credentials().await?;

        let mut filter = FilterClause::new();
        filter.insert("kind".to_string(), FilterValue::from("group"));
        let query = EntityQuery {
            filter: vec![filter],
            fields: GROUP_FIELDS.iter().map(|f| f.to_string()).collect(),
        };

        let groups = clients
            .catalog
            .get_entities(&query, &credentials)
            .await
            .map_err(|e| SyncError::Preload(e.to_string()))?;

        debug!(groups = groups.len(), "Preloaded groups");
        Ok(GroupIndex::new(groups))
    }
}

#[derive(Debug, Deserialize)]
struct GroupContact {
    #[serde(rename = "type")]
    contact_type: String,
    value: String,
}

/// Slack channels of a group, without a leading `#` or `@`
///
/// `None` when the entity is not a group or has no `spec.contacts` list.
fn slack_channels(team: &Entity) -> Option<Vec<String>> {
    if !team.is_group() {
        return None;
    }
    let contacts = team.spec.get("contacts")?.as_array()?;

    Some(
        contacts
            .iter()
            .filter_map(|contact| serde_json::from_value::<GroupContact>(contact.clone()).ok())
            .filter(|contact| contact.contact_type == CONTACT_SLACK_CHANNEL)
            .map(|contact| {
                contact
                    .value
                    .strip_prefix(['#', '@'])
                    .unwrap_or(&contact.value)
                    .to_string()
            })
            .collect(),
    )
}

/// Serialize a component, taking owner and contacts from its team
pub fn serialize_component_with_team(
    entity: &Entity,
    team: Option<&Entity>,
    extra: &TeamSerializationInfo,
) -> Result<DatadogEntity, SerializeError> {
    let mut record = default_component_serializer(entity, &extra.base())?;

    let Some(team) = team else {
        return Ok(record);
    };

    record.metadata.owner = Some(team.display_name().to_string());
    record.metadata.contacts = team_contacts(team, extra);

    Ok(record)
}

/// A group's Slack channels as Datadog contacts
pub(super) fn team_contacts(
    team: &Entity,
    extra: &TeamSerializationInfo,
) -> Option<Vec<DatadogContact>> {
    let slack_base_url = extra.slack_base_url.as_deref().unwrap_or_default();
    let channels = slack_channels(team)?;

    Some(
        channels
            .into_iter()
            .map(|channel| DatadogContact {
                name: format!("#{}", channel),
                contact_type: "slack".to_string(),
                contact: format!("{}/archives/{}", slack_base_url, channel),
            })
            .collect(),
    )
}
