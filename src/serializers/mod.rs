//! Entity -> Datadog record transforms
//!
//! Serializers are pure functions of an entity and an optional preloaded
//! context. The `*_serializer` functions wrap them as the boxed
//! [`SerializeFn`] the sync engine stores; [`RecordFormat`] picks between the
//! v3 entity and the v2.2 service definition.

pub mod component;
pub mod repository;
pub mod service_definition;
pub mod team;

pub use component::default_component_serializer;
pub use repository::RepositoryInfo;
pub use service_definition::{
    serialize_component_to_service_definition, serialize_service_definition_with_team,
};
pub use team::{serialize_component_with_team, GroupIndex, GroupPreload, TeamSerializationInfo};

use std::sync::Arc;

use crate::catalog::Entity;
use crate::config::RecordFormat;
use crate::datadog::DatadogRecord;
use crate::sync::SerializeFn;

/// Context shared by the component serializers
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraSerializationInfo {
    /// Catalog frontend URL for Backstage and TechDocs links
    pub app_base_url: Option<String>,
}

/// Component serializer that ignores any preloaded context
pub fn component_serializer<P: 'static>(extra: ExtraSerializationInfo) -> SerializeFn<P> {
    formatted_component_serializer(RecordFormat::V3, extra)
}

/// Component serializer writing `format`
pub fn formatted_component_serializer<P: 'static>(
    format: RecordFormat,
    extra: ExtraSerializationInfo,
) -> SerializeFn<P> {
    Arc::new(move |entity: &Entity, _preload: Option<&P>| match format {
        RecordFormat::V3 => default_component_serializer(entity, &extra).map(DatadogRecord::from),
        RecordFormat::V2_2 => {
            serialize_component_to_service_definition(entity, &extra).map(DatadogRecord::from)
        }
    })
}

/// Component serializer resolving the owner from a [`GroupIndex`]
pub fn team_serializer(extra: TeamSerializationInfo) -> SerializeFn<GroupIndex> {
    formatted_team_serializer(RecordFormat::V3, extra)
}

/// Team-aware serializer writing `format`
pub fn formatted_team_serializer(
    format: RecordFormat,
    extra: TeamSerializationInfo,
) -> SerializeFn<GroupIndex> {
    Arc::new(move |entity: &Entity, groups: Option<&GroupIndex>| {
        let team = groups.and_then(|groups| groups.owner_of(entity));
        match format {
            RecordFormat::V3 => {
                serialize_component_with_team(entity, team, &extra).map(DatadogRecord::from)
            }
            RecordFormat::V2_2 => {
                serialize_service_definition_with_team(entity, team, &extra).map(DatadogRecord::from)
            }
        }
    })
}
