//! Software catalog access
//!
//! The sync engine reads entities through the [`CatalogClient`] trait and
//! authenticates with credentials from an [`AuthProvider`].

pub mod entity;
pub mod filter;
pub mod http;

pub use entity::{CompoundEntityRef, Entity, EntityLink, EntityMetadata, EntityRelation};
pub use filter::{
    merge_entity_filters, parse_entity_filter_string, EntityFilterQuery, FilterClause,
    FilterValue, CATALOG_FILTER_EXISTS,
};
pub use http::HttpCatalogClient;

use async_trait::async_trait;

use crate::error::{AuthError, CatalogError};

/// Credentials the service presents to the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Bearer token; empty means unauthenticated
    pub token: String,
}

/// Entity query sent to the catalog
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityQuery {
    /// Clauses OR-ed together
    pub filter: Vec<FilterClause>,
    /// Restrict returned fields; empty returns whole entities
    pub fields: Vec<String>,
}

/// Read access to catalog entities
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Fetch every entity matching the query
    async fn get_entities(
        &self,
        query: &EntityQuery,
        credentials: &Credentials,
    ) -> Result<Vec<Entity>, CatalogError>;
}

/// Source of the service's own credentials
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn get_own_service_credentials(&self) -> Result<Credentials, AuthError>;
}

/// Auth provider backed by a configured static token
#[derive(Debug, Clone)]
pub struct StaticTokenAuth {
    token: Option<String>,
}

impl StaticTokenAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn get_own_service_credentials(&self) -> Result<Credentials, AuthError> {
        Ok(Credentials {
            token: self.token.clone().unwrap_or_default(),
        })
    }
}
