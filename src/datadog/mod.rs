//! Datadog software catalog API
//!
//! Records are upserted through the [`RegistryApi`] trait; [`DatadogClient`]
//! is the HTTP implementation and picks the endpoint from the record shape.

pub mod client;
pub mod models;
pub mod retry;

pub use client::DatadogClient;
pub use models::{
    CodeLocation, DatadogContact, DatadogEntity, DatadogIntegrations, DatadogLink,
    DatadogMetadata, DatadogRecord, DatadogSpec, ServiceDefinition,
};
pub use retry::RetryManager;

use async_trait::async_trait;

use crate::error::RegistryError;

/// Write access to the Datadog software catalog
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Create or replace the record, returning Datadog's response body
    async fn create_or_update(
        &self,
        record: &DatadogRecord,
    ) -> Result<serde_json::Value, RegistryError>;
}
