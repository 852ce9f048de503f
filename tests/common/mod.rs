//! Common test utilities and helpers for integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use datadog_entity_sync::catalog::{
    CatalogClient, Credentials, Entity, EntityQuery, StaticTokenAuth,
};
use datadog_entity_sync::datadog::{DatadogRecord, RegistryApi};
use datadog_entity_sync::error::{CatalogError, RegistryError};
use datadog_entity_sync::events::InMemoryEventBus;
use datadog_entity_sync::server::AppState;
use datadog_entity_sync::sync::{Clients, SyncRegistry};

/// Catalog that serves a fixed entity set and records every query
#[derive(Default)]
pub struct FakeCatalog {
    entities: Vec<Entity>,
    groups: Vec<Entity>,
    queries: Mutex<Vec<EntityQuery>>,
}

impl FakeCatalog {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities,
            ..Default::default()
        }
    }

    /// Groups are served to field-restricted (preload) queries
    pub fn with_groups(mut self, groups: Vec<Entity>) -> Self {
        self.groups = groups;
        self
    }

    pub fn queries(&self) -> Vec<EntityQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogClient for FakeCatalog {
    async fn get_entities(
        &self,
        query: &EntityQuery,
        _credentials: &Credentials,
    ) -> Result<Vec<Entity>, CatalogError> {
        self.queries.lock().unwrap().push(query.clone());
        if query.fields.is_empty() {
            Ok(self.entities.clone())
        } else {
            Ok(self.groups.clone())
        }
    }
}

/// Registry that records pushed records and rejects configured names
#[derive(Default)]
pub struct RecordingRegistry {
    pushed: Mutex<Vec<DatadogRecord>>,
    rejected: HashSet<String>,
}

impl RecordingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(names: &[&str]) -> Self {
        Self {
            rejected: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn pushed(&self) -> Vec<DatadogRecord> {
        self.pushed.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.pushed.lock().unwrap().len()
    }
}

#[async_trait]
impl RegistryApi for RecordingRegistry {
    async fn create_or_update(
        &self,
        record: &DatadogRecord,
    ) -> Result<serde_json::Value, RegistryError> {
        self.pushed.lock().unwrap().push(record.clone());
        if self.rejected.contains(record.name()) {
            return Err(RegistryError::Rejected {
                status: 400,
                message: "rejected".to_string(),
            });
        }
        Ok(json!({ "data": [{ "attributes": { "name": record.name() } }] }))
    }
}

/// Shared collaborators plus handles to the fakes behind them
pub struct TestClients {
    pub clients: Clients,
    pub catalog: Arc<FakeCatalog>,
    pub registry: Arc<RecordingRegistry>,
    pub events: Arc<InMemoryEventBus>,
}

pub fn create_test_clients(catalog: FakeCatalog, registry: RecordingRegistry) -> TestClients {
    let catalog = Arc::new(catalog);
    let registry = Arc::new(registry);
    let events = Arc::new(InMemoryEventBus::new());

    TestClients {
        clients: Clients {
            catalog: catalog.clone(),
            registry: registry.clone(),
            auth: Arc::new(StaticTokenAuth::new(Some("test-token".to_string()))),
            events: events.clone(),
        },
        catalog,
        registry,
        events,
    }
}

/// A component owned by `group:default/<owner>`
pub fn component(name: &str, owner: &str) -> Entity {
    serde_json::from_value(json!({
        "apiVersion": "backstage.io/v1alpha1",
        "kind": "Component",
        "metadata": { "name": name },
        "spec": { "type": "service", "lifecycle": "production" },
        "relations": [{ "type": "ownedBy", "targetRef": format!("group:default/{}", owner) }]
    }))
    .expect("valid component")
}

/// The example APM service used throughout the sync tests
pub fn example_apm_service() -> Entity {
    serde_json::from_value(json!({
        "apiVersion": "backstage.io/v1alpha1",
        "kind": "Component",
        "metadata": {
            "name": "datadog-example-apm-service",
            "title": "Datadog Apm Service",
            "annotations": {
                "datadoghq.com/service-name": "datadog-example-apm-service",
                "backstage.io/techdocs-ref": "./"
            }
        },
        "spec": {
            "type": "service",
            "system": "datadog-example",
            "lifecycle": "experimental"
        },
        "relations": [{ "type": "ownedBy", "targetRef": "group:default/example-team" }]
    }))
    .expect("valid component")
}

pub fn create_test_state(registry: SyncRegistry, events: Arc<InMemoryEventBus>) -> AppState {
    AppState {
        registry: Arc::new(registry),
        events,
    }
}

/// Run a test server in the background and return the address
/// The server will be shut down when the returned shutdown sender is dropped or sent
pub async fn run_test_server(
    state: AppState,
) -> (std::net::SocketAddr, tokio::sync::oneshot::Sender<()>) {
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to get local address");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let app = datadog_entity_sync::server::build_app(state);

    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server error");
    });

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    (addr, shutdown_tx)
}
