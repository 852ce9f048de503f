//! Entity sync engine
//!
//! One [`EntitySync`] per configured job. A run fetches the filtered entity
//! set, computes the optional preload once, then serializes and pushes the
//! entities chunk by chunk under the job's rate limit. A failing entity is
//! logged and left out of the result; only the fetch and the preload can
//! fail a run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::pacer::{by_chunk, RateLimit};
use super::progress::ProgressTracker;
use super::scheduler::ScheduledJob;
use crate::catalog::{
    merge_entity_filters, AuthProvider, CatalogClient, Entity, EntityFilterQuery, EntityQuery,
    FilterClause,
};
use crate::config::ConfigError;
use crate::datadog::{DatadogRecord, RegistryApi};
use crate::error::{RegistryError, SerializeError, SyncError};
use crate::events::{EventBus, EventParams, EventSubscriber, EventSubscription};
use crate::otel::SyncMetrics;

/// Topic prefix for event-triggered runs
pub const TOPIC_PREFIX: &str = "datadog-entity-sync";

/// Entity -> record transform with access to the run's preload
pub type SerializeFn<P> =
    Arc<dyn Fn(&Entity, Option<&P>) -> Result<DatadogRecord, SerializeError> + Send + Sync>;

/// Computes auxiliary data once per run
#[async_trait]
pub trait Preload<P>: Send + Sync {
    async fn preload(&self, clients: &Clients, entities: &[Entity]) -> Result<P, SyncError>;
}

/// External collaborators shared by every job
#[derive(Clone)]
pub struct Clients {
    pub catalog: Arc<dyn CatalogClient>,
    pub registry: Arc<dyn RegistryApi>,
    pub auth: Arc<dyn AuthProvider>,
    pub events: Arc<dyn EventBus>,
}

/// Construction options of an [`EntitySync`]
pub struct EntitySyncOptions<P> {
    pub sync_id: String,
    /// Defaults to all components
    pub entity_filter: Option<EntityFilterQuery>,
    /// Defaults to 300 per hour
    pub rate_limit: Option<RateLimit>,
    /// Records are only pushed when enabled
    pub enabled: bool,
    /// Defaults to the component serializer without extra context
    pub serialize: Option<SerializeFn<P>>,
    pub preload: Option<Arc<dyn Preload<P>>>,
    pub metrics: Option<Arc<SyncMetrics>>,
}

impl<P: 'static> EntitySyncOptions<P> {
    pub fn new(sync_id: impl Into<String>) -> Self {
        Self {
            sync_id: sync_id.into(),
            entity_filter: None,
            rate_limit: None,
            enabled: false,
            serialize: None,
            preload: None,
            metrics: None,
        }
    }

    pub fn entity_filter(mut self, filter: EntityFilterQuery) -> Self {
        self.entity_filter = Some(filter);
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn serialize(mut self, serialize: SerializeFn<P>) -> Self {
        self.serialize = Some(serialize);
        self
    }

    pub fn preload(mut self, preload: Arc<dyn Preload<P>>) -> Self {
        self.preload = Some(preload);
        self
    }

    pub fn metrics(mut self, metrics: Arc<SyncMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// One item of a sync result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SyncedEntity {
    /// Record produced but not pushed
    Simulated(DatadogRecord),
    /// Datadog's response to the upsert
    Pushed(serde_json::Value),
}

/// Payload accepted on a job's topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSyncRequest {
    pub entity_filter: FilterClause,
    #[serde(default)]
    pub dry_run: bool,
}

/// Parse an event payload; the `entityFilter` member must be an object
pub fn validate_event_payload(payload: &serde_json::Value) -> Option<EventSyncRequest> {
    let object = payload.as_object()?;
    if !object.get("entityFilter")?.is_object() {
        return None;
    }
    serde_json::from_value(payload.clone()).ok()
}

#[derive(Debug, Error)]
enum EntityFailure {
    #[error(transparent)]
    Serialize(#[from] SerializeError),
    #[error(transparent)]
    Push(#[from] RegistryError),
}

impl EntityFailure {
    fn stage(&self) -> &'static str {
        match self {
            EntityFailure::Serialize(_) => "serialize",
            EntityFailure::Push(_) => "push",
        }
    }
}

/// Object-safe view of a sync job used by the registry and HTTP layer
#[async_trait]
pub trait SyncJob: Send + Sync {
    fn sync_id(&self) -> &str;

    fn enabled(&self) -> bool;

    async fn sync(
        &self,
        filter_override: FilterClause,
        dry_run: bool,
    ) -> Result<Vec<SyncedEntity>, SyncError>;
}

/// Scheduled and event-triggered sync of catalog entities into Datadog
pub struct EntitySync<P> {
    sync_id: String,
    topic: String,
    enabled: bool,
    entity_filter: EntityFilterQuery,
    rate_limit: RateLimit,
    serialize: SerializeFn<P>,
    preload: Option<Arc<dyn Preload<P>>>,
    metrics: Option<Arc<SyncMetrics>>,
    clients: Clients,
}

impl<P: Send + Sync + 'static> EntitySync<P> {
    /// Build the job and subscribe it to `datadog-entity-sync.<syncId>`
    pub fn new(clients: Clients, options: EntitySyncOptions<P>) -> Result<Arc<Self>, ConfigError> {
        if options.sync_id.is_empty() {
            return Err(ConfigError::MissingRequired("sync_id".to_string()));
        }
        let rate_limit = options.rate_limit.unwrap_or_default();
        rate_limit
            .validate()
            .map_err(|e| ConfigError::InvalidValue(format!("{}: {}", options.sync_id, e)))?;

        let serialize = options.serialize.unwrap_or_else(default_serializer);
        let topic = format!("{}.{}", TOPIC_PREFIX, options.sync_id);

        let sync = Arc::new(Self {
            sync_id: options.sync_id,
            topic,
            enabled: options.enabled,
            entity_filter: options.entity_filter.unwrap_or_default(),
            rate_limit,
            serialize,
            preload: options.preload,
            metrics: options.metrics,
            clients,
        });

        sync.clients.events.subscribe(EventSubscription {
            id: sync.sync_id.clone(),
            topics: vec![sync.topic.clone()],
            handler: Arc::new(SyncEventHandler {
                sync: Arc::downgrade(&sync),
            }),
        });

        Ok(sync)
    }

    pub fn sync_id(&self) -> &str {
        &self.sync_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn rate_limit(&self) -> &RateLimit {
        &self.rate_limit
    }

    /// Run once
    ///
    /// Records are pushed only when the job is enabled and `dry_run` is
    /// false; otherwise the serialized records are returned unpushed.
    pub async fn sync(
        &self,
        filter_override: FilterClause,
        dry_run: bool,
    ) -> Result<Vec<SyncedEntity>, SyncError> {
        let span = info_span!("entity_sync", sync_id = %self.sync_id, dry_run);
        let started = Instant::now();
        let result = self.run(filter_override, dry_run).instrument(span).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_run_duration(&self.sync_id, started.elapsed().as_secs_f64());
            if result.is_err() {
                metrics.record_run_failed(&self.sync_id);
            }
        }
        result
    }

    async fn run(
        &self,
        filter_override: FilterClause,
        dry_run: bool,
    ) -> Result<Vec<SyncedEntity>, SyncError> {
        let tracker = ProgressTracker::new();
        let simulate = !self.enabled || dry_run;
        let filter = merge_entity_filters(&filter_override, &self.entity_filter);

        let credentials = self.clients.auth.get_own_service_credentials().await?;
        let entities = self
            .clients
            .catalog
            .get_entities(
                &EntityQuery {
                    filter,
                    fields: Vec::new(),
                },
                &credentials,
            )
            .await?;

        let elapsed = tracker.step();
        info!(
            count = entities.len(),
            step_time_ms = elapsed.step_ms,
            total_time_ms = elapsed.total_ms,
            "Fetched entities"
        );

        let preload = self.run_preload(&entities).await?;
        let elapsed = tracker.step();
        debug!(
            step_time_ms = elapsed.step_ms,
            total_time_ms = elapsed.total_ms,
            "Preload complete"
        );

        let synced = by_chunk(&entities, &self.rate_limit, |chunk| {
            self.sync_chunk(chunk, preload.as_ref(), simulate, &tracker)
        })
        .await;

        let elapsed = tracker.step();
        info!(
            synced = synced.len(),
            failed = entities.len() - synced.len(),
            simulated = simulate,
            total_time_ms = elapsed.total_ms,
            "Sync run complete"
        );

        Ok(synced)
    }

    async fn run_preload(&self, entities: &[Entity]) -> Result<Option<P>, SyncError> {
        match &self.preload {
            Some(preload) => preload.preload(&self.clients, entities).await.map(Some),
            None => {
                debug!("There was no preload function defined");
                Ok(None)
            }
        }
    }

    async fn sync_chunk(
        &self,
        chunk: &[Entity],
        preload: Option<&P>,
        simulate: bool,
        tracker: &ProgressTracker,
    ) -> Vec<SyncedEntity> {
        let mut synced = Vec::with_capacity(chunk.len());

        for entity in chunk {
            let entity_ref = entity.entity_ref();
            match self.sync_entity(entity, preload, simulate).await {
                Ok(item) => synced.push(item),
                Err(err) => {
                    error!(
                        entity_ref = %entity_ref,
                        stage = err.stage(),
                        error = %err,
                        "An issue occurred with creating a datadog service definition."
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.record_failed(&self.sync_id, err.stage());
                    }
                }
            }
        }

        let elapsed = tracker.step();
        info!(
            chunk_size = chunk.len(),
            synced = synced.len(),
            step_time_ms = elapsed.step_ms,
            total_time_ms = elapsed.total_ms,
            "Processed chunk"
        );
        synced
    }

    async fn sync_entity(
        &self,
        entity: &Entity,
        preload: Option<&P>,
        simulate: bool,
    ) -> Result<SyncedEntity, EntityFailure> {
        let record = (self.serialize)(entity, preload)?;

        if simulate {
            info!(
                entity_ref = %entity.entity_ref(),
                "The entity {} was not synced due to the sync being disabled.",
                entity.display_name()
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_simulated(&self.sync_id);
            }
            return Ok(SyncedEntity::Simulated(record));
        }

        let response = self.clients.registry.create_or_update(&record).await?;
        if let Some(metrics) = &self.metrics {
            metrics.record_synced(&self.sync_id);
        }
        Ok(SyncedEntity::Pushed(response))
    }

    /// Validate an event and start a run in the background
    ///
    /// Invalid payloads are logged and dropped.
    pub fn handle_event(self: &Arc<Self>, params: EventParams) -> Option<JoinHandle<()>> {
        let Some(request) = validate_event_payload(&params.event_payload) else {
            warn!(
                sync_id = %self.sync_id,
                topic = %params.topic,
                "The event was invalid and will be ignored"
            );
            return None;
        };

        info!(sync_id = %self.sync_id, dry_run = request.dry_run, "Event triggered sync");
        let sync = Arc::clone(self);
        Some(tokio::spawn(async move {
            if let Err(err) = sync.sync(request.entity_filter, request.dry_run).await {
                error!(sync_id = %sync.sync_id, error = %err, "Event triggered sync failed");
            }
        }))
    }
}

fn default_serializer<P: 'static>() -> SerializeFn<P> {
    crate::serializers::component_serializer(Default::default())
}

struct SyncEventHandler<P> {
    sync: Weak<EntitySync<P>>,
}

#[async_trait]
impl<P: Send + Sync + 'static> EventSubscriber for SyncEventHandler<P> {
    async fn on_event(&self, params: EventParams) {
        match self.sync.upgrade() {
            Some(sync) => {
                sync.handle_event(params);
            }
            None => debug!(topic = %params.topic, "Sync job dropped; ignoring event"),
        }
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> SyncJob for EntitySync<P> {
    fn sync_id(&self) -> &str {
        &self.sync_id
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn sync(
        &self,
        filter_override: FilterClause,
        dry_run: bool,
    ) -> Result<Vec<SyncedEntity>, SyncError> {
        EntitySync::sync(self, filter_override, dry_run).await
    }
}

#[async_trait]
impl<P: Send + Sync + 'static> ScheduledJob for EntitySync<P> {
    async fn scheduled_sync(&self) -> Result<(), SyncError> {
        EntitySync::sync(self, FilterClause::new(), false)
            .await
            .map(|_| ())
    }
}
