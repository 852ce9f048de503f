//! HTTP router for datadog-entity-sync
//!
//! This module defines the axum router that handles all HTTP requests.
//! It provides routes for:
//! - Health checks
//! - Dry-run serialization of a registered sync (`/serialize/:category`)
//! - Event publishing onto a sync's topic (`/events/:category`)

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::catalog::{parse_entity_filter_string, FilterClause};
use crate::error::SyncError;
use crate::events::{EventBus, EventParams};
use crate::sync::{validate_event_payload, SyncJob, SyncRegistry, SyncedEntity, TOPIC_PREFIX};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Every registered sync job
    pub registry: Arc<SyncRegistry>,

    /// Bus the jobs subscribe to
    pub events: Arc<dyn EventBus>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub syncs: Vec<String>,
}

/// Query string of `GET /serialize/:category`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializeQuery {
    #[serde(default)]
    pub entity_filter: Option<String>,
}

/// Body of `POST /serialize/:category`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializeRequest {
    pub entity_filter: FilterClause,
}

/// Response of `POST /events/:category`
#[derive(Debug, Serialize, Deserialize)]
pub struct EventAccepted {
    pub topic: String,
    pub subscribers: usize,
}

/// Errors returned to HTTP clients as `{ "error": ... }`
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("No sync registered for category '{0}'")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Sync failed: {0}")]
    Upstream(#[from] SyncError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Build the main application router
///
/// # Arguments
///
/// * `state` - Application state containing the sync registry and event bus
///
/// # Returns
///
/// An axum Router configured with all endpoints
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/serialize/:category",
            get(serialize_query_handler).post(serialize_body_handler),
        )
        .route("/events/:category", post(publish_event_handler))
        .with_state(state)
}

fn lookup(state: &AppState, category: &str) -> Result<Arc<dyn SyncJob>, ApiError> {
    state
        .registry
        .get(category)
        .ok_or_else(|| ApiError::NotFound(category.to_string()))
}

async fn dry_run(
    job: Arc<dyn SyncJob>,
    filter: FilterClause,
) -> Result<Vec<SyncedEntity>, ApiError> {
    info!(sync_id = %job.sync_id(), "Dry-run serialization requested");
    job.sync(filter, true).await.map_err(|e| {
        error!(sync_id = %job.sync_id(), error = %e, "Dry-run serialization failed");
        ApiError::from(e)
    })
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint handler
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        syncs: state.registry.sync_ids().map(str::to_string).collect(),
    })
}

/// Dry-run a sync with a `key=value,...` filter from the query string
async fn serialize_query_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    Query(query): Query<SerializeQuery>,
) -> Result<Json<Vec<SyncedEntity>>, ApiError> {
    let job = lookup(&state, &category)?;
    let filter = parse_entity_filter_string(query.entity_filter.as_deref().unwrap_or_default())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(dry_run(job, filter).await?))
}

/// Dry-run a sync with a structured filter from the request body
async fn serialize_body_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    body: Result<Json<SerializeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<SyncedEntity>>), ApiError> {
    let job = lookup(&state, &category)?;
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    Ok((
        StatusCode::CREATED,
        Json(dry_run(job, request.entity_filter).await?),
    ))
}

/// Publish `{ entityFilter, dryRun? }` onto the sync's topic
async fn publish_event_handler(
    State(state): State<AppState>,
    Path(category): Path<String>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<(StatusCode, Json<EventAccepted>), ApiError> {
    lookup(&state, &category)?;
    let Json(payload) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    if validate_event_payload(&payload).is_none() {
        return Err(ApiError::BadRequest(
            "Expected { \"entityFilter\": object, \"dryRun\"?: boolean }".to_string(),
        ));
    }

    let topic = format!("{}.{}", TOPIC_PREFIX, category);
    let subscribers = state
        .events
        .publish(EventParams {
            topic: topic.clone(),
            event_payload: payload,
        })
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(EventAccepted { topic, subscribers }),
    ))
}
