//! Rate-limited HTTP client for the Datadog software catalog API
//!
//! Requests are limited by a concurrency semaphore and a minimum interval
//! between requests, carry a per-request timeout, and are retried with
//! exponential backoff on transient failures.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{DatadogRecord, RegistryApi, RetryManager};
use crate::config::{DatadogHttpConfig, DatadogIntegrationConfig, RetryConfig};
use crate::error::RegistryError;

/// Upsert endpoint for v3 catalog entities
pub const ENTITY_UPSERT_PATH: &str = "/api/v2/catalog/entity";

/// Upsert endpoint for v2.2 service definitions
pub const SERVICE_DEFINITION_PATH: &str = "/api/v2/services/definitions";

/// Endpoint accepting `record`
pub fn upsert_path(record: &DatadogRecord) -> &'static str {
    match record {
        DatadogRecord::Entity(_) => ENTITY_UPSERT_PATH,
        DatadogRecord::ServiceDefinition(_) => SERVICE_DEFINITION_PATH,
    }
}

const MAX_ERROR_BODY: usize = 512;

/// Datadog API client with rate limiting and retry
#[derive(Debug)]
pub struct DatadogClient {
    client: Client,
    base_url: String,
    api_key: String,
    app_key: String,
    semaphore: Arc<Semaphore>,
    last_request: Arc<Mutex<Option<Instant>>>,
    config: DatadogHttpConfig,
    retry: RetryManager,
}

impl DatadogClient {
    /// Create a client for the configured Datadog site
    pub fn new(
        integration: &DatadogIntegrationConfig,
        http: DatadogHttpConfig,
        retry: RetryConfig,
    ) -> Result<Self, RegistryError> {
        let base_url = format!("https://api.{}", integration.site);
        Self::with_base_url(base_url, integration, http, retry)
    }

    /// Create a client against an explicit base URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        integration: &DatadogIntegrationConfig,
        http: DatadogHttpConfig,
        retry: RetryConfig,
    ) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: integration.api_key.clone(),
            app_key: integration.app_key.clone(),
            semaphore: Arc::new(Semaphore::new(http.max_concurrent.max(1))),
            last_request: Arc::new(Mutex::new(None)),
            config: http,
            retry: RetryManager::new(retry),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Number of free concurrent request slots
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    async fn post_json(
        &self,
        path: &str,
        body: &DatadogRecord,
    ) -> Result<serde_json::Value, RegistryError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        self.wait_for_interval().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, service = %body.name(), "Sending Datadog upsert");

        let response = self
            .client
            .post(&url)
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RegistryError::NetworkTimeout
                } else if e.is_connect() {
                    RegistryError::ConnectionRefused
                } else {
                    RegistryError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        match status {
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| RegistryError::Network(e.to_string()))?;
                if bytes.is_empty() {
                    return Ok(serde_json::Value::Null);
                }
                serde_json::from_slice(&bytes).map_err(|e| RegistryError::InvalidData(e.to_string()))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let wait = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(self.config.rate_limit_wait_secs);

                warn!(url = %url, retry_after = wait, "Rate limited by Datadog");
                Err(RegistryError::RateLimited(wait))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(url = %url, status = status.as_u16(), "Datadog rejected API keys");
                Err(RegistryError::Unauthorized)
            }
            status if status.is_server_error() => {
                warn!(url = %url, status = status.as_u16(), "Datadog server error");
                Err(RegistryError::ServerError(status.as_u16()))
            }
            status => {
                let mut message = response.text().await.unwrap_or_default();
                if message.len() > MAX_ERROR_BODY {
                    let mut end = MAX_ERROR_BODY;
                    while !message.is_char_boundary(end) {
                        end -= 1;
                    }
                    message.truncate(end);
                }
                Err(RegistryError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }

    /// Wait until the minimum interval since the previous request has passed
    async fn wait_for_interval(&self) {
        let min_interval = Duration::from_millis(self.config.min_interval_ms);
        if min_interval.is_zero() {
            return;
        }

        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < min_interval {
                let wait = min_interval - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "Waiting for request interval");
                drop(last);
                tokio::time::sleep(wait).await;
                last = self.last_request.lock().await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[async_trait]
impl RegistryApi for DatadogClient {
    async fn create_or_update(
        &self,
        record: &DatadogRecord,
    ) -> Result<serde_json::Value, RegistryError> {
        let path = upsert_path(record);
        self.retry.execute(|| self.post_json(path, record)).await
    }
}
