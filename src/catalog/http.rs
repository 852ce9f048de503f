//! HTTP client for the catalog backend's `entities/by-query` endpoint

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CatalogClient, Credentials, Entity, EntityQuery, FilterClause, FilterValue};
use crate::config::CatalogConfig;
use crate::error::CatalogError;

const QUERY_PATH: &str = "/api/catalog/entities/by-query";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryEntitiesResponse {
    #[serde(default)]
    items: Vec<Entity>,
    #[serde(default)]
    page_info: PageInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Catalog client over HTTP with cursor pagination
#[derive(Debug, Clone)]
pub struct HttpCatalogClient {
    client: Client,
    base_url: String,
    page_limit: usize,
}

impl HttpCatalogClient {
    pub fn new(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &CatalogConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_limit: config.page_limit,
        }
    }

    async fn fetch_page(
        &self,
        params: &[(String, String)],
        credentials: &Credentials,
    ) -> Result<QueryEntitiesResponse, CatalogError> {
        let url = format!("{}{}", self.base_url, QUERY_PATH);
        let mut request = self.client.get(&url).query(params);
        if !credentials.token.is_empty() {
            request = request.bearer_auth(&credentials.token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::Network(format!("timeout: {}", e))
            } else {
                CatalogError::Network(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::OK => response
                .json::<QueryEntitiesResponse>()
                .await
                .map_err(|e| CatalogError::InvalidData(e.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(url = %url, status = response.status().as_u16(), "Catalog rejected credentials");
                Err(CatalogError::Unauthorized)
            }
            status => {
                warn!(url = %url, status = status.as_u16(), "Unexpected catalog status");
                Err(CatalogError::Status(status.as_u16()))
            }
        }
    }
}

/// Encode a clause as one `filter` parameter value
///
/// Any-of values repeat the key; the existence predicate is a bare key.
pub(crate) fn encode_filter_clause(clause: &FilterClause) -> String {
    let mut parts = Vec::new();
    for (key, value) in clause {
        match value {
            FilterValue::Equals(v) => parts.push(format!("{}={}", key, v)),
            FilterValue::AnyOf(values) => {
                parts.extend(values.iter().map(|v| format!("{}={}", key, v)))
            }
            FilterValue::Exists => parts.push(key.clone()),
        }
    }
    parts.join(",")
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get_entities(
        &self,
        query: &EntityQuery,
        credentials: &Credentials,
    ) -> Result<Vec<Entity>, CatalogError> {
        let mut base_params: Vec<(String, String)> = vec![(
            "limit".to_string(),
            self.page_limit.to_string(),
        )];
        let mut first_page = base_params.clone();
        first_page.extend(
            query
                .filter
                .iter()
                .map(|clause| ("filter".to_string(), encode_filter_clause(clause))),
        );
        if !query.fields.is_empty() {
            first_page.push(("fields".to_string(), query.fields.join(",")));
        }

        let mut entities = Vec::new();
        let mut page = self.fetch_page(&first_page, credentials).await?;

        loop {
            entities.append(&mut page.items);
            let Some(cursor) = page.page_info.next_cursor.take() else {
                break;
            };
            debug!(fetched = entities.len(), "Fetching next catalog page");
            base_params.truncate(1);
            base_params.push(("cursor".to_string(), cursor));
            page = self.fetch_page(&base_params, credentials).await?;
        }

        debug!(count = entities.len(), "Fetched catalog entities");
        Ok(entities)
    }
}
