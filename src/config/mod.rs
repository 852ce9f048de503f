//! Configuration management for datadog-entity-sync
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::catalog::EntityFilterQuery;
use crate::sync::RateLimit;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Frontend application settings used for generated links
    #[serde(default)]
    pub app: AppConfig,

    /// Software catalog connection
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Datadog integration and sync job definitions
    #[serde(default)]
    pub datadog: DatadogConfig,

    /// Slack workspace settings used for team contacts
    #[serde(default)]
    pub slack: SlackConfig,

    /// OpenTelemetry configuration
    #[serde(default)]
    pub otel: OtelConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables
    ///
    /// Server and catalog settings use the `DATADOG_ENTITY_SYNC_` prefix; the
    /// Datadog keys use the conventional `DD_API_KEY`, `DD_APP_KEY` and
    /// `DD_SITE`. No sync jobs are defined this way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("DATADOG_ENTITY_SYNC_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("DATADOG_ENTITY_SYNC_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        if let Ok(base_url) = std::env::var("DATADOG_ENTITY_SYNC_CATALOG_BASE_URL") {
            config.catalog.base_url = base_url;
        }
        if let Ok(token) = std::env::var("DATADOG_ENTITY_SYNC_CATALOG_TOKEN") {
            config.catalog.token = Some(token);
        }
        if let Ok(base_url) = std::env::var("DATADOG_ENTITY_SYNC_APP_BASE_URL") {
            config.app.base_url = Some(base_url);
        }

        if let Ok(api_key) = std::env::var("DD_API_KEY") {
            config.datadog.integration.api_key = api_key;
        }
        if let Ok(app_key) = std::env::var("DD_APP_KEY") {
            config.datadog.integration.app_key = app_key;
        }
        if let Ok(site) = std::env::var("DD_SITE") {
            config.datadog.integration.site = site;
        }

        if let Ok(enabled) = std::env::var("DATADOG_ENTITY_SYNC_OTEL_ENABLED") {
            config.otel.enabled = enabled.parse().unwrap_or(false);
        }
        if let Ok(endpoint) = std::env::var("DATADOG_ENTITY_SYNC_OTEL_ENDPOINT") {
            config.otel.endpoint = Some(endpoint);
        }

        Ok(config)
    }
}

/// A duration written as a sum of named units, e.g. `{ minutes: 30 }`
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HumanDuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weeks: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milliseconds: Option<u64>,
}

impl HumanDuration {
    pub fn hours(hours: u64) -> Self {
        Self {
            hours: Some(hours),
            ..Default::default()
        }
    }

    pub fn minutes(minutes: u64) -> Self {
        Self {
            minutes: Some(minutes),
            ..Default::default()
        }
    }

    pub fn seconds(seconds: u64) -> Self {
        Self {
            seconds: Some(seconds),
            ..Default::default()
        }
    }

    pub fn milliseconds(milliseconds: u64) -> Self {
        Self {
            milliseconds: Some(milliseconds),
            ..Default::default()
        }
    }

    /// Sum of all units
    ///
    /// Saturates at `u64::MAX` seconds instead of overflowing.
    pub fn to_duration(&self) -> Duration {
        let units = [
            (self.weeks, 7 * 24 * 3600),
            (self.days, 24 * 3600),
            (self.hours, 3600),
            (self.minutes, 60),
            (self.seconds, 1),
        ];
        let secs = units.iter().fold(0u64, |acc, (value, scale)| {
            acc.saturating_add(value.unwrap_or(0).saturating_mul(*scale))
        });
        Duration::from_secs(secs)
            .saturating_add(Duration::from_millis(self.milliseconds.unwrap_or(0)))
    }

    pub fn is_zero(&self) -> bool {
        self.to_duration().is_zero()
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7008
}

/// Frontend application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Base URL of the catalog frontend, used for Backstage and TechDocs links
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Software catalog connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogConfig {
    /// Base URL of the catalog backend
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,

    /// Static service token presented to the catalog
    #[serde(default)]
    pub token: Option<String>,

    /// Page size for entity queries
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            token: None,
            page_limit: default_page_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_catalog_base_url() -> String {
    "http://localhost:7007".to_string()
}

fn default_page_limit() -> usize {
    500
}

fn default_timeout_secs() -> u64 {
    30
}

/// Datadog settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DatadogConfig {
    /// API credentials and site
    #[serde(default)]
    pub integration: DatadogIntegrationConfig,

    /// HTTP client behaviour
    #[serde(default)]
    pub http: DatadogHttpConfig,

    /// Retry behaviour for failed upserts
    #[serde(default)]
    pub retry: RetryConfig,

    /// Sync job definitions keyed by sync id
    #[serde(default)]
    pub sync: BTreeMap<String, SyncConfig>,
}

/// Datadog API credentials
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatadogIntegrationConfig {
    /// API key
    #[serde(default)]
    pub api_key: String,

    /// Application key
    #[serde(default)]
    pub app_key: String,

    /// Datadog site, e.g. `datadoghq.eu`
    #[serde(default = "default_site")]
    pub site: String,
}

impl Default for DatadogIntegrationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            app_key: String::new(),
            site: default_site(),
        }
    }
}

fn default_site() -> String {
    "datadoghq.com".to_string()
}

/// HTTP client settings for the Datadog API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatadogHttpConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of concurrent requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Minimum interval between requests in milliseconds
    #[serde(default)]
    pub min_interval_ms: u64,

    /// Wait time reported when Datadog rate limits without Retry-After (seconds)
    #[serde(default = "default_rate_limit_wait")]
    pub rate_limit_wait_secs: u64,
}

impl Default for DatadogHttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            min_interval_ms: 0,
            rate_limit_wait_secs: default_rate_limit_wait(),
        }
    }
}

fn default_max_concurrent() -> usize {
    2
}

fn default_rate_limit_wait() -> u64 {
    60
}

/// Retry configuration for external API calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Whether to add jitter to backoff
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> bool {
    true
}

/// A single sync job definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// When the job runs
    pub schedule: ScheduleConfig,

    /// Entities to sync; defaults to all components
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_filter: Option<EntityFilterQuery>,

    /// Pacing of upserts; defaults to 300 per hour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,

    /// Whether records are actually pushed to Datadog
    #[serde(default)]
    pub enabled: bool,

    /// Record shape written for this job
    #[serde(default)]
    pub format: RecordFormat,
}

/// Shape of the records a sync writes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordFormat {
    /// Software catalog entity, upserted at `/api/v2/catalog/entity`
    #[default]
    #[serde(rename = "v3")]
    V3,
    /// Service definition, upserted at `/api/v2/services/definitions`
    #[serde(rename = "v2.2")]
    V2_2,
}

/// Task schedule for a sync job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    /// Pause between the end of one run and the start of the next
    pub frequency: HumanDuration,

    /// Upper bound on a single run
    pub timeout: HumanDuration,

    /// Delay before the first run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_delay: Option<HumanDuration>,

    /// Upper bound of the random delay added to each interval
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jitter: Option<HumanDuration>,
}

/// Slack workspace settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SlackConfig {
    /// Workspace URL, e.g. `https://acme.slack.com`
    #[serde(default)]
    pub base_url: Option<String>,
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OtelConfig {
    /// Whether OpenTelemetry is enabled
    #[serde(default)]
    pub enabled: bool,

    /// OTLP endpoint URL
    pub endpoint: Option<String>,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            service_name: default_service_name(),
        }
    }
}

fn default_service_name() -> String {
    "datadog-entity-sync".to_string()
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format, `json` or `pretty`
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Configuration error types
#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum ConfigError {
    /// Error reading configuration file
    #[error("Failed to read configuration file: {0}")]
    FileRead(String),

    /// Error parsing configuration
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax; unknown variables are left untouched.
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FilterValue;

    #[test]
    fn test_parse_complete_yaml_config() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9090

app:
  base_url: "https://backstage.example.com"

catalog:
  base_url: "http://catalog:7007"
  token: "service-token"
  page_limit: 100

datadog:
  integration:
    api_key: "api"
    app_key: "app"
    site: "datadoghq.eu"
  http:
    timeout_secs: 10
    max_concurrent: 4
  retry:
    max_retries: 5
  sync:
    datadog-service-from-component:
      schedule:
        frequency: { minutes: 30 }
        timeout: { minutes: 10 }
        initial_delay: { seconds: 15 }
      entity_filter:
        kind: component
        spec.type: service
      rate_limit:
        count: 100
        interval: { minutes: 1 }
      enabled: true

slack:
  base_url: "https://acme.slack.com"

logging:
  level: "debug"
  format: "pretty"
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(
            config.app.base_url.as_deref(),
            Some("https://backstage.example.com")
        );
        assert_eq!(config.catalog.base_url, "http://catalog:7007");
        assert_eq!(config.catalog.token.as_deref(), Some("service-token"));
        assert_eq!(config.catalog.page_limit, 100);
        assert_eq!(config.datadog.integration.site, "datadoghq.eu");
        assert_eq!(config.datadog.http.timeout_secs, 10);
        assert_eq!(config.datadog.http.max_concurrent, 4);
        assert_eq!(config.datadog.retry.max_retries, 5);

        let sync = config
            .datadog
            .sync
            .get("datadog-service-from-component")
            .unwrap();
        assert!(sync.enabled);
        assert_eq!(
            sync.schedule.frequency.to_duration(),
            Duration::from_secs(1800)
        );
        assert_eq!(
            sync.schedule.initial_delay,
            Some(HumanDuration::seconds(15))
        );
        let rate_limit = sync.rate_limit.as_ref().unwrap();
        assert_eq!(rate_limit.count, 100);
        assert_eq!(rate_limit.interval, Some(HumanDuration::minutes(1)));

        let filter = sync.entity_filter.as_ref().unwrap().clauses();
        assert_eq!(filter.len(), 1);
        assert_eq!(
            filter[0].get("spec.type"),
            Some(&FilterValue::Equals("service".to_string()))
        );

        assert_eq!(config.slack.base_url.as_deref(), Some("https://acme.slack.com"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_default_values_applied() {
        let yaml = r#"
server:
  port: 3000
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.catalog.base_url, "http://localhost:7007");
        assert_eq!(config.catalog.token, None);
        assert_eq!(config.catalog.page_limit, 500);
        assert_eq!(config.datadog.integration.site, "datadoghq.com");
        assert_eq!(config.datadog.http.max_concurrent, 2);
        assert!(config.datadog.sync.is_empty());
        assert!(!config.otel.enabled);
        assert_eq!(config.otel.service_name, "datadog-entity-sync");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_sync_defaults() {
        let yaml = r#"
datadog:
  sync:
    minimal:
      schedule:
        frequency: { hours: 1 }
        timeout: { minutes: 5 }
"#;

        let config = Config::from_yaml(yaml).unwrap();
        let sync = config.datadog.sync.get("minimal").unwrap();

        assert!(!sync.enabled);
        assert!(sync.entity_filter.is_none());
        assert!(sync.rate_limit.is_none());
        assert!(sync.schedule.jitter.is_none());
        assert_eq!(sync.format, RecordFormat::V3);
    }

    #[test]
    fn test_record_format_parsing() {
        let yaml = r#"
datadog:
  sync:
    legacy:
      format: v2.2
      schedule:
        frequency: { hours: 1 }
        timeout: { minutes: 5 }
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.datadog.sync["legacy"].format, RecordFormat::V2_2);

        let invalid = Config::from_yaml(&yaml.replace("v2.2", "v1"));
        assert!(matches!(invalid, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_entity_filter_list_form() {
        let yaml = r#"
datadog:
  sync:
    listed:
      schedule:
        frequency: { hours: 1 }
        timeout: { minutes: 5 }
      entity_filter:
        - kind: component
          spec.type: [service, website]
        - kind: component
          metadata.annotations.datadoghq.com/service-name: CATALOG_FILTER_EXISTS
"#;

        let config = Config::from_yaml(yaml).unwrap();
        let clauses = config.datadog.sync["listed"]
            .entity_filter
            .as_ref()
            .unwrap()
            .clauses();

        assert_eq!(clauses.len(), 2);
        assert_eq!(
            clauses[0].get("spec.type"),
            Some(&FilterValue::AnyOf(vec![
                "service".to_string(),
                "website".to_string()
            ]))
        );
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("TEST_DD_SYNC_API_KEY", "env_api_key");
        std::env::set_var("TEST_DD_SYNC_CATALOG_TOKEN", "env_token");

        let yaml = r#"
catalog:
  token: "${TEST_DD_SYNC_CATALOG_TOKEN}"

datadog:
  integration:
    api_key: "${TEST_DD_SYNC_API_KEY}"
    app_key: "${TEST_DD_SYNC_UNSET_VARIABLE}"
"#;

        let config = Config::from_yaml(yaml).unwrap();

        assert_eq!(config.catalog.token.as_deref(), Some("env_token"));
        assert_eq!(config.datadog.integration.api_key, "env_api_key");
        assert_eq!(
            config.datadog.integration.app_key,
            "${TEST_DD_SYNC_UNSET_VARIABLE}"
        );

        std::env::remove_var("TEST_DD_SYNC_API_KEY");
        std::env::remove_var("TEST_DD_SYNC_CATALOG_TOKEN");
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("DATADOG_ENTITY_SYNC_SERVER_HOST", "localhost");
        std::env::set_var("DATADOG_ENTITY_SYNC_SERVER_PORT", "9999");
        std::env::set_var("DATADOG_ENTITY_SYNC_CATALOG_BASE_URL", "http://catalog");
        std::env::set_var("DD_SITE", "us5.datadoghq.com");

        let config = Config::from_env().unwrap();

        assert_eq!(config.server.host, "localhost");
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.catalog.base_url, "http://catalog");
        assert_eq!(config.datadog.integration.site, "us5.datadoghq.com");

        std::env::remove_var("DATADOG_ENTITY_SYNC_SERVER_HOST");
        std::env::remove_var("DATADOG_ENTITY_SYNC_SERVER_PORT");
        std::env::remove_var("DATADOG_ENTITY_SYNC_CATALOG_BASE_URL");
        std::env::remove_var("DD_SITE");
    }

    #[test]
    fn test_parse_error_invalid_yaml() {
        let yaml = r#"
server:
  port: "not_a_number"
"#;

        match Config::from_yaml(yaml) {
            Err(ConfigError::Parse(msg)) => assert!(msg.contains("Failed to parse YAML")),
            other => panic!("Expected ConfigError::Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_rate_limit_count_is_rejected() {
        let yaml = r#"
datadog:
  sync:
    broken:
      schedule:
        frequency: { hours: 1 }
        timeout: { minutes: 5 }
      rate_limit:
        count: -1
"#;

        assert!(matches!(
            Config::from_yaml(yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server:\n  port: 8123\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.server.port, 8123);

        let missing = Config::from_file(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(ConfigError::FileRead(_))));
    }

    #[test]
    fn test_human_duration_sums_units() {
        let duration = HumanDuration {
            hours: Some(1),
            minutes: Some(30),
            milliseconds: Some(250),
            ..Default::default()
        };

        assert_eq!(duration.to_duration(), Duration::from_millis(5_400_250));
        assert!(!duration.is_zero());
        assert!(HumanDuration::default().is_zero());
    }

    #[test]
    fn test_human_duration_saturates_on_overflow() {
        let config = Config::from_yaml(
            r#"
datadog:
  sync:
    huge:
      schedule:
        frequency: { weeks: 18446744073709551615, days: 1 }
        timeout: { seconds: 18446744073709551615, milliseconds: 1500 }
"#,
        )
        .unwrap();
        let schedule = &config.datadog.sync["huge"].schedule;

        assert_eq!(schedule.frequency.to_duration(), Duration::from_secs(u64::MAX));
        assert_eq!(schedule.timeout.to_duration(), Duration::MAX);
        assert!(!schedule.frequency.is_zero());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_empty_yaml_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config, Config::default());
    }
}
