//! OpenTelemetry integration for datadog-entity-sync
//!
//! Span and metric export over OTLP when enabled, plus the tracing
//! subscriber setup shared by the binary.

use crate::config::{LoggingConfig, OtelConfig};
use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter, MeterProvider as _},
    trace::TracerProvider as TracerProviderTrait,
    KeyValue,
};
use opentelemetry_sdk::{metrics::SdkMeterProvider, trace::TracerProvider, Resource};
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// OpenTelemetry error types
#[derive(Debug, Error)]
pub enum OtelError {
    /// Failed to initialize tracer
    #[error("Failed to initialize tracer: {0}")]
    TracerInit(String),

    /// Failed to initialize meter
    #[error("Failed to initialize meter: {0}")]
    MeterInit(String),

    /// Failed to shutdown
    #[error("Failed to shutdown: {0}")]
    Shutdown(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Tracer and meter providers
///
/// Without OTLP export the meter provider has no reader, so instruments are
/// cheap no-ops.
pub struct OtelProvider {
    tracer_provider: Option<TracerProvider>,
    meter_provider: SdkMeterProvider,
    config: OtelConfig,
}

impl OtelProvider {
    pub fn new(config: &OtelConfig) -> Result<Self, OtelError> {
        let resource = Resource::new(vec![KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        if !config.enabled {
            return Ok(Self {
                tracer_provider: None,
                meter_provider: SdkMeterProvider::builder().with_resource(resource).build(),
                config: config.clone(),
            });
        }

        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| OtelError::Config("OTLP endpoint is required when enabled".into()))?;

        let tracer_provider = Self::init_tracer_provider(endpoint, &resource)?;
        let meter_provider = Self::init_meter_provider(endpoint, &resource)?;
        global::set_tracer_provider(tracer_provider.clone());

        Ok(Self {
            tracer_provider: Some(tracer_provider),
            meter_provider,
            config: config.clone(),
        })
    }

    fn init_tracer_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<TracerProvider, OtelError> {
        use opentelemetry_otlp::WithExportConfig;
        use opentelemetry_sdk::runtime;
        use opentelemetry_sdk::trace::{Config, Sampler};

        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint)
            .build_span_exporter()
            .map_err(|e| OtelError::TracerInit(e.to_string()))?;

        Ok(TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(
                Config::default()
                    .with_sampler(Sampler::AlwaysOn)
                    .with_resource(resource.clone()),
            )
            .build())
    }

    fn init_meter_provider(
        endpoint: &str,
        resource: &Resource,
    ) -> Result<SdkMeterProvider, OtelError> {
        use opentelemetry_otlp::{MetricsExporterBuilder, WithExportConfig};
        use opentelemetry_sdk::metrics::reader::{
            DefaultAggregationSelector, DefaultTemporalitySelector,
        };
        use opentelemetry_sdk::{metrics::PeriodicReader, runtime};

        let exporter = MetricsExporterBuilder::from(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint),
        )
        .build_metrics_exporter(
            Box::new(DefaultTemporalitySelector::new()),
            Box::new(DefaultAggregationSelector::new()),
        )
        .map_err(|e| OtelError::MeterInit(e.to_string()))?;

        Ok(SdkMeterProvider::builder()
            .with_resource(resource.clone())
            .with_reader(PeriodicReader::builder(exporter, runtime::Tokio).build())
            .build())
    }

    pub fn tracer(&self, name: &'static str) -> opentelemetry_sdk::trace::Tracer {
        match self.tracer_provider {
            Some(ref tp) => tp.tracer(name),
            None => TracerProvider::builder().build().tracer(name),
        }
    }

    pub fn meter(&self) -> Meter {
        self.meter_provider.meter(self.config.service_name.clone())
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Flush spans and stop metric export
    pub fn shutdown(&self) -> Result<(), OtelError> {
        self.meter_provider
            .shutdown()
            .map_err(|e| OtelError::Shutdown(format!("Meter shutdown failed: {:?}", e)))?;

        if let Some(ref tp) = self.tracer_provider {
            for result in tp.force_flush() {
                result.map_err(|e| OtelError::Shutdown(format!("Tracer flush failed: {:?}", e)))?;
            }
        }

        Ok(())
    }
}

impl Drop for OtelProvider {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Sync job metrics, labelled by `sync_id`
pub struct SyncMetrics {
    /// Records accepted by Datadog
    pub entities_synced: Counter<u64>,

    /// Entities skipped because serialization or the upsert failed
    pub entities_failed: Counter<u64>,

    /// Records produced without being pushed
    pub entities_simulated: Counter<u64>,

    /// Runs aborted before any entity was processed
    pub runs_failed: Counter<u64>,

    /// Wall time of a whole run in seconds
    pub run_duration: Histogram<f64>,
}

impl SyncMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            entities_synced: meter
                .u64_counter("datadog_entity_sync_entities_synced_total")
                .with_description("Entities pushed to Datadog")
                .init(),
            entities_failed: meter
                .u64_counter("datadog_entity_sync_entities_failed_total")
                .with_description("Entities that failed to serialize or push")
                .init(),
            entities_simulated: meter
                .u64_counter("datadog_entity_sync_entities_simulated_total")
                .with_description("Entities serialized without being pushed")
                .init(),
            runs_failed: meter
                .u64_counter("datadog_entity_sync_runs_failed_total")
                .with_description("Sync runs aborted by a fetch or preload failure")
                .init(),
            run_duration: meter
                .f64_histogram("datadog_entity_sync_run_duration_seconds")
                .with_description("Sync run duration in seconds")
                .init(),
        }
    }

    pub fn record_synced(&self, sync_id: &str) {
        self.entities_synced
            .add(1, &[KeyValue::new("sync_id", sync_id.to_string())]);
    }

    /// `stage` is `serialize` or `push`
    pub fn record_failed(&self, sync_id: &str, stage: &'static str) {
        self.entities_failed.add(
            1,
            &[
                KeyValue::new("sync_id", sync_id.to_string()),
                KeyValue::new("stage", stage),
            ],
        );
    }

    pub fn record_simulated(&self, sync_id: &str) {
        self.entities_simulated
            .add(1, &[KeyValue::new("sync_id", sync_id.to_string())]);
    }

    pub fn record_run_failed(&self, sync_id: &str) {
        self.runs_failed
            .add(1, &[KeyValue::new("sync_id", sync_id.to_string())]);
    }

    pub fn record_run_duration(&self, sync_id: &str, duration_secs: f64) {
        self.run_duration.record(
            duration_secs,
            &[KeyValue::new("sync_id", sync_id.to_string())],
        );
    }
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The format is `json` unless
/// `pretty` is configured.
pub fn init_tracing(otel: &OtelProvider, logging: &LoggingConfig) -> Result<(), OtelError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(logging.level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let otel_layer = otel
        .is_enabled()
        .then(|| tracing_opentelemetry::layer().with_tracer(otel.tracer("datadog-entity-sync")));

    let (json_layer, pretty_layer) = if logging.format.eq_ignore_ascii_case("pretty") {
        (None, Some(tracing_subscriber::fmt::layer().pretty()))
    } else {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()
        .map_err(|e| OtelError::TracerInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disabled() -> OtelConfig {
        OtelConfig {
            enabled: false,
            endpoint: None,
            service_name: "test-service".to_string(),
        }
    }

    // Test 1: Disabled provider has no tracer provider
    #[test]
    fn test_otel_provider_disabled() {
        let provider = OtelProvider::new(&disabled()).unwrap();

        assert!(!provider.is_enabled());
        assert!(provider.tracer_provider.is_none());
        assert!(provider.shutdown().is_ok());
    }

    // Test 2: Enabled provider needs an endpoint
    #[test]
    fn test_otel_provider_requires_endpoint_when_enabled() {
        let config = OtelConfig {
            enabled: true,
            ..disabled()
        };

        match OtelProvider::new(&config) {
            Err(OtelError::Config(msg)) => assert!(msg.contains("endpoint is required")),
            Err(other) => panic!("Expected OtelError::Config, got {:?}", other),
            Ok(_) => panic!("Expected OtelError::Config"),
        }
    }

    // Test 3: Sync metrics record without an exporter
    #[test]
    fn test_sync_metrics_record() {
        let provider = OtelProvider::new(&disabled()).unwrap();
        let metrics = SyncMetrics::new(&provider.meter());

        metrics.record_synced("datadog-service-from-component");
        metrics.record_simulated("datadog-service-from-component");
        metrics.record_failed("datadog-service-from-component", "serialize");
        metrics.record_failed("datadog-service-from-component", "push");
        metrics.record_run_failed("datadog-service-from-component");
        metrics.record_run_duration("datadog-service-from-component", 1.5);
    }

    // Test 4: Error display
    #[test]
    fn test_otel_error_display() {
        assert_eq!(
            OtelError::Config("test error".to_string()).to_string(),
            "Configuration error: test error"
        );
        assert_eq!(
            OtelError::Shutdown("flush".to_string()).to_string(),
            "Failed to shutdown: flush"
        );
    }

    // Test 5: Default service name
    #[test]
    fn test_default_otel_config() {
        let config = OtelConfig::default();

        assert!(!config.enabled);
        assert!(config.endpoint.is_none());
        assert_eq!(config.service_name, "datadog-entity-sync");
    }
}
