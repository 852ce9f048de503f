//! Built-in sync jobs
//!
//! Two jobs ship with the service. Both turn catalog components into Datadog
//! services; the second also resolves the owning group for owner and Slack
//! contacts. Each is only defined when `datadog.sync.<id>` is configured, and
//! writes v3 entities unless its `format` asks for v2.2 service definitions.

use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, SyncConfig};
use crate::otel::SyncMetrics;
use crate::serializers::{
    formatted_component_serializer, formatted_team_serializer, ExtraSerializationInfo,
    GroupPreload, TeamSerializationInfo,
};
use crate::sync::{EntitySyncOptions, IntervalTaskRunner, SyncDefinition, SyncRegistryBuilder};

/// Components -> services
pub const COMPONENT_SYNC_ID: &str = "datadog-service-from-component";

/// Components -> services with owner and contacts from the owning group
pub const COMPONENT_WITH_TEAMS_SYNC_ID: &str = "datadog-service-from-component-with-teams";

fn base_options<P: 'static>(
    sync_id: &str,
    sync: &SyncConfig,
    metrics: Option<&Arc<SyncMetrics>>,
) -> EntitySyncOptions<P> {
    let mut options = EntitySyncOptions::new(sync_id).enabled(sync.enabled);
    if let Some(filter) = &sync.entity_filter {
        options = options.entity_filter(filter.clone());
    }
    if let Some(rate_limit) = &sync.rate_limit {
        options = options.rate_limit(rate_limit.clone());
    }
    if let Some(metrics) = metrics {
        options = options.metrics(metrics.clone());
    }
    options
}

/// Add every configured built-in job to `builder`
///
/// Unknown ids under `datadog.sync` are logged and ignored.
pub fn define_builtin_syncs(
    mut builder: SyncRegistryBuilder,
    config: &Config,
    metrics: Option<Arc<SyncMetrics>>,
) -> SyncRegistryBuilder {
    for (sync_id, sync) in &config.datadog.sync {
        let task_runner = Arc::new(IntervalTaskRunner::from_config(&sync.schedule));

        match sync_id.as_str() {
            COMPONENT_SYNC_ID => {
                let extra = ExtraSerializationInfo {
                    app_base_url: config.app.base_url.clone(),
                };
                builder = builder.define(SyncDefinition {
                    options: base_options::<()>(sync_id, sync, metrics.as_ref())
                        .serialize(formatted_component_serializer(sync.format, extra)),
                    task_runner,
                });
            }
            COMPONENT_WITH_TEAMS_SYNC_ID => {
                let extra = TeamSerializationInfo {
                    app_base_url: config.app.base_url.clone(),
                    slack_base_url: config.slack.base_url.clone(),
                };
                builder = builder.define(SyncDefinition {
                    options: base_options(sync_id, sync, metrics.as_ref())
                        .serialize(formatted_team_serializer(sync.format, extra))
                        .preload(Arc::new(GroupPreload)),
                    task_runner,
                });
            }
            other => {
                warn!(sync_id = %other, "Unknown sync id in configuration; ignoring");
                continue;
            }
        }

        info!(
            sync_id = %sync_id,
            enabled = sync.enabled,
            format = ?sync.format,
            "Sync defined"
        );
    }

    builder
}
