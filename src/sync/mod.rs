//! Entity synchronization infrastructure
//!
//! This module provides the generic fetch -> serialize -> push pipeline that
//! copies catalog entities into Datadog, plus the pacing and scheduling it
//! runs under.
//!
//! # Components
//!
//! - [`pacer`]: Chunked iteration with a delay between chunks
//! - [`progress`]: Step and total elapsed time for run logging
//! - [`scheduler`]: Task runner trait, interval runner and the scheduled job wrapper
//! - [`engine`]: The entity sync job itself
//! - [`registry`]: Startup registration of jobs
//!
//! # Example
//!
//! ```ignore
//! use datadog_entity_sync::sync::{
//!     EntitySyncOptions, IntervalTaskRunner, SyncDefinition, SyncRegistryBuilder,
//! };
//!
//! let registry = SyncRegistryBuilder::new()
//!     .define(SyncDefinition {
//!         options: EntitySyncOptions::<()>::new("datadog-service-from-component").enabled(true),
//!         task_runner: Arc::new(IntervalTaskRunner::from_config(&schedule)),
//!     })
//!     .build(&clients);
//!
//! registry.schedule_all();
//! ```

pub mod engine;
pub mod pacer;
pub mod progress;
pub mod registry;
pub mod scheduler;

// Re-export main types for convenience
pub use engine::{
    validate_event_payload, Clients, EntitySync, EntitySyncOptions, EventSyncRequest, Preload,
    SerializeFn, SyncJob, SyncedEntity, TOPIC_PREFIX,
};
pub use pacer::{by_chunk, RateLimit};
pub use progress::{Elapsed, ProgressTracker};
pub use registry::{SyncDefinition, SyncRegistry, SyncRegistryBuilder};
pub use scheduler::{
    IntervalSchedule, IntervalTaskRunner, ScheduleState, ScheduledJob, ScheduledSync,
    ScheduledTask, TaskFn, TaskFuture, TaskRunner,
};
