//! Sync job registry
//!
//! Jobs are declared on a [`SyncRegistryBuilder`] at startup and built once
//! the shared [`Clients`] exist. The resulting [`SyncRegistry`] is handed to
//! the HTTP layer and owns the schedules.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use super::engine::{Clients, EntitySync, EntitySyncOptions, SyncJob};
use super::scheduler::{ScheduleState, ScheduledJob, ScheduledSync, TaskRunner};
use crate::config::ConfigError;

/// A job declaration: engine options plus the runner that schedules it
pub struct SyncDefinition<P> {
    pub options: EntitySyncOptions<P>,
    pub task_runner: Arc<dyn TaskRunner>,
}

struct BuiltJob {
    job: Arc<dyn SyncJob>,
    scheduled: Arc<dyn ScheduledJob>,
    runner: Arc<dyn TaskRunner>,
}

type JobFactory = Box<dyn FnOnce(&Clients) -> Result<BuiltJob, ConfigError> + Send>;

/// Collects [`SyncDefinition`]s before the clients are available
#[derive(Default)]
pub struct SyncRegistryBuilder {
    factories: BTreeMap<String, JobFactory>,
}

impl SyncRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a job; a later definition with the same id replaces the earlier one
    pub fn define<P: Send + Sync + 'static>(mut self, definition: SyncDefinition<P>) -> Self {
        let sync_id = definition.options.sync_id.clone();
        let factory: JobFactory = Box::new(move |clients: &Clients| {
            let sync = EntitySync::new(clients.clone(), definition.options)?;
            Ok(BuiltJob {
                job: sync.clone(),
                scheduled: sync,
                runner: definition.task_runner,
            })
        });

        if self.factories.insert(sync_id.clone(), factory).is_some() {
            warn!(sync_id = %sync_id, "Sync defined twice; keeping the latest definition");
        }
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Construct every job; invalid definitions are logged and skipped
    pub fn build(self, clients: &Clients) -> SyncRegistry {
        let mut jobs = BTreeMap::new();

        for (sync_id, factory) in self.factories {
            match factory(clients) {
                Ok(built) => {
                    info!(sync_id = %sync_id, enabled = built.job.enabled(), "Sync registered");
                    jobs.insert(
                        sync_id,
                        RegisteredJob {
                            built,
                            schedule: Mutex::new(None),
                        },
                    );
                }
                Err(err) => {
                    error!(sync_id = %sync_id, error = %err, "Invalid sync definition; skipping");
                }
            }
        }

        SyncRegistry { jobs }
    }
}

struct RegisteredJob {
    built: BuiltJob,
    schedule: Mutex<Option<ScheduledSync>>,
}

/// Every constructed job, keyed by sync id
pub struct SyncRegistry {
    jobs: BTreeMap<String, RegisteredJob>,
}

impl SyncRegistry {
    pub fn get(&self, sync_id: &str) -> Option<Arc<dyn SyncJob>> {
        self.jobs.get(sync_id).map(|entry| entry.built.job.clone())
    }

    pub fn sync_ids(&self) -> impl Iterator<Item = &str> {
        self.jobs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Hand a job to its task runner; a running schedule is left untouched
    ///
    /// Returns false when no such job exists.
    pub fn schedule(&self, sync_id: &str) -> bool {
        let Some(entry) = self.jobs.get(sync_id) else {
            return false;
        };

        let mut schedule = entry.schedule.lock().unwrap_or_else(|e| e.into_inner());
        if schedule.as_ref().is_some_and(|s| !s.is_stopped()) {
            return true;
        }

        *schedule = Some(ScheduledSync::start(
            sync_id,
            entry.built.runner.clone(),
            entry.built.scheduled.clone(),
        ));
        true
    }

    /// Lifecycle of a job's schedule; `None` until it is first scheduled
    pub fn schedule_state(&self, sync_id: &str) -> Option<ScheduleState> {
        let entry = self.jobs.get(sync_id)?;
        let schedule = entry.schedule.lock().unwrap_or_else(|e| e.into_inner());
        schedule.as_ref().map(ScheduledSync::state)
    }

    /// Schedule every registered job
    pub fn schedule_all(&self) {
        for sync_id in self.jobs.keys() {
            self.schedule(sync_id);
        }
    }

    /// Stop every schedule; in-flight runs finish on their own
    pub fn stop_all(&self) {
        for entry in self.jobs.values() {
            let schedule = entry.schedule.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(schedule) = schedule.as_ref() {
                schedule.stop();
            }
        }
    }
}
