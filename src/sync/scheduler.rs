//! Scheduled execution of sync jobs
//!
//! A [`TaskRunner`] decides *when* a task runs; [`ScheduledSync`] owns the
//! lifecycle of one job on top of it: registration, cooperative
//! cancellation, and an error boundary around every invocation so that a
//! failing or panicking run never takes the schedule down with it.

use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::progress::ProgressTracker;
use crate::config::ScheduleConfig;
use crate::error::{SchedulerError, SyncError};

/// Future produced by one task invocation
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Repeatable task body handed to a runner
pub type TaskFn = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// A task registration
pub struct ScheduledTask {
    pub id: String,
    pub func: TaskFn,
    /// Cancelled when the owner no longer wants future invocations
    pub signal: CancellationToken,
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("cancelled", &self.signal.is_cancelled())
            .finish()
    }
}

/// Runs registered tasks on some schedule
#[async_trait]
pub trait TaskRunner: Send + Sync {
    /// Register the task; returns once registration is accepted
    async fn run(&self, task: ScheduledTask) -> Result<(), SchedulerError>;
}

/// Resolved timings of an [`IntervalTaskRunner`]
#[derive(Debug, Clone, PartialEq)]
pub struct IntervalSchedule {
    pub frequency: Duration,
    pub timeout: Duration,
    pub initial_delay: Duration,
    pub jitter: Duration,
}

impl From<&ScheduleConfig> for IntervalSchedule {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            frequency: config.frequency.to_duration(),
            timeout: config.timeout.to_duration(),
            initial_delay: config
                .initial_delay
                .map(|d| d.to_duration())
                .unwrap_or_default(),
            jitter: config.jitter.map(|d| d.to_duration()).unwrap_or_default(),
        }
    }
}

/// Runs a task immediately (after the initial delay) and then every
/// `frequency`, bounding each invocation by `timeout`
#[derive(Debug, Clone)]
pub struct IntervalTaskRunner {
    schedule: IntervalSchedule,
}

impl IntervalTaskRunner {
    pub fn new(schedule: IntervalSchedule) -> Self {
        Self { schedule }
    }

    pub fn from_config(config: &ScheduleConfig) -> Self {
        Self::new(IntervalSchedule::from(config))
    }

    pub fn schedule(&self) -> &IntervalSchedule {
        &self.schedule
    }

    fn jitter(&self) -> Duration {
        let max = self.schedule.jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }

    async fn invoke(&self, task: &ScheduledTask) {
        let run = (task.func)();
        if self.schedule.timeout.is_zero() {
            run.await;
            return;
        }
        if tokio::time::timeout(self.schedule.timeout, run).await.is_err() {
            warn!(
                task_id = %task.id,
                timeout_secs = self.schedule.timeout.as_secs(),
                "Task invocation timed out"
            );
        }
    }

    async fn run_loop(self, task: ScheduledTask) {
        if !self.schedule.initial_delay.is_zero() {
            tokio::select! {
                _ = task.signal.cancelled() => return,
                _ = tokio::time::sleep(self.schedule.initial_delay) => {}
            }
        }

        loop {
            if task.signal.is_cancelled() {
                break;
            }
            self.invoke(&task).await;

            let wait = self.schedule.frequency + self.jitter();
            debug!(task_id = %task.id, wait_ms = wait.as_millis() as u64, "Next invocation scheduled");
            tokio::select! {
                _ = task.signal.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        debug!(task_id = %task.id, "Task loop stopped");
    }
}

#[async_trait]
impl TaskRunner for IntervalTaskRunner {
    async fn run(&self, task: ScheduledTask) -> Result<(), SchedulerError> {
        if self.schedule.frequency.is_zero() {
            return Err(SchedulerError::InvalidSchedule(format!(
                "{}: frequency must be greater than zero",
                task.id
            )));
        }

        tokio::spawn(self.clone().run_loop(task));
        Ok(())
    }
}

/// The body of a scheduled job
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn scheduled_sync(&self) -> Result<(), SyncError>;
}

/// Lifecycle of a [`ScheduledSync`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleState {
    /// Registration pending or failed
    Idle,
    /// Registered, waiting for the next invocation
    Scheduled,
    /// An invocation is in progress
    Running,
    /// Cancelled; no further invocations
    Stopped,
}

/// State plus the number of invocations in flight
///
/// A runner may start an invocation before the previous one ended, so
/// `Running` is only left when the last of them finishes.
#[derive(Debug)]
struct Lifecycle {
    state: ScheduleState,
    in_flight: usize,
}

type SharedLifecycle = Arc<Mutex<Lifecycle>>;

fn with_lifecycle<T>(lifecycle: &Mutex<Lifecycle>, f: impl FnOnce(&mut Lifecycle) -> T) -> T {
    let mut guard = lifecycle.lock().unwrap_or_else(|e| e.into_inner());
    f(&mut guard)
}

impl Lifecycle {
    fn registered(&mut self) {
        if self.state == ScheduleState::Idle {
            self.state = if self.in_flight > 0 {
                ScheduleState::Running
            } else {
                ScheduleState::Scheduled
            };
        }
    }

    fn begin(&mut self) {
        self.in_flight += 1;
        if self.state != ScheduleState::Stopped {
            self.state = ScheduleState::Running;
        }
    }

    fn end(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.in_flight == 0 && self.state == ScheduleState::Running {
            self.state = ScheduleState::Scheduled;
        }
    }
}

/// Owns the schedule of one sync job
#[derive(Debug)]
pub struct ScheduledSync {
    sync_id: String,
    cancel: CancellationToken,
    lifecycle: SharedLifecycle,
}

impl ScheduledSync {
    /// Register `job` with `runner` in the background
    ///
    /// Registration errors are logged and leave the job idle.
    pub fn start(
        sync_id: impl Into<String>,
        runner: Arc<dyn TaskRunner>,
        job: Arc<dyn ScheduledJob>,
    ) -> Self {
        let sync_id = sync_id.into();
        let cancel = CancellationToken::new();
        let lifecycle = Arc::new(Mutex::new(Lifecycle {
            state: ScheduleState::Idle,
            in_flight: 0,
        }));

        let func: TaskFn = {
            let sync_id = sync_id.clone();
            let lifecycle = lifecycle.clone();
            Arc::new(move || -> TaskFuture {
                Box::pin(run_invocation(
                    sync_id.clone(),
                    job.clone(),
                    lifecycle.clone(),
                ))
            })
        };

        let task = ScheduledTask {
            id: sync_id.clone(),
            func,
            signal: cancel.clone(),
        };

        let registration_id = sync_id.clone();
        let registration = lifecycle.clone();
        tokio::spawn(async move {
            info!(sync_id = %registration_id, "Scheduling sync");
            match runner.run(task).await {
                Ok(()) => with_lifecycle(&registration, Lifecycle::registered),
                Err(err) => error!(
                    sync_id = %registration_id,
                    error = %err,
                    "Could not properly schedule a background sync"
                ),
            }
        });

        Self {
            sync_id,
            cancel,
            lifecycle,
        }
    }

    pub fn sync_id(&self) -> &str {
        &self.sync_id
    }

    pub fn state(&self) -> ScheduleState {
        with_lifecycle(&self.lifecycle, |l| l.state)
    }

    /// Stop future invocations; an in-flight run continues to completion
    pub fn stop(&self) {
        info!(sync_id = %self.sync_id, "Aborting sync");
        self.cancel.cancel();
        with_lifecycle(&self.lifecycle, |l| l.state = ScheduleState::Stopped);
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

async fn run_invocation(
    sync_id: String,
    job: Arc<dyn ScheduledJob>,
    lifecycle: SharedLifecycle,
) {
    let tracker = ProgressTracker::new();
    with_lifecycle(&lifecycle, Lifecycle::begin);
    info!(sync_id = %sync_id, "Running sync");

    // a separate task turns panics into join errors
    let mut guard = InvocationGuard {
        handle: tokio::spawn(async move { job.scheduled_sync().await }),
        lifecycle,
    };
    let outcome = (&mut guard.handle).await;

    let elapsed = tracker.step();
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(
            sync_id = %sync_id,
            error = %err,
            step_time_ms = elapsed.step_ms,
            total_time_ms = elapsed.total_ms,
            "Items could not be synced due to an error"
        ),
        Err(join_err) => error!(
            sync_id = %sync_id,
            error = %join_err,
            step_time_ms = elapsed.step_ms,
            total_time_ms = elapsed.total_ms,
            "Sync task panicked"
        ),
    }

    info!(
        sync_id = %sync_id,
        total_time_ms = elapsed.total_ms,
        "Finished sync"
    );
}

/// Aborts the job and ends the invocation when dropped, either after
/// completion or when a runner timeout cancels it
struct InvocationGuard {
    handle: JoinHandle<Result<(), SyncError>>,
    lifecycle: SharedLifecycle,
}

impl Drop for InvocationGuard {
    fn drop(&mut self) {
        self.handle.abort();
        with_lifecycle(&self.lifecycle, Lifecycle::end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HumanDuration;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Runner that only records registrations
    #[derive(Default)]
    struct ManualRunner {
        tasks: Mutex<Vec<ScheduledTask>>,
    }

    impl ManualRunner {
        fn take(&self) -> Option<ScheduledTask> {
            self.tasks.lock().unwrap().pop()
        }
    }

    #[async_trait]
    impl TaskRunner for ManualRunner {
        async fn run(&self, task: ScheduledTask) -> Result<(), SchedulerError> {
            self.tasks.lock().unwrap().push(task);
            Ok(())
        }
    }

    struct RejectingRunner;

    #[async_trait]
    impl TaskRunner for RejectingRunner {
        async fn run(&self, task: ScheduledTask) -> Result<(), SchedulerError> {
            Err(SchedulerError::AlreadyRegistered(task.id))
        }
    }

    enum Behaviour {
        Succeed,
        Fail,
        Panic,
    }

    struct CountingJob {
        calls: AtomicU32,
        behaviour: Behaviour,
    }

    impl CountingJob {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                behaviour,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ScheduledJob for CountingJob {
        async fn scheduled_sync(&self) -> Result<(), SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Succeed => Ok(()),
                Behaviour::Fail => Err(SyncError::Preload("groups unavailable".to_string())),
                Behaviour::Panic => panic!("serializer blew up"),
            }
        }
    }

    async fn wait_for_task(runner: &ManualRunner) -> ScheduledTask {
        for _ in 0..100 {
            if let Some(task) = runner.take() {
                return task;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task was never registered");
    }

    async fn wait_for_state(schedule: &ScheduledSync, expected: ScheduleState) {
        for _ in 0..100 {
            if schedule.state() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(schedule.state(), expected);
    }

    // Test 1: Registration hands the task to the runner under the sync id
    #[tokio::test]
    async fn test_registers_with_runner() {
        let runner = Arc::new(ManualRunner::default());
        let job = CountingJob::new(Behaviour::Succeed);

        let schedule = ScheduledSync::start("component-sync", runner.clone(), job.clone());
        let task = wait_for_task(&runner).await;

        assert_eq!(task.id, "component-sync");
        assert!(!task.signal.is_cancelled());
        wait_for_state(&schedule, ScheduleState::Scheduled).await;

        (task.func)().await;
        assert_eq!(job.calls(), 1);
        assert_eq!(schedule.state(), ScheduleState::Scheduled);
    }

    // Test 2: A failing run is contained and the next run still happens
    #[tokio::test]
    async fn test_failed_run_is_contained() {
        let runner = Arc::new(ManualRunner::default());
        let job = CountingJob::new(Behaviour::Fail);

        let _schedule = ScheduledSync::start("failing", runner.clone(), job.clone());
        let task = wait_for_task(&runner).await;

        (task.func)().await;
        (task.func)().await;

        assert_eq!(job.calls(), 2);
    }

    // Test 3: A panicking run is contained
    #[tokio::test]
    async fn test_panicking_run_is_contained() {
        let runner = Arc::new(ManualRunner::default());
        let job = CountingJob::new(Behaviour::Panic);

        let schedule = ScheduledSync::start("panicking", runner.clone(), job.clone());
        let task = wait_for_task(&runner).await;
        wait_for_state(&schedule, ScheduleState::Scheduled).await;

        (task.func)().await;

        assert_eq!(job.calls(), 1);
        assert_eq!(schedule.state(), ScheduleState::Scheduled);
    }

    // Test 4: Stop cancels the signal given to the runner
    #[tokio::test]
    async fn test_stop_cancels_signal() {
        let runner = Arc::new(ManualRunner::default());
        let job = CountingJob::new(Behaviour::Succeed);

        let schedule = ScheduledSync::start("stoppable", runner.clone(), job);
        let task = wait_for_task(&runner).await;

        schedule.stop();

        assert!(task.signal.is_cancelled());
        assert!(schedule.is_stopped());
        assert_eq!(schedule.state(), ScheduleState::Stopped);
    }

    // Test 5: Registration failure is logged and leaves the job idle
    #[tokio::test]
    async fn test_registration_failure_leaves_idle() {
        let job = CountingJob::new(Behaviour::Succeed);

        let schedule = ScheduledSync::start("rejected", Arc::new(RejectingRunner), job.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(schedule.state(), ScheduleState::Idle);
        assert_eq!(job.calls(), 0);
    }

    /// Job whose invocations each sleep for the next queued pause
    struct SleepingJob {
        pauses: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl ScheduledJob for SleepingJob {
        async fn scheduled_sync(&self) -> Result<(), SyncError> {
            let pause = self.pauses.lock().unwrap().pop().unwrap_or_default();
            tokio::time::sleep(pause).await;
            Ok(())
        }
    }

    // Test 6: Overlapping invocations keep the job running until the last ends
    #[tokio::test(start_paused = true)]
    async fn test_overlapping_invocations_stay_running() {
        let runner = Arc::new(ManualRunner::default());
        let job = Arc::new(SleepingJob {
            pauses: Mutex::new(vec![Duration::from_secs(30), Duration::from_secs(10)]),
        });

        let schedule = ScheduledSync::start("overlapping", runner.clone(), job);
        let task = wait_for_task(&runner).await;
        wait_for_state(&schedule, ScheduleState::Scheduled).await;

        let first = tokio::spawn((task.func)());
        let second = tokio::spawn((task.func)());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(schedule.state(), ScheduleState::Running);

        // one invocation has finished, the other is still sleeping
        tokio::time::sleep(Duration::from_secs(14)).await;
        assert_eq!(schedule.state(), ScheduleState::Running);

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(schedule.state(), ScheduleState::Scheduled);
    }

    // Test 7: Stopping during a run stays stopped after the run ends
    #[tokio::test(start_paused = true)]
    async fn test_stop_during_run_stays_stopped() {
        let runner = Arc::new(ManualRunner::default());
        let job = Arc::new(SleepingJob {
            pauses: Mutex::new(vec![Duration::from_secs(10)]),
        });

        let schedule = ScheduledSync::start("stopped-mid-run", runner.clone(), job);
        let task = wait_for_task(&runner).await;
        wait_for_state(&schedule, ScheduleState::Scheduled).await;

        let run = tokio::spawn((task.func)());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(schedule.state(), ScheduleState::Running);

        schedule.stop();
        run.await.unwrap();

        assert_eq!(schedule.state(), ScheduleState::Stopped);
    }

    fn schedule_every(frequency: Duration) -> IntervalSchedule {
        IntervalSchedule {
            frequency,
            timeout: Duration::from_secs(10),
            initial_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    // Test 8: Interval runner rejects a zero frequency
    #[tokio::test]
    async fn test_interval_runner_rejects_zero_frequency() {
        let runner = IntervalTaskRunner::new(schedule_every(Duration::ZERO));
        let task = ScheduledTask {
            id: "zero".to_string(),
            func: Arc::new(|| -> TaskFuture { Box::pin(async {}) }),
            signal: CancellationToken::new(),
        };

        assert!(matches!(
            runner.run(task).await,
            Err(SchedulerError::InvalidSchedule(_))
        ));
    }

    // Test 9: Interval runner runs immediately, then every frequency, until cancelled
    #[tokio::test(start_paused = true)]
    async fn test_interval_runner_runs_until_cancelled() {
        let runner = IntervalTaskRunner::new(schedule_every(Duration::from_secs(60)));
        let calls = Arc::new(AtomicU32::new(0));
        let signal = CancellationToken::new();

        let counter = calls.clone();
        let task = ScheduledTask {
            id: "interval".to_string(),
            func: Arc::new(move || -> TaskFuture {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            }),
            signal: signal.clone(),
        };

        runner.run(task).await.unwrap();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        signal.cancel();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    // Test 10: Initial delay postpones the first invocation
    #[tokio::test(start_paused = true)]
    async fn test_interval_runner_initial_delay() {
        let runner = IntervalTaskRunner::from_config(&ScheduleConfig {
            frequency: HumanDuration::minutes(30),
            timeout: HumanDuration::minutes(5),
            initial_delay: Some(HumanDuration::seconds(30)),
            jitter: None,
        });
        let calls = Arc::new(AtomicU32::new(0));

        let counter = calls.clone();
        let task = ScheduledTask {
            id: "delayed".to_string(),
            func: Arc::new(move || -> TaskFuture {
                let counter = counter.clone();
                Box::pin(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            }),
            signal: CancellationToken::new(),
        };

        runner.run(task).await.unwrap();

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // Test 11: Invocations longer than the timeout are cut short
    #[tokio::test(start_paused = true)]
    async fn test_interval_runner_timeout() {
        let runner = IntervalTaskRunner::new(IntervalSchedule {
            frequency: Duration::from_secs(60),
            timeout: Duration::from_secs(5),
            initial_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        });
        let finished = Arc::new(AtomicU32::new(0));

        let counter = finished.clone();
        let task = ScheduledTask {
            id: "slow".to_string(),
            func: Arc::new(move || -> TaskFuture {
                let counter = counter.clone();
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            }),
            signal: CancellationToken::new(),
        };

        runner.run(task).await.unwrap();
        tokio::time::sleep(Duration::from_secs(40)).await;

        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }
}
