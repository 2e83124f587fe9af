//! Scheduler: one dispatcher task per job, instances on a task tracker.
//!
//! Each registered job owns a semaphore sized to its `max_instances`.
//! A fire acquires a permit without waiting; when none is free the fire
//! is dropped and counted. Instances run behind a panic boundary so a
//! failing job never takes down its dispatcher or any other job.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use riskctl_telemetry::Metrics;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::{SchedulerError, SchedulerResult};
use crate::job::{DynScheduledJob, JobReport};
use crate::trigger::{CalendarTrigger, Trigger};

#[derive(Debug, Default)]
struct JobStats {
    fired: AtomicU64,
    skipped: AtomicU64,
    started: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl JobStats {
    fn snapshot(&self, in_flight: usize) -> JobStatsSnapshot {
        JobStatsSnapshot {
            fired: self.fired.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            in_flight,
        }
    }
}

/// Point-in-time counters for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JobStatsSnapshot {
    /// Trigger fires, including skipped ones.
    pub fired: u64,
    /// Fires dropped because `max_instances` were running.
    pub skipped: u64,
    pub started: u64,
    /// Instances that returned `Ok` (including `JobReport::Skipped`).
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
    pub in_flight: usize,
}

/// Result of `Scheduler::shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    pub completed_cleanly: bool,
    /// Instances still running when the scheduler stopped waiting.
    pub abandoned: usize,
}

struct Registration {
    job: DynScheduledJob,
    trigger: Trigger,
    max_instances: usize,
    permits: Arc<Semaphore>,
    stats: Arc<JobStats>,
}

impl Registration {
    fn in_flight(&self) -> usize {
        self.max_instances
            .saturating_sub(self.permits.available_permits())
    }
}

/// Owned scheduler with an explicit `start` / `shutdown` lifecycle.
pub struct Scheduler {
    registrations: Vec<Arc<Registration>>,
    names: HashSet<String>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    dispatchers: Vec<JoinHandle<()>>,
    started: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
            names: HashSet::new(),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
            dispatchers: Vec::new(),
            started: false,
        }
    }

    /// Register a job. Registration is closed once `start` has been called.
    pub fn register_job(
        &mut self,
        job: DynScheduledJob,
        trigger: Trigger,
        max_instances: usize,
    ) -> SchedulerResult<()> {
        let name = job.name().to_string();
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }
        if max_instances == 0 {
            return Err(SchedulerError::InvalidMaxInstances(name));
        }
        if !self.names.insert(name.clone()) {
            return Err(SchedulerError::DuplicateJob(name));
        }

        info!(job = %name, trigger = %trigger, max_instances, "Job registered");
        self.registrations.push(Arc::new(Registration {
            job,
            trigger,
            max_instances,
            permits: Arc::new(Semaphore::new(max_instances)),
            stats: Arc::new(JobStats::default()),
        }));
        Ok(())
    }

    /// Spawn one dispatcher per registered job.
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.started {
            return Err(SchedulerError::AlreadyStarted);
        }
        self.started = true;

        for registration in &self.registrations {
            let registration = Arc::clone(registration);
            let cancel = self.cancel.clone();
            let tracker = self.tracker.clone();
            let handle = match registration.trigger.clone() {
                Trigger::Interval(period) => {
                    tokio::spawn(interval_dispatcher(registration, period, cancel, tracker))
                }
                Trigger::Calendar(calendar) => {
                    tokio::spawn(calendar_dispatcher(registration, calendar, cancel, tracker))
                }
            };
            self.dispatchers.push(handle);
        }

        info!(jobs = self.registrations.len(), "Scheduler started");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn job_names(&self) -> Vec<String> {
        self.registrations
            .iter()
            .map(|r| r.job.name().to_string())
            .collect()
    }

    pub fn stats(&self, job: &str) -> Option<JobStatsSnapshot> {
        self.registrations
            .iter()
            .find(|r| r.job.name() == job)
            .map(|r| r.stats.snapshot(r.in_flight()))
    }

    /// Stop dispatching and, optionally, wait up to `timeout` for running
    /// instances. Instances still running afterwards are abandoned and
    /// logged per job.
    pub async fn shutdown(&mut self, wait_for_in_flight: bool, timeout: Duration) -> ShutdownReport {
        info!(wait_for_in_flight, ?timeout, "Scheduler shutting down");
        self.cancel.cancel();
        for handle in self.dispatchers.drain(..) {
            if let Err(e) = handle.await {
                error!(?e, "Dispatcher task ended abnormally");
            }
        }
        self.tracker.close();

        if wait_for_in_flight
            && !self.tracker.is_empty()
            && tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok()
        {
            info!("All job instances finished");
        }

        let abandoned = self.tracker.len();
        if abandoned > 0 {
            for registration in &self.registrations {
                let in_flight = registration.in_flight();
                if in_flight > 0 {
                    warn!(
                        job = %registration.job.name(),
                        in_flight,
                        "Abandoning in-flight job instances"
                    );
                }
            }
        }

        info!(abandoned, "Scheduler stopped");
        ShutdownReport {
            completed_cleanly: abandoned == 0,
            abandoned,
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

async fn interval_dispatcher(
    registration: Arc<Registration>,
    period: Duration,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => dispatch(&registration, &tracker),
        }
    }
    debug!(job = %registration.job.name(), "Interval dispatcher stopped");
}

async fn calendar_dispatcher(
    registration: Arc<Registration>,
    calendar: CalendarTrigger,
    cancel: CancellationToken,
    tracker: TaskTracker,
) {
    let mut last_fire = None;
    loop {
        let now = Utc::now();
        let Some(next) = next_calendar_fire(&calendar, now, last_fire) else {
            error!(job = %registration.job.name(), "Calendar trigger can never fire");
            break;
        };
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        debug!(job = %registration.job.name(), next = %next, "Next calendar fire");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(wait) => {
                dispatch(&registration, &tracker);
                last_fire = Some(next);
            }
        }
    }
    debug!(job = %registration.job.name(), "Calendar dispatcher stopped");
}

/// Next calendar fire, never at or before the previous one even if the
/// wall clock was stepped back since.
fn next_calendar_fire(
    calendar: &CalendarTrigger,
    now: DateTime<Utc>,
    last_fire: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let from = last_fire.map_or(now, |last| now.max(last));
    calendar.next_fire_after(from)
}

fn dispatch(registration: &Arc<Registration>, tracker: &TaskTracker) {
    let name = registration.job.name();
    registration.stats.fired.fetch_add(1, Ordering::Relaxed);

    let Ok(permit) = Arc::clone(&registration.permits).try_acquire_owned() else {
        registration.stats.skipped.fetch_add(1, Ordering::Relaxed);
        Metrics::trigger_skipped(name);
        warn!(
            job = %name,
            max_instances = registration.max_instances,
            "Maximum running instances reached, trigger skipped"
        );
        return;
    };

    let registration = Arc::clone(registration);
    tracker.spawn(async move {
        let _permit = permit;
        run_instance(&registration).await;
    });
}

async fn run_instance(registration: &Registration) {
    let name = registration.job.name();
    let stats = &registration.stats;
    stats.started.fetch_add(1, Ordering::Relaxed);
    Metrics::job_started(name);

    let start = Instant::now();
    let result = AssertUnwindSafe(registration.job.run())
        .catch_unwind()
        .await;
    let elapsed = start.elapsed();
    let elapsed_ms = elapsed.as_millis() as u64;

    let outcome = match result {
        Ok(Ok(report)) => {
            stats.completed.fetch_add(1, Ordering::Relaxed);
            match &report {
                JobReport::Completed {
                    users,
                    actions,
                    failures,
                } => debug!(
                    job = %name,
                    users,
                    actions,
                    failures,
                    elapsed_ms,
                    "Job instance completed"
                ),
                JobReport::Skipped { reason } => {
                    debug!(job = %name, %reason, elapsed_ms, "Job instance skipped")
                }
            }
            report.outcome()
        }
        Ok(Err(e)) => {
            stats.failed.fetch_add(1, Ordering::Relaxed);
            error!(job = %name, error = %format!("{e:#}"), elapsed_ms, "Job instance failed");
            "failed"
        }
        Err(panic) => {
            stats.panicked.fetch_add(1, Ordering::Relaxed);
            error!(
                job = %name,
                panic = %panic_message(panic.as_ref()),
                elapsed_ms,
                "Job instance panicked"
            );
            "panicked"
        }
    };

    Metrics::job_finished(name, outcome, elapsed.as_secs_f64() * 1000.0);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
