//! Job scheduler for riskctl.
//!
//! Jobs are registered once at startup with a trigger and an instance cap:
//! - `Trigger::Interval`: fires every N seconds
//! - `Trigger::Calendar`: fires on selected weekdays at a local wall-clock time
//!
//! A trigger that fires while the job is already running `max_instances`
//! copies is skipped, never queued.

pub mod error;
pub mod job;
pub mod scheduler;
pub mod trigger;

pub use error::{SchedulerError, SchedulerResult};
pub use job::{BoxFuture, DynScheduledJob, JobReport, ScheduledJob};
pub use scheduler::{JobStatsSnapshot, Scheduler, ShutdownReport};
pub use trigger::{parse_weekdays, CalendarTrigger, Trigger, TriggerConfig};
