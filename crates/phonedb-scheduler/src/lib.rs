//! Recurring marketplace scrapes.
//!
//! [`JobManager`] owns one timer and one single-flight slot per marketplace
//! and records every run through a [`JobStore`]. [`Pipeline`] is the
//! production [`JobRunner`]: extract, persist, notify.

pub mod error;
pub mod manager;
pub mod notify;
pub mod pipeline;
pub mod schedule;
pub mod store;

pub use error::SchedulerError;
pub use manager::{JobManager, JobRunner, JobSpec, JobStatus};
pub use notify::{LogNotifier, Notifier};
pub use pipeline::Pipeline;
pub use schedule::{fixed_offset, next_fire, next_run_after, validate_interval};
pub use store::{JobStore, LogLevel, PgJobStore};
