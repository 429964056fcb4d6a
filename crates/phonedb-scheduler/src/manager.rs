//! Per-marketplace recurring jobs with a single-flight guard.
//!
//! Every marketplace gets its own timer task. A firing timer claims the
//! marketplace's running slot and then spawns the run as a separate task, so
//! aborting a timer (reschedule, shutdown) never interrupts a run that is
//! already in flight, and a run is visible to [`JobManager::wait_idle`] from
//! the moment it is claimed. Scheduled and manual runs go through the same
//! in-memory guard: a run requested while another is active for the same
//! marketplace is skipped, not queued.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use phonedb_core::MarketplacesFile;
use phonedb_db::{JobCompletion, ScrapingJobRow};
use phonedb_scraper::ScrapeRun;
use serde_json::json;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::SchedulerError;
use crate::schedule::{next_fire, next_run_after, validate_interval, TimerClock};
use crate::store::{JobStore, LogLevel};

/// Executes one scrape for a marketplace. Never fails; failures are carried
/// in the returned [`ScrapeRun`].
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, marketplace: &str) -> ScrapeRun;
}

/// A marketplace to schedule and its interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub marketplace: String,
    pub schedule_hours: u32,
}

impl JobSpec {
    /// One spec per enabled marketplace.
    #[must_use]
    pub fn from_marketplaces(file: &MarketplacesFile) -> Vec<Self> {
        file.enabled()
            .map(|m| Self {
                marketplace: m.name.clone(),
                schedule_hours: m.schedule_hours,
            })
            .collect()
    }
}

/// A persisted job row plus whether this process is running it right now.
#[derive(Debug, Clone)]
pub struct JobStatus {
    pub job: ScrapingJobRow,
    pub is_running: bool,
}

struct Inner {
    store: Arc<dyn JobStore>,
    runner: Arc<dyn JobRunner>,
    offset: FixedOffset,
    clock: TimerClock,
    schedules: Mutex<HashMap<String, u32>>,
    running: Mutex<HashSet<String>>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    idle: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A claimed running slot. Removes the marketplace from the running set
/// when dropped, however the run ends.
struct RunningGuard {
    inner: Arc<Inner>,
    marketplace: String,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut running = lock(&self.inner.running);
        running.remove(&self.marketplace);
        if running.is_empty() {
            self.inner.idle.notify_waiters();
        }
    }
}

#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl JobManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn JobStore>,
        runner: Arc<dyn JobRunner>,
        specs: Vec<JobSpec>,
        offset: FixedOffset,
    ) -> Self {
        let schedules = specs
            .into_iter()
            .map(|spec| (spec.marketplace, spec.schedule_hours))
            .collect();

        Self {
            inner: Arc::new(Inner {
                store,
                runner,
                offset,
                clock: TimerClock::start(),
                schedules: Mutex::new(schedules),
                running: Mutex::new(HashSet::new()),
                timers: Mutex::new(HashMap::new()),
                idle: Notify::new(),
            }),
        }
    }

    fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    fn interval_for(&self, marketplace: &str) -> Option<u32> {
        lock(&self.inner.schedules).get(marketplace).copied()
    }

    /// Resets rows left `running` by a previous process, creates missing job
    /// rows and starts one timer per marketplace.
    ///
    /// Returns the number of timers started.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Db`] if the job table cannot be read or
    /// written.
    pub async fn initialize_jobs(&self) -> Result<usize, SchedulerError> {
        tracing::info!("scheduler: initializing scheduled jobs");

        let reset = self.inner.store.reset_stale().await?;
        if reset > 0 {
            tracing::warn!(count = reset, "scheduler: reset jobs interrupted by a previous shutdown");
        }

        let mut specs: Vec<(String, u32)> = lock(&self.inner.schedules)
            .iter()
            .map(|(name, hours)| (name.clone(), *hours))
            .collect();
        specs.sort();

        for (marketplace, hours) in &specs {
            let next_run = next_run_after(self.now(), *hours);
            if self.inner.store.ensure_job(marketplace, *hours, next_run).await? {
                tracing::info!(marketplace = %marketplace, "scheduler: created job record");
            }
            self.schedule(marketplace, *hours);
        }

        tracing::info!(count = specs.len(), "scheduler: initialized scheduled jobs");
        Ok(specs.len())
    }

    /// Starts (or replaces) the timer for `marketplace`.
    fn schedule(&self, marketplace: &str, hours: u32) {
        let manager = self.clone();
        let name = marketplace.to_string();

        let handle = tokio::spawn(async move {
            loop {
                let now = manager.now();
                let fire_at = next_fire(now, hours, manager.inner.offset);
                let wait = (fire_at - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                // no await between claim and spawn, so an abort cannot land
                // between them
                if let Some(guard) = manager.claim(&name) {
                    let run_manager = manager.clone();
                    tokio::spawn(async move {
                        run_manager.run_claimed(guard).await;
                    });
                }
            }
        });

        if let Some(previous) = lock(&self.inner.timers).insert(marketplace.to_string(), handle) {
            previous.abort();
        }
        tracing::info!(
            marketplace,
            every_hours = hours,
            "scheduler: scheduled job at top of hour"
        );
    }

    /// Takes the running slot for `marketplace`, or `None` if a run already
    /// holds it.
    fn claim(&self, marketplace: &str) -> Option<RunningGuard> {
        if !lock(&self.inner.running).insert(marketplace.to_string()) {
            tracing::warn!(marketplace, "scheduler: job already running, skipping");
            return None;
        }
        Some(RunningGuard {
            inner: Arc::clone(&self.inner),
            marketplace: marketplace.to_string(),
        })
    }

    /// Runs one scrape for `marketplace` under the single-flight guard and
    /// records the outcome.
    ///
    /// Returns `None` when the run was skipped because one is already active
    /// or the job row could not be moved to `running`.
    pub async fn execute_job(&self, marketplace: &str) -> Option<ScrapeRun> {
        let guard = self.claim(marketplace)?;
        self.run_claimed(guard).await
    }

    async fn run_claimed(&self, guard: RunningGuard) -> Option<ScrapeRun> {
        let marketplace = guard.marketplace.as_str();
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(marketplace, %run_id, "scheduler: executing job");

        if let Err(e) = self.inner.store.start(marketplace).await {
            tracing::error!(marketplace, error = %e, "scheduler: could not mark job running");
            return None;
        }

        let run = self.inner.runner.run(marketplace).await;
        let duration_seconds = started.elapsed().as_secs_f64();

        let hours = self.interval_for(marketplace).unwrap_or(1);
        let completion = JobCompletion {
            succeeded: run.is_success(),
            items_scraped: i32::try_from(run.stats.items_scraped).unwrap_or(i32::MAX),
            duration_seconds,
            error_message: run.error().map(str::to_string),
            next_run: next_run_after(self.now(), hours),
        };

        if let Err(e) = self.inner.store.complete(marketplace, &completion).await {
            tracing::error!(marketplace, error = %e, "scheduler: failed to record job completion");
        }
        self.audit(marketplace, run_id, &run, &completion).await;

        tracing::info!(
            marketplace,
            %run_id,
            status = completion.status(),
            items = run.stats.items_scraped,
            duration_secs = duration_seconds,
            "scheduler: job finished"
        );
        Some(run)
    }

    async fn audit(
        &self,
        marketplace: &str,
        run_id: Uuid,
        run: &ScrapeRun,
        completion: &JobCompletion,
    ) {
        let (level, message) = match run.error() {
            Some(error) => (LogLevel::Error, format!("Scraping failed: {error}")),
            None => (
                LogLevel::Info,
                format!(
                    "Scraping completed: {} items in {:.0}s",
                    run.stats.items_scraped, completion.duration_seconds
                ),
            ),
        };
        let details = json!({
            "status": completion.status(),
            "items_scraped": run.stats.items_scraped,
            "new_listings": run.stats.new_listings,
            "updated_listings": run.stats.updated_listings,
            "duration_seconds": completion.duration_seconds,
            "error": run.error(),
        });

        if let Err(e) = self
            .inner
            .store
            .append_log(marketplace, run_id, level, &message, &details)
            .await
        {
            tracing::error!(marketplace, error = %e, "scheduler: failed to write audit log");
        }
    }

    /// Runs `marketplace` now. Skipped when a run is already active.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownMarketplace`] if `marketplace` is
    /// not scheduled.
    pub async fn trigger_job(&self, marketplace: &str) -> Result<Option<ScrapeRun>, SchedulerError> {
        if self.interval_for(marketplace).is_none() {
            return Err(SchedulerError::UnknownMarketplace(marketplace.to_string()));
        }
        tracing::info!(marketplace, "scheduler: manually triggering job");
        Ok(self.execute_job(marketplace).await)
    }

    /// Persists a new interval and restarts the marketplace timer with it.
    /// An active run is unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidInterval`] outside 1..=24 hours,
    /// [`SchedulerError::UnknownMarketplace`] for an unscheduled name, or
    /// [`SchedulerError::Db`] if the job row cannot be updated.
    pub async fn update_job_schedule(
        &self,
        marketplace: &str,
        hours: u32,
    ) -> Result<(), SchedulerError> {
        let hours = validate_interval(hours)?;
        if self.interval_for(marketplace).is_none() {
            return Err(SchedulerError::UnknownMarketplace(marketplace.to_string()));
        }

        let next_run = next_run_after(self.now(), hours);
        self.inner
            .store
            .reschedule(marketplace, hours, next_run)
            .await?;

        lock(&self.inner.schedules).insert(marketplace.to_string(), hours);
        self.schedule(marketplace, hours);

        tracing::info!(marketplace, every_hours = hours, "scheduler: updated job schedule");
        Ok(())
    }

    /// Persisted job rows annotated with live running state.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Db`] if the rows cannot be read.
    pub async fn get_job_statuses(&self) -> Result<Vec<JobStatus>, SchedulerError> {
        let jobs = self.inner.store.list().await?;
        let running = lock(&self.inner.running);
        Ok(jobs
            .into_iter()
            .map(|job| JobStatus {
                is_running: running.contains(&job.marketplace),
                job,
            })
            .collect())
    }

    #[must_use]
    pub fn is_running(&self, marketplace: &str) -> bool {
        lock(&self.inner.running).contains(marketplace)
    }

    /// Cancels every future timer firing. Runs already in flight continue.
    pub fn stop_all(&self) {
        tracing::info!("scheduler: stopping all scheduled jobs");
        for (marketplace, timer) in lock(&self.inner.timers).drain() {
            timer.abort();
            tracing::info!(marketplace = %marketplace, "scheduler: stopped job");
        }
    }

    /// Resolves once no run is active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if lock(&self.inner.running).is_empty() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
