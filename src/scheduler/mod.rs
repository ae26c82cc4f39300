//! Interval-driven job registry.
//!
//! Each job moves through `Active ⇄ Paused` until it is unregistered. An
//! active job owns one timer task; pausing drops it, resuming starts a new
//! one at the same interval. Other components can register jobs by
//! publishing [`AddSchedulerJob`] instead of holding a scheduler reference.

mod job;

pub use job::{JobAction, JobState, ScheduledJob, job_action};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{HandlerResult, SchedulerError};
use crate::events::AddSchedulerJob;
use crate::signals::{SignalBus, SignalListener, SubscriptionId};

#[derive(Debug, Default)]
pub struct Scheduler {
    jobs: DashMap<String, ScheduledJob>,
    closed: AtomicBool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for [`AddSchedulerJob`] signals on `bus`.
    pub fn attach(self: &Arc<Self>, bus: &SignalBus) -> SubscriptionId {
        bus.subscribe::<AddSchedulerJob, _>(Arc::clone(self))
    }

    /// Register a job and start its timer. The first run happens one
    /// `interval` from now.
    pub fn register_job(
        &self,
        name: impl Into<String>,
        interval: Duration,
        action: JobAction,
    ) -> Result<(), SchedulerError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchedulerError::InvalidArgument("job name must not be empty"));
        }
        if interval.is_zero() {
            return Err(SchedulerError::InvalidArgument("job interval must be positive"));
        }
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }

        let name = match self.jobs.entry(name) {
            Entry::Occupied(entry) => return Err(SchedulerError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let name = entry.key().clone();
                entry.insert(ScheduledJob::start(name.clone(), interval, action));
                name
            }
        };

        // A shutdown that raced the insert has already cleared the map.
        if self.is_closed() {
            self.jobs.remove(&name);
            return Err(SchedulerError::Closed);
        }
        info!(job = %name, interval_ms = interval.as_millis() as u64, "Job registered");
        Ok(())
    }

    /// Stop and forget a job. Returns `false` if it was not registered.
    pub fn unregister_job(&self, name: &str) -> bool {
        let removed = self.jobs.remove(name).is_some();
        if removed {
            info!(job = %name, "Job unregistered");
        }
        removed
    }

    pub fn pause_job(&self, name: &str) -> Result<(), SchedulerError> {
        let mut job = self
            .jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::NotFound(name.to_string()))?;
        job.pause();
        debug!(job = %name, "Job paused");
        Ok(())
    }

    /// Restart a job's timer. On an active job this replaces the timer.
    pub fn resume_job(&self, name: &str) -> Result<(), SchedulerError> {
        if self.is_closed() {
            return Err(SchedulerError::Closed);
        }
        let mut job = self
            .jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::NotFound(name.to_string()))?;
        job.resume();
        debug!(job = %name, "Job resumed");
        Ok(())
    }

    pub fn is_job_registered(&self, name: &str) -> bool {
        self.jobs.contains_key(name)
    }

    pub fn job_state(&self, name: &str) -> Option<JobState> {
        self.jobs.get(name).map(|job| job.state())
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Cancel every timer, clear the registry and refuse later
    /// registrations. A tick already running finishes; no further ticks
    /// start.
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let count = self.jobs.len();
        self.jobs.clear();
        debug!(count, "Scheduler stopped");
    }
}

#[async_trait]
impl SignalListener<AddSchedulerJob> for Scheduler {
    async fn on_signal(&self, signal: &AddSchedulerJob) -> HandlerResult {
        if let Err(e) = self.register_job(
            signal.name.clone(),
            signal.interval,
            Arc::clone(&signal.action),
        ) {
            warn!(job = %signal.name, error = %e, "Dynamic job registration rejected");
        }
        Ok(())
    }
}
