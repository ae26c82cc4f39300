//! A single recurring job and the task that drives it.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{Instrument, debug, trace, warn};

use crate::telemetry::spans;

/// The body of a scheduled job. Invoked once per tick.
pub type JobAction = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`JobAction`].
pub fn job_action<F, Fut>(f: F) -> JobAction
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Active,
    Paused,
}

/// Registry entry for one job.
///
/// While `Active` the entry owns exactly one timer task through a drop
/// guard; dropping or replacing the guard cancels that task.
pub struct ScheduledJob {
    name: String,
    interval: Duration,
    action: JobAction,
    timer: Option<DropGuard>,
}

impl ScheduledJob {
    /// Create the job and start its timer. Requires a Tokio runtime.
    pub(crate) fn start(name: String, interval: Duration, action: JobAction) -> Self {
        let mut job = Self {
            name,
            interval,
            action,
            timer: None,
        };
        job.resume();
        job
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> JobState {
        if self.timer.is_some() {
            JobState::Active
        } else {
            JobState::Paused
        }
    }

    pub(crate) fn pause(&mut self) {
        self.timer = None;
    }

    /// Start a fresh timer, replacing (and cancelling) any live one.
    pub(crate) fn resume(&mut self) {
        let token = CancellationToken::new();
        tokio::spawn(run_timer(
            self.name.clone(),
            self.interval,
            Arc::clone(&self.action),
            token.clone(),
        ));
        self.timer = Some(token.drop_guard());
    }
}

impl fmt::Debug for ScheduledJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledJob")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}

/// Tick loop. The action is awaited before the next tick is awaited, so
/// ticks of one job never overlap; a slow action delays the schedule.
async fn run_timer(name: String, period: Duration, action: JobAction, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        run_tick(&name, &action).instrument(spans::job(&name)).await;
    }
    debug!(job = %name, "Job timer stopped");
}

async fn run_tick(name: &str, action: &JobAction) {
    trace!("Job tick");
    crate::metrics::record_job_tick(name);
    match AssertUnwindSafe(async { action().await }).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(error = %e, "Scheduled job failed");
            crate::metrics::record_job_failure(name);
        }
        Err(_) => {
            warn!("Scheduled job panicked");
            crate::metrics::record_job_failure(name);
        }
    }
}
