//! Background timer task — the cron service run-loop.
//!
//! Computes the earliest upcoming fire time across all schedules and parks
//! on `tokio::time::sleep` until then. Zero polling: the task wakes only when
//! a timer fires or shutdown is requested.

use chrono::{DateTime, Local};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::subsystems::runtime::{Component, ComponentFuture};

use super::{Job, WeeklySchedule};

/// Emits [`Job`]s on `job_tx` according to the configured schedules.
pub struct CronService {
    schedules: Vec<(Job, WeeklySchedule)>,
    job_tx: mpsc::Sender<Job>,
}

impl CronService {
    pub fn new(schedules: Vec<(Job, WeeklySchedule)>, job_tx: mpsc::Sender<Job>) -> Self {
        Self { schedules, job_tx }
    }

    /// Run the timer loop until shutdown or until the job receiver is gone.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        info!(schedules = self.schedules.len(), "cron service running");

        // Guards against a timer that wakes marginally before the wall-clock
        // deadline and would otherwise re-select the same fire time.
        let mut last_fired: Option<DateTime<Local>> = None;

        loop {
            let now = Local::now();
            let from = last_fired.map_or(now, |t| t.max(now));

            let next = self
                .schedules
                .iter()
                .filter_map(|(job, sched)| sched.next_fire(from).map(|at| (at, *job)))
                .min_by_key(|(at, _)| *at);

            let Some((at, job)) = next else {
                info!("cron service has nothing to schedule — idle until shutdown");
                shutdown.cancelled().await;
                return Ok(());
            };

            let delay = (at - now).to_std().unwrap_or_default();
            debug!(%job, fire_at = %at, delay_secs = delay.as_secs(), "next timer");

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("cron service shutting down");
                    return Ok(());
                }

                _ = tokio::time::sleep(delay) => {
                    last_fired = Some(at);
                    info!(%job, "cron firing");
                    if self.job_tx.send(job).await.is_err() {
                        warn!(%job, "job receiver closed — stopping cron service");
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl Component for CronService {
    fn id(&self) -> &str {
        "cron"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin((*self).run(shutdown))
    }
}
