//! Scheduler engine — the loop that arms the trigger and runs the job.
//! Uses tokio::interval for ticking; wall-clock is re-read on every tick
//! so suspend/resume and clock changes do not skew the fire time.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local};
use duemail_core::error::Result;

use crate::trigger::Trigger;

/// Job status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
    Exhausted,
}

/// The scheduled digest job and its run bookkeeping.
#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub name: String,
    pub trigger: Trigger,
    pub status: JobStatus,
    pub last_run: Option<DateTime<Local>>,
    pub next_run: Option<DateTime<Local>>,
    pub run_count: u32,
}

impl ScheduledJob {
    pub fn new(name: &str, trigger: Trigger) -> Self {
        Self {
            name: name.to_string(),
            trigger,
            status: JobStatus::Pending,
            last_run: None,
            next_run: None,
            run_count: 0,
        }
    }

    /// Compute `next_run` from `now`. Returns `false` once exhausted.
    pub fn arm(&mut self, now: DateTime<Local>) -> bool {
        self.next_run = self.trigger.next_after(&now, self.run_count);
        if self.next_run.is_none() {
            self.status = JobStatus::Exhausted;
        }
        self.next_run.is_some()
    }

    /// Check if the job should run now.
    pub fn should_run(&self, now: DateTime<Local>) -> bool {
        if matches!(self.status, JobStatus::Running | JobStatus::Exhausted) {
            return false;
        }
        self.next_run.is_some_and(|next| now >= next)
    }

    pub fn start(&mut self, now: DateTime<Local>) {
        tracing::info!("🔔 Job triggered: '{}'", self.name);
        self.status = JobStatus::Running;
        self.last_run = Some(now);
        self.run_count += 1;
    }

    pub fn finish(&mut self, result: &Result<()>) {
        self.status = match result {
            Ok(()) => JobStatus::Completed,
            Err(e) => JobStatus::Failed(e.to_string()),
        };
    }
}

/// Drive `job` until its trigger is exhausted or `shutdown` resolves.
///
/// Runs never overlap: the next fire time is computed only after the
/// previous run has returned. Shutdown is honored between runs; a run in
/// progress always completes. Returns the number of runs performed.
pub async fn run_scheduler<F, Fut, S>(
    mut job: ScheduledJob,
    mut run: F,
    shutdown: S,
    check_interval: Duration,
) -> u32
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    tracing::info!(
        "⏰ Scheduler started for '{}': {} (check every {}s)",
        job.name,
        job.trigger.describe(),
        check_interval.as_secs()
    );

    let mut interval = tokio::time::interval(check_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    while job.arm(Local::now()) {
        if let Some(next) = job.next_run {
            tracing::info!("📅 Next run of '{}' at {}", job.name, next.format("%Y-%m-%d %H:%M:%S"));
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("🛑 Scheduler stopping: shutdown requested");
                    return job.run_count;
                }
                _ = interval.tick() => {}
            }
            if job.should_run(Local::now()) {
                break;
            }
        }

        job.start(Local::now());
        let result = run().await;
        if let Err(e) = &result {
            tracing::warn!("⚠️ Job '{}' failed: {e}", job.name);
        }
        job.finish(&result);
    }

    tracing::info!("🏁 No further runs scheduled for '{}'", job.name);
    job.run_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use duemail_core::error::DueMailError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_job_lifecycle() {
        let now = Local::now();
        let at = (now - ChronoDuration::minutes(5)).naive_local();
        let mut job = ScheduledJob::new("digest", Trigger::once(at));

        assert!(job.arm(now));
        assert!(job.should_run(now));

        job.start(now);
        assert_eq!(job.status, JobStatus::Running);
        assert!(!job.should_run(now));

        job.finish(&Err(DueMailError::Database("down".into())));
        assert!(matches!(job.status, JobStatus::Failed(ref m) if m.contains("down")));

        assert!(!job.arm(now));
        assert_eq!(job.status, JobStatus::Exhausted);
        assert!(!job.should_run(now));
    }

    #[test]
    fn test_cron_job_waits() {
        let mut job = ScheduledJob::new("digest", Trigger::cron("0 10 3 * *").unwrap());
        let now = Local::now();
        assert!(job.arm(now));
        assert!(!job.should_run(now));
        assert!(job.next_run.unwrap() > now);
    }

    #[tokio::test]
    async fn test_once_in_past_runs_and_returns() {
        let at = (Local::now() - ChronoDuration::hours(1)).naive_local();
        let job = ScheduledJob::new("digest", Trigger::once(at));
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();

        let count = run_scheduler(
            job,
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
            std::future::pending::<()>(),
            Duration::from_millis(10),
        )
        .await;

        assert_eq!(count, 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_run_still_completes() {
        let at = (Local::now() - ChronoDuration::hours(1)).naive_local();
        let job = ScheduledJob::new("digest", Trigger::once(at));
        let count = run_scheduler(
            job,
            || async { Err(DueMailError::Database("refused".into())) },
            std::future::pending::<()>(),
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_waiting_scheduler() {
        let job = ScheduledJob::new("digest", Trigger::cron("0 10 3 * *").unwrap());
        let count = run_scheduler(
            job,
            || async { Ok(()) },
            tokio::time::sleep(Duration::from_millis(50)),
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(count, 0);
    }
}
