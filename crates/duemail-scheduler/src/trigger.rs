//! Trigger definitions — when the digest job fires.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use duemail_core::config::ScheduleConfig;
use duemail_core::error::{DueMailError, Result};

use crate::cron::CronSchedule;

/// Upper bound on the length of a DST gap.
const MAX_GAP_MINUTES: i64 = 3 * 60;

/// How/when the job triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Run once at a specific local time. A time already in the past
    /// fires immediately.
    Once { at: NaiveDateTime },
    /// Run on a recurring cron schedule, in local time.
    Cron(CronSchedule),
}

impl Trigger {
    pub fn cron(expression: &str) -> Result<Self> {
        CronSchedule::parse(expression)
            .map(Trigger::Cron)
            .map_err(DueMailError::Config)
    }

    pub fn once(at: NaiveDateTime) -> Self {
        Trigger::Once { at }
    }

    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        match (&config.cron, &config.run_at) {
            (Some(expr), None) => Self::cron(expr),
            (None, Some(at)) => Ok(Self::once(*at)),
            (Some(_), Some(_)) => Err(DueMailError::Config(
                "schedule.cron and schedule.run_at are mutually exclusive".into(),
            )),
            (None, None) => Err(DueMailError::Config(
                "schedule needs either cron or run_at".into(),
            )),
        }
    }

    /// Next fire time after `now`, given how many times the trigger has
    /// already fired. `None` means exhausted.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>, fired: u32) -> Option<DateTime<Tz>> {
        let tz = now.timezone();
        match self {
            Trigger::Once { at } => {
                if fired > 0 {
                    return None;
                }
                let at = resolve_after_gap(&tz, *at)?;
                Some(if at > *now { at } else { now.clone() })
            }
            Trigger::Cron(schedule) => {
                let mut cursor = now.naive_local();
                // A wall-clock time skipped by a DST jump has no instant;
                // move on to the next candidate.
                for _ in 0..4 {
                    let naive = schedule.next_after(cursor)?;
                    if let Some(t) = resolve_local(&tz, naive) {
                        return Some(t);
                    }
                    cursor = naive;
                }
                None
            }
        }
    }

    /// The next `n` fire times, for display.
    pub fn upcoming<Tz: TimeZone>(&self, now: &DateTime<Tz>, n: usize) -> Vec<DateTime<Tz>> {
        let mut out: Vec<DateTime<Tz>> = Vec::with_capacity(n);
        let mut cursor = now.clone();
        for fired in 0..n as u32 {
            let Some(next) = self.next_after(&cursor, fired) else {
                break;
            };
            cursor = next.clone();
            out.push(next);
        }
        out
    }

    pub fn describe(&self) -> String {
        match self {
            Trigger::Once { at } => format!("once at {at}"),
            Trigger::Cron(s) => format!("cron '{s}'"),
        }
    }
}

fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive).earliest()
}

/// Like [`resolve_local`], but a wall-clock time skipped by a DST jump
/// resolves to the first minute that exists after the gap.
fn resolve_after_gap<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    (0..=MAX_GAP_MINUTES)
        .find_map(|m| resolve_local(tz, naive + Duration::minutes(m)))
}
