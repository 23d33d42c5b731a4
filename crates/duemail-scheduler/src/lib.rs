//! # DueMail Scheduler
//!
//! Fires the digest job on a recurring cron schedule (or once, at a fixed
//! local time) and hands control back when there is nothing left to run.
//!
//! ```text
//! run_scheduler (tokio interval tick)
//!   ├── Cron "0 10 3 * *"  → 3rd of every month, 10:00 local
//!   ├── Once 2026-11-03T10:00 → fires once, then exhausted
//!   └── on fire → job().await (never overlapping), then re-arm
//! ```
//!
//! The future returned by [`run_scheduler`] is the completion signal:
//! it resolves when the trigger is exhausted or shutdown is requested.

pub mod cron;
pub mod engine;
pub mod trigger;

pub use cron::CronSchedule;
pub use engine::{JobStatus, ScheduledJob, run_scheduler};
pub use trigger::Trigger;
