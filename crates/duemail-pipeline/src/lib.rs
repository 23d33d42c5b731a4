//! # DueMail Pipeline
//!
//! Turns a flat overdue result set into one rendered reminder per branch.
//!
//! ```text
//! ItemSource ──rows──▶ group_by_branch
//!                        │  (first-occurrence order)
//!                        ▼
//!               ┌── MessageComposer (table + placeholders + subject)
//!   per group ──┤
//!               └── RecipientResolver (leaders ∪ co-leaders, dedup)
//!                        │
//!                        ▼
//!                     Mailer ──▶ AuditLog (one line per send attempt)
//! ```
//!
//! Failures after the fetch are isolated per branch: a bad template,
//! an empty recipient list or a rejected send is recorded in that
//! branch's outcome and the loop moves on.

pub mod audit;
pub mod compose;
pub mod group;
pub mod pipeline;
pub mod recipients;

pub use audit::AuditLog;
pub use compose::{MessageComposer, Template};
pub use group::group_by_branch;
pub use pipeline::{Pipeline, PipelineSettings};
pub use recipients::RecipientResolver;
