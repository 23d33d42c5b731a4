//! # DueMail Core
//!
//! Shared building blocks for the overdue-item digest job:
//! configuration, the error type, the row/group/message data model,
//! and the traits that sit at the data-source and mail-transport seams.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::DueMailConfig;
pub use error::{DueMailError, Result};
pub use traits::{ItemSource, Mailer};
pub use types::{
    Attachment, BranchGroup, BranchOutcome, LogEntry, OverdueItemRow, RecipientSet,
    RenderedMessage, RunSummary, SendOutcome,
};
