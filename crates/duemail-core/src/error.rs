//! Error type shared by every DueMail crate.

use thiserror::Error;

/// All failures the digest job can report.
#[derive(Debug, Error)]
pub enum DueMailError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("No recipients for branch '{0}'")]
    NoRecipients(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DueMailError>;
