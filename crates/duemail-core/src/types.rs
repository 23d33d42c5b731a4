//! Data model — rows fetched from the database, branch groups,
//! rendered messages, audit entries and per-run summaries.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One overdue work item as returned by the data query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueItemRow {
    pub topic: String,
    pub branch: String,
    pub leader_email: String,
    pub co_leader_email: String,
    pub due_date: String,
}

impl OverdueItemRow {
    pub fn new(
        topic: impl Into<String>,
        branch: impl Into<String>,
        leader_email: impl Into<String>,
        co_leader_email: impl Into<String>,
        due_date: impl Into<String>,
    ) -> Self {
        Self {
            topic: topic.into(),
            branch: branch.into(),
            leader_email: leader_email.into(),
            co_leader_email: co_leader_email.into(),
            due_date: due_date.into(),
        }
    }
}

/// All rows sharing one branch value, in query order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchGroup {
    pub branch: String,
    pub rows: Vec<OverdueItemRow>,
}

impl BranchGroup {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            rows: Vec::new(),
        }
    }

    /// Due dates of every row, duplicates kept.
    pub fn due_dates(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.due_date.clone()).collect()
    }

    pub fn topics(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.topic.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Deduplicated recipient list. Keeps first-seen order so output is
/// deterministic; the transport makes no ordering promise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientSet {
    addresses: Vec<String>,
}

impl RecipientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address. Returns `false` if it was already present.
    pub fn insert(&mut self, address: impl Into<String>) -> bool {
        let address = address.into();
        if self.addresses.contains(&address) {
            return false;
        }
        self.addresses.push(address);
        true
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.iter().any(|a| a == address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.addresses.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.addresses
    }
}

impl<'a> IntoIterator for &'a RecipientSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.iter()
    }
}

/// A fully composed message for one branch, ready to hand to a [`crate::Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub branch: String,
    pub subject: String,
    pub html_body: String,
    pub recipients: RecipientSet,
}

/// An inline image referenced from the HTML body as `cid:<content_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub path: PathBuf,
    pub content_id: String,
}

/// Result of a single send attempt, as recorded in the audit log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Failed(String),
}

/// One audit line.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub branch: String,
    pub topics: Vec<String>,
    pub due_dates: Vec<String>,
    pub outcome: SendOutcome,
}

impl LogEntry {
    pub fn for_group(group: &BranchGroup, outcome: SendOutcome) -> Self {
        Self {
            timestamp: Local::now(),
            branch: group.branch.clone(),
            topics: group.topics(),
            due_dates: group.due_dates(),
            outcome,
        }
    }

    /// Render as a single log-file line (no trailing newline).
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "Sending email at  {} to BRANCHES: {} for Topics: {} Due Dates: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.branch,
            self.topics.join(", "),
            self.due_dates.join(", "),
        );
        if let SendOutcome::Failed(reason) = &self.outcome {
            line.push_str(&format!(" [FAILED: {reason}]"));
        }
        line
    }
}

/// What happened to one branch group during a run.
#[derive(Debug)]
pub struct BranchOutcome {
    pub branch: String,
    pub row_count: usize,
    pub recipients: RecipientSet,
    pub result: crate::Result<()>,
}

impl BranchOutcome {
    pub fn is_sent(&self) -> bool {
        self.result.is_ok()
    }
}

/// Summary of a full pipeline invocation.
#[derive(Debug)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub outcomes: Vec<BranchOutcome>,
}

impl RunSummary {
    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.sent()
    }

    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &BranchOutcome> {
        self.outcomes.iter().filter(|o| !o.is_sent())
    }
}
