//! Recipient resolver — leaders and co-leaders of a branch, deduplicated.

use duemail_core::types::{BranchGroup, RecipientSet};
use regex::Regex;
use std::sync::OnceLock;

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_re() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap()
    })
}

/// Whether `address` looks like a deliverable mailbox.
pub fn is_valid_email(address: &str) -> bool {
    email_re().is_match(address)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecipientResolver {
    validate: bool,
}

impl RecipientResolver {
    pub fn new(validate: bool) -> Self {
        Self { validate }
    }

    /// All leaders in row order, then all co-leaders in row order.
    /// Exact-string duplicates collapse to the first occurrence; blank
    /// cells are skipped.
    pub fn resolve(&self, group: &BranchGroup) -> RecipientSet {
        let mut set = RecipientSet::new();
        let leaders = group.rows.iter().map(|r| r.leader_email.as_str());
        let co_leaders = group.rows.iter().map(|r| r.co_leader_email.as_str());

        for address in leaders.chain(co_leaders) {
            let address = address.trim();
            if address.is_empty() || set.contains(address) {
                continue;
            }
            if self.validate && !is_valid_email(address) {
                tracing::warn!(
                    "⚠️ Skipping invalid address '{address}' for branch '{}'",
                    group.branch
                );
                continue;
            }
            set.insert(address);
        }

        set
    }
}
