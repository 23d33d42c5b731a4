//! Message composer — renders the branch table into the HTML template.

use duemail_core::error::{DueMailError, Result};
use duemail_core::types::{BranchGroup, OverdueItemRow, RecipientSet, RenderedMessage};
use std::path::Path;

pub const TABLE_PLACEHOLDER: &str = "{{tableContent}}";
pub const BRANCH_PLACEHOLDER: &str = "{BRANCHES}";
pub const DUE_DATE_PLACEHOLDER: &str = "{DUEDATE}";

const TABLE_OPEN: &str = "<table role=\"presentation\" style=\"width: 100%; border: 1px solid #ccc; border-spacing: 0; table-layout: auto;\">";
const THEAD_OPEN: &str = "<thead style=\"font-size: 1.2em; line-height: 1.5em; font-family: Arial, sans-serif; text-align: center;\">";
const TH_OPEN: &str = "<th style=\"border: 1px solid; border-spacing: 0;\">";
const TD_OPEN: &str = "<td style=\"border: 1px solid; border-spacing: 0; vertical-align:top;\">";
const HEADERS: [&str; 3] = ["Topics", "Branches", "Due Date"];

/// The HTML body template, loaded once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    html: String,
}

impl Template {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let html = std::fs::read_to_string(path).map_err(|e| {
            DueMailError::Template(format!("Failed to read {}: {e}", path.display()))
        })?;
        if !html.contains(TABLE_PLACEHOLDER) {
            tracing::warn!(
                "⚠️ Template {} has no {TABLE_PLACEHOLDER} placeholder",
                path.display()
            );
        }
        Ok(Self { html })
    }

    pub fn as_str(&self) -> &str {
        &self.html
    }
}

/// Builds one [`RenderedMessage`] per branch group.
#[derive(Debug, Clone)]
pub struct MessageComposer {
    template: Template,
    subject_prefix: String,
}

impl MessageComposer {
    pub fn new(template: Template, subject_prefix: impl Into<String>) -> Self {
        Self {
            template,
            subject_prefix: subject_prefix.into(),
        }
    }

    pub fn subject(&self, branch: &str) -> String {
        format!("{}{branch}", self.subject_prefix)
    }

    /// Render the body for `group`. Pure: the same group and template
    /// always produce byte-identical output.
    pub fn render_body(&self, group: &BranchGroup) -> String {
        let branch = escape_html(&group.branch);
        let due_dates = escape_html(&group.due_dates().join(", "));
        let table = render_table(&group.rows);
        substitute(
            self.template.as_str(),
            &[
                (TABLE_PLACEHOLDER, table.as_str()),
                (BRANCH_PLACEHOLDER, branch.as_str()),
                (DUE_DATE_PLACEHOLDER, due_dates.as_str()),
            ],
        )
    }

    pub fn compose(&self, group: &BranchGroup, recipients: RecipientSet) -> RenderedMessage {
        RenderedMessage {
            branch: group.branch.clone(),
            subject: self.subject(&group.branch),
            html_body: self.render_body(group),
            recipients,
        }
    }
}

/// Replace every placeholder in one left-to-right pass over `template`.
/// Substituted text is never scanned again.
fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + 1024);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        rest = &rest[start..];
        match values.iter().find(|(key, _)| rest.starts_with(*key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &rest[key.len()..];
            }
            None => {
                out.push('{');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// One header row, then one body row per item in input order.
pub fn render_table(rows: &[OverdueItemRow]) -> String {
    let mut out = String::with_capacity(512 + rows.len() * 256);
    out.push_str(TABLE_OPEN);
    out.push_str(THEAD_OPEN);
    out.push_str("<tr>");
    for header in HEADERS {
        out.push_str(TH_OPEN);
        out.push_str(header);
        out.push_str("</th>");
    }
    out.push_str("</tr></thead><tbody>");

    for row in rows {
        out.push_str("<tr>");
        for cell in [&row.topic, &row.branch, &row.due_date] {
            out.push_str(TD_OPEN);
            out.push_str(&escape_html(cell));
            out.push_str("</td>");
        }
        out.push_str("</tr>");
    }

    out.push_str("</tbody></table>");
    out
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
