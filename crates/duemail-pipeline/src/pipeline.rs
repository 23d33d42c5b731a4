//! Pipeline runner — one invocation of the overdue digest.

use chrono::Local;
use duemail_core::config::DueMailConfig;
use duemail_core::error::{DueMailError, Result};
use duemail_core::traits::{ItemSource, Mailer};
use duemail_core::types::{
    BranchGroup, BranchOutcome, LogEntry, RecipientSet, RunSummary, SendOutcome,
};
use std::path::PathBuf;

use crate::audit::AuditLog;
use crate::compose::{MessageComposer, Template};
use crate::group::group_by_branch;
use crate::recipients::RecipientResolver;

/// Per-invocation settings, usually taken from [`DueMailConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub template_path: PathBuf,
    pub subject_prefix: String,
    pub validate_recipients: bool,
    pub audit_path: PathBuf,
    /// Compose everything, send nothing, write no audit lines.
    pub dry_run: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &DueMailConfig) -> Self {
        Self {
            template_path: config.template.path.clone(),
            subject_prefix: config.template.subject_prefix.clone(),
            validate_recipients: config.mail.validate_recipients,
            audit_path: config.audit.log_path.clone(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Fetch → group → compose/resolve → send → audit.
pub struct Pipeline<'a> {
    source: &'a dyn ItemSource,
    mailer: &'a dyn Mailer,
    settings: PipelineSettings,
    resolver: RecipientResolver,
    audit: AuditLog,
}

impl<'a> Pipeline<'a> {
    pub fn new(source: &'a dyn ItemSource, mailer: &'a dyn Mailer, settings: PipelineSettings) -> Self {
        Self {
            source,
            mailer,
            resolver: RecipientResolver::new(settings.validate_recipients),
            audit: AuditLog::new(settings.audit_path.clone()),
            settings,
        }
    }

    /// Run once. Only a data-source failure aborts the run; every other
    /// failure is recorded in that branch's [`BranchOutcome`].
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = Local::now();
        tracing::info!(
            "📬 Overdue digest starting (source: {}, mailer: {}{})",
            self.source.name(),
            self.mailer.name(),
            if self.settings.dry_run { ", dry run" } else { "" }
        );

        let rows = self.source.fetch_overdue().await?;
        let groups = group_by_branch(rows);
        tracing::info!("🗂️ {} branch group(s) to notify", groups.len());

        let mut outcomes = Vec::with_capacity(groups.len());
        if !groups.is_empty() {
            let composer = Template::load(&self.settings.template_path)
                .map(|t| MessageComposer::new(t, self.settings.subject_prefix.clone()));
            if let Err(e) = &composer {
                tracing::error!("❌ {e}");
            }

            for group in &groups {
                let recipients = self.resolver.resolve(group);
                let result = match &composer {
                    Ok(composer) => self.deliver(composer, group, recipients.clone()).await,
                    Err(e) => Err(template_failure(e)),
                };
                if let Err(e) = &result {
                    tracing::error!("❌ Branch '{}': {e}", group.branch);
                }
                outcomes.push(BranchOutcome {
                    branch: group.branch.clone(),
                    row_count: group.len(),
                    recipients,
                    result,
                });
            }
        }

        let summary = RunSummary {
            started_at,
            finished_at: Local::now(),
            outcomes,
        };
        if summary.is_clean() {
            tracing::info!("✅ Overdue digest finished: {} sent", summary.sent());
        } else {
            let failed: Vec<&str> = summary.failures().map(|o| o.branch.as_str()).collect();
            tracing::warn!(
                "⚠️ Overdue digest finished: {} sent, {} failed ({})",
                summary.sent(),
                summary.failed(),
                failed.join(", ")
            );
        }
        Ok(summary)
    }

    async fn deliver(
        &self,
        composer: &MessageComposer,
        group: &BranchGroup,
        recipients: RecipientSet,
    ) -> Result<()> {
        if recipients.is_empty() {
            return Err(DueMailError::NoRecipients(group.branch.clone()));
        }
        let message = composer.compose(group, recipients);

        if self.settings.dry_run {
            tracing::info!(
                "📝 [dry run] '{}' → {} ({} row(s), {} bytes)",
                message.subject,
                message.recipients.as_slice().join(", "),
                group.len(),
                message.html_body.len()
            );
            return Ok(());
        }

        let sent = self.mailer.send(&message).await;
        let outcome = match &sent {
            Ok(()) => {
                tracing::info!(
                    "📤 Email sent for branch '{}' to {} recipient(s) at {}",
                    group.branch,
                    message.recipients.len(),
                    Local::now().format("%Y-%m-%d %H:%M:%S")
                );
                SendOutcome::Sent
            }
            Err(e) => SendOutcome::Failed(e.to_string()),
        };
        self.audit.record(&LogEntry::for_group(group, outcome));
        sent
    }
}

fn template_failure(e: &DueMailError) -> DueMailError {
    match e {
        DueMailError::Template(msg) => DueMailError::Template(msg.clone()),
        other => DueMailError::Template(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use duemail_core::types::{OverdueItemRow, RenderedMessage};
    use std::path::Path;
    use std::sync::Mutex;

    const TEMPLATE: &str = "<p>{BRANCHES}: {DUEDATE}</p>{{tableContent}}";

    struct FakeSource(Option<Vec<OverdueItemRow>>);

    #[async_trait]
    impl ItemSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        async fn fetch_overdue(&self) -> Result<Vec<OverdueItemRow>> {
            self.0
                .clone()
                .ok_or_else(|| DueMailError::Database("Connect: refused".into()))
        }
    }

    #[derive(Default)]
    struct FakeMailer {
        sent: Mutex<Vec<RenderedMessage>>,
        fail_for: Vec<String>,
    }

    #[async_trait]
    impl Mailer for FakeMailer {
        fn name(&self) -> &str {
            "fake"
        }

        async fn send(&self, message: &RenderedMessage) -> Result<()> {
            if self.fail_for.contains(&message.branch) {
                return Err(DueMailError::Mail("SMTP send: 550 rejected".into()));
            }
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct Fixture {
        dir: PathBuf,
    }

    impl Fixture {
        fn new(name: &str) -> Self {
            let dir = std::env::temp_dir().join(format!("duemail-test-pipeline-{name}"));
            std::fs::remove_dir_all(&dir).ok();
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("template.html"), TEMPLATE).unwrap();
            Self { dir }
        }

        fn settings(&self) -> PipelineSettings {
            PipelineSettings {
                template_path: self.dir.join("template.html"),
                subject_prefix: "Reminder: ".into(),
                validate_recipients: false,
                audit_path: self.dir.join("email.log"),
                dry_run: false,
            }
        }

        fn log_lines(&self) -> Vec<String> {
            read_lines(&self.dir.join("email.log"))
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            std::fs::remove_dir_all(&self.dir).ok();
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .map(|s| s.lines().map(String::from).collect())
            .unwrap_or_default()
    }

    fn row(branch: &str, topic: &str, due: &str, leader: &str, co: &str) -> OverdueItemRow {
        OverdueItemRow::new(topic, branch, leader, co, due)
    }

    #[tokio::test]
    async fn test_single_branch_scenario() {
        let fx = Fixture::new("single");
        let source = FakeSource(Some(vec![
            row("A", "T1", "2024-01-01", "x@x.com", "y@y.com"),
            row("A", "T2", "2024-01-02", "x@x.com", "y@y.com"),
        ]));
        let mailer = FakeMailer::default();

        let summary = Pipeline::new(&source, &mailer, fx.settings()).run().await.unwrap();
        assert_eq!(summary.sent(), 1);
        assert!(summary.is_clean());
        assert_eq!(summary.outcomes[0].row_count, 2);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Reminder: A");
        assert_eq!(
            sent[0].recipients.as_slice(),
            &["x@x.com".to_string(), "y@y.com".to_string()]
        );
        assert!(sent[0].html_body.starts_with("<p>A: 2024-01-01, 2024-01-02</p>"));

        let lines = fx.log_lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Due Dates: 2024-01-01, 2024-01-02"));
    }

    #[tokio::test]
    async fn test_empty_result_sends_nothing() {
        let fx = Fixture::new("empty");
        let source = FakeSource(Some(Vec::new()));
        let mailer = FakeMailer::default();

        let summary = Pipeline::new(&source, &mailer, fx.settings()).run().await.unwrap();
        assert!(summary.outcomes.is_empty());
        assert!(mailer.sent.lock().unwrap().is_empty());
        assert!(fx.log_lines().is_empty());
    }

    #[tokio::test]
    async fn test_two_branches_independent() {
        let fx = Fixture::new("two");
        let source = FakeSource(Some(vec![
            row("A", "T1", "2024-01-01", "a1@x.com", "a2@x.com"),
            row("B", "T2", "2024-01-02", "b1@x.com", "b2@x.com"),
        ]));
        let mailer = FakeMailer::default();

        let summary = Pipeline::new(&source, &mailer, fx.settings()).run().await.unwrap();
        assert_eq!(summary.sent(), 2);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].branch, "A");
        assert!(sent[0].recipients.iter().all(|r| r.starts_with('a')));
        assert_eq!(sent[1].branch, "B");
        assert!(sent[1].recipients.iter().all(|r| r.starts_with('b')));
        assert!(!sent[1].html_body.contains("T1"));

        let lines = fx.log_lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("BRANCHES: A"));
        assert!(lines[1].contains("BRANCHES: B"));
    }

    #[tokio::test]
    async fn test_send_failure_does_not_stop_other_branches() {
        let fx = Fixture::new("isolation");
        let source = FakeSource(Some(vec![
            row("A", "T1", "2024-01-01", "a@x.com", "a@x.com"),
            row("B", "T2", "2024-01-02", "b@x.com", "b@x.com"),
            row("C", "T3", "2024-01-03", "c@x.com", "c@x.com"),
        ]));
        let mailer = FakeMailer {
            fail_for: vec!["A".into()],
            ..Default::default()
        };

        let summary = Pipeline::new(&source, &mailer, fx.settings()).run().await.unwrap();
        assert_eq!(summary.sent(), 2);
        assert_eq!(summary.failed(), 1);
        assert!(matches!(summary.outcomes[0].result, Err(DueMailError::Mail(_))));

        let branches: Vec<_> = mailer
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.branch.clone())
            .collect();
        assert_eq!(branches, ["B", "C"]);

        let lines = fx.log_lines();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("[FAILED: Mail error: SMTP send: 550 rejected]"));
        assert!(!lines[1].contains("FAILED"));
    }

    #[tokio::test]
    async fn test_unwritable_audit_log_does_not_fail_sends() {
        let fx = Fixture::new("auditblocked");
        let blocked = fx.dir.join("email.log");
        std::fs::create_dir_all(&blocked).unwrap();
        let source = FakeSource(Some(vec![
            row("A", "T1", "2024-01-01", "a@x.com", "a@x.com"),
            row("B", "T2", "2024-01-02", "b@x.com", "b@x.com"),
        ]));
        let mailer = FakeMailer::default();

        let summary = Pipeline::new(&source, &mailer, fx.settings()).run().await.unwrap();
        assert_eq!(summary.sent(), 2);
        assert_eq!(summary.failed(), 0);
        assert!(summary.is_clean());
        assert_eq!(mailer.sent.lock().unwrap().len(), 2);
        assert!(blocked.is_dir());
    }

    #[tokio::test]
    async fn test_missing_template_fails_each_branch_without_sending() {
        let fx = Fixture::new("notemplate");
        std::fs::remove_file(fx.dir.join("template.html")).unwrap();
        let source = FakeSource(Some(vec![
            row("A", "T1", "2024-01-01", "a@x.com", "a@x.com"),
            row("B", "T2", "2024-01-02", "b@x.com", "b@x.com"),
        ]));
        let mailer = FakeMailer::default();

        let summary = Pipeline::new(&source, &mailer, fx.settings()).run().await.unwrap();
        assert_eq!(summary.failed(), 2);
        assert!(
            summary
                .outcomes
                .iter()
                .all(|o| matches!(o.result, Err(DueMailError::Template(_))))
        );
        assert!(mailer.sent.lock().unwrap().is_empty());
        assert!(fx.log_lines().is_empty());
    }

    #[tokio::test]
    async fn test_branch_without_recipients() {
        let fx = Fixture::new("norecipients");
        let source = FakeSource(Some(vec![
            row("A", "T1", "2024-01-01", "", ""),
            row("B", "T2", "2024-01-02", "b@x.com", ""),
        ]));
        let mailer = FakeMailer::default();

        let summary = Pipeline::new(&source, &mailer, fx.settings()).run().await.unwrap();
        assert!(matches!(
            &summary.outcomes[0].result,
            Err(DueMailError::NoRecipients(b)) if b == "A"
        ));
        assert!(summary.outcomes[1].is_sent());
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
        assert_eq!(fx.log_lines().len(), 1);
    }

    #[tokio::test]
    async fn test_source_failure_aborts_run() {
        let fx = Fixture::new("sourcefail");
        let source = FakeSource(None);
        let mailer = FakeMailer::default();

        let err = Pipeline::new(&source, &mailer, fx.settings()).run().await.unwrap_err();
        assert!(matches!(err, DueMailError::Database(_)));
        assert!(fx.log_lines().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_sends_and_logs_nothing() {
        let fx = Fixture::new("dryrun");
        let source = FakeSource(Some(vec![row("A", "T1", "2024-01-01", "a@x.com", "b@x.com")]));
        let mailer = FakeMailer::default();

        let summary = Pipeline::new(&source, &mailer, fx.settings().dry_run(true))
            .run()
            .await
            .unwrap();
        assert_eq!(summary.sent(), 1);
        assert_eq!(summary.outcomes[0].recipients.len(), 2);
        assert!(mailer.sent.lock().unwrap().is_empty());
        assert!(fx.log_lines().is_empty());
    }
}
