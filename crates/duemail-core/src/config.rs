//! DueMail configuration system.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DueMailError, Result};
use crate::types::Attachment;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DueMailConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl DueMailConfig {
    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DueMailError::Config(format!("Failed to read config {}: {e}", path.display())))?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        config.expand_paths();
        Ok(config)
    }

    /// Parse config text without touching the environment.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| DueMailError::Config(format!("Failed to parse config: {e}")))
    }

    /// Write this config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DueMailError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the DueMail home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".duemail")
    }

    /// Secrets may come from the environment instead of the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("DUEMAIL_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(user) = std::env::var("DUEMAIL_MAIL_USERNAME") {
            self.mail.username = Some(user);
        }
        if let Ok(pass) = std::env::var("DUEMAIL_MAIL_PASSWORD") {
            self.mail.password = pass;
        }
    }

    fn expand_paths(&mut self) {
        self.template.path = expand_path(&self.template.path);
        self.audit.log_path = expand_path(&self.audit.log_path);
        for attachment in &mut self.mail.attachments {
            attachment.path = expand_path(&attachment.path);
        }
    }

    /// Check the settings every run needs.
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(DueMailError::Config("database.url is empty".into()));
        }
        if self.database.query.trim().is_empty() {
            return Err(DueMailError::Config("database.query is empty".into()));
        }
        if self.mail.email.trim().is_empty() {
            return Err(DueMailError::Config("mail.email is empty".into()));
        }
        if self.template.path.as_os_str().is_empty() {
            return Err(DueMailError::Config("template.path is empty".into()));
        }
        match (&self.schedule.cron, &self.schedule.run_at) {
            (Some(_), Some(_)) => Err(DueMailError::Config(
                "schedule.cron and schedule.run_at are mutually exclusive".into(),
            )),
            (None, None) => Err(DueMailError::Config(
                "schedule needs either cron or run_at".into(),
            )),
            (Some(expr), None) if expr.trim().is_empty() => {
                Err(DueMailError::Config("schedule.cron is empty".into()))
            }
            _ => Ok(()),
        }
    }
}

fn expand_path(p: &Path) -> PathBuf {
    match p.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).as_ref()),
        None => p.to_path_buf(),
    }
}

/// Data source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL (`postgres://…`, `sqlite://…`).
    #[serde(default)]
    pub url: String,
    /// Parameterless query returning the overdue rows.
    #[serde(default = "default_query")]
    pub query: String,
}

fn default_query() -> String {
    "SELECT * FROM sp_getdata_table()".into()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            query: default_query(),
        }
    }
}

/// Transport security for the SMTP session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    #[default]
    Starttls,
    Tls,
    None,
}

impl TlsMode {
    pub fn default_port(self) -> u16 {
        match self {
            TlsMode::Starttls => 587,
            TlsMode::Tls => 465,
            TlsMode::None => 25,
        }
    }
}

/// Which header carries the branch recipients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientHeader {
    #[default]
    Cc,
    To,
}

/// Mail transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Sending account address; also used to discover the SMTP host.
    #[serde(default)]
    pub email: String,
    /// Login name. Falls back to `email` when unset.
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Explicit SMTP host. When unset, `smtp.<email domain>` is used.
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub tls: TlsMode,
    #[serde(default)]
    pub recipient_header: RecipientHeader,
    #[serde(default)]
    pub validate_recipients: bool,
    #[serde(default = "bool_true")]
    pub verify_on_start: bool,
    #[serde(default = "default_attachments")]
    pub attachments: Vec<Attachment>,
}

fn bool_true() -> bool {
    true
}

fn default_attachments() -> Vec<Attachment> {
    let images = PathBuf::from("~/.duemail/images");
    vec![
        Attachment {
            path: images.join("some-logo.png"),
            content_id: "some-logo".into(),
        },
        Attachment {
            path: images.join("logo-b.png"),
            content_id: "logo-b".into(),
        },
    ]
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            username: None,
            password: String::new(),
            display_name: None,
            smtp_host: None,
            smtp_port: None,
            tls: TlsMode::default(),
            recipient_header: RecipientHeader::default(),
            validate_recipients: false,
            verify_on_start: true,
            attachments: default_attachments(),
        }
    }
}

impl MailConfig {
    pub fn login(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.email)
    }

    /// Resolve the SMTP host: explicit setting, else `smtp.<domain>`.
    pub fn resolve_host(&self) -> Result<String> {
        if let Some(host) = self.smtp_host.as_deref().filter(|h| !h.trim().is_empty()) {
            return Ok(host.trim().to_string());
        }
        let domain = self
            .email
            .rsplit_once('@')
            .map(|(_, d)| d.trim())
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                DueMailError::Config(format!(
                    "Cannot discover SMTP host from account '{}'",
                    self.email
                ))
            })?;
        Ok(format!("smtp.{domain}"))
    }

    pub fn resolve_port(&self) -> u16 {
        self.smtp_port.unwrap_or_else(|| self.tls.default_port())
    }
}

/// Email body template configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default = "default_template_path")]
    pub path: PathBuf,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_template_path() -> PathBuf {
    PathBuf::from("~/.duemail/templates/EmailTemplate.html")
}

fn default_subject_prefix() -> String {
    "This is Email Reminder for delayed job of : ".into()
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            path: default_template_path(),
            subject_prefix: default_subject_prefix(),
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
}

fn default_log_path() -> PathBuf {
    PathBuf::from("~/.duemail/logs/email.log")
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
        }
    }
}

/// When the job fires. Exactly one of `cron` / `run_at` is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Five-field cron expression in local time. Only defaulted when the
    /// whole `[schedule]` table is absent.
    #[serde(default)]
    pub cron: Option<String>,
    /// One-shot local start time.
    #[serde(default)]
    pub run_at: Option<NaiveDateTime>,
}

fn default_cron() -> Option<String> {
    Some("0 10 3 * *".into())
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
            run_at: None,
        }
    }
}
