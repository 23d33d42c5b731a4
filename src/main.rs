//! # DueMail — overdue-item digest
//!
//! Queries the overdue work items, groups them by branch and mails each
//! branch leader/co-leader pair one HTML reminder.
//!
//! Usage:
//!   duemail                          # Run the scheduler (default: 3rd of month, 10:00)
//!   duemail run-now                  # Run the digest once, immediately
//!   duemail preview                  # Compose every message, send nothing
//!   duemail next -n 3                # Show upcoming fire times
//!   duemail init                     # Write a default config file

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use duemail_core::DueMailConfig;
use duemail_core::types::RunSummary;
use duemail_mail::SmtpMailer;
use duemail_pipeline::{Pipeline, PipelineSettings};
use duemail_scheduler::{ScheduledJob, Trigger, run_scheduler};
use duemail_source::SqlItemSource;
use tracing_subscriber::EnvFilter;

/// How often the scheduler re-reads the wall clock.
const CHECK_INTERVAL_SECS: u64 = 30;

#[derive(Parser)]
#[command(
    name = "duemail",
    version,
    about = "📬 DueMail — per-branch overdue-item reminders"
)]
struct Cli {
    /// Config file (default: ~/.duemail/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler until the trigger is exhausted or Ctrl-C
    Serve,
    /// Run the digest once, immediately
    RunNow,
    /// Fetch and compose every message without sending
    Preview,
    /// Print the next fire times of the configured trigger
    Next {
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },
    /// Write a default config file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "duemail=debug" } else { "duemail=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_path = cli.config.unwrap_or_else(DueMailConfig::default_path);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Init => init_config(&config_path),
        Command::Serve => serve(&load_config(&config_path)?).await,
        Command::RunNow => {
            let summary = run_once(&load_config(&config_path)?, false).await?;
            print_summary(&summary);
            Ok(())
        }
        Command::Preview => {
            let summary = run_once(&load_config(&config_path)?, true).await?;
            print_summary(&summary);
            Ok(())
        }
        Command::Next { count } => {
            let config = load_config(&config_path)?;
            let trigger = Trigger::from_config(&config.schedule)?;
            println!("📅 {}", trigger.describe());
            let upcoming = trigger.upcoming(&Local::now(), count);
            if upcoming.is_empty() {
                println!("   (no further runs)");
            }
            for at in upcoming {
                println!("   {}", at.format("%Y-%m-%d %H:%M %Z"));
            }
            Ok(())
        }
    }
}

fn load_config(path: &Path) -> Result<DueMailConfig> {
    if !path.exists() {
        anyhow::bail!(
            "No config at {}, run `duemail init` to create one",
            path.display()
        );
    }
    let config = DueMailConfig::load_from(path)?;
    config.validate()?;
    tracing::debug!("⚙️ Loaded config from {}", path.display());
    Ok(config)
}

fn init_config(path: &Path) -> Result<()> {
    if path.exists() {
        println!("⚠️  Config already exists: {}", path.display());
        return Ok(());
    }
    DueMailConfig::default()
        .save_to(path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("✅ Default config written to {}", path.display());
    println!("   Set [database] url and [mail] email/password before the first run.");
    Ok(())
}

/// Run the scheduler; returning from here is the process-exit signal.
async fn serve(config: &DueMailConfig) -> Result<()> {
    let trigger = Trigger::from_config(&config.schedule)?;
    let job = ScheduledJob::new("overdue-digest", trigger);

    let runs = run_scheduler(
        job,
        move || async move { run_once(config, false).await.map(|_| ()) },
        shutdown_signal(),
        Duration::from_secs(CHECK_INTERVAL_SECS),
    )
    .await;

    tracing::info!("👋 DueMail exiting after {runs} run(s)");
    Ok(())
}

/// One invocation: fresh data-source connection and mail session.
async fn run_once(config: &DueMailConfig, dry_run: bool) -> duemail_core::Result<RunSummary> {
    let source = SqlItemSource::from_config(&config.database);
    let mailer = SmtpMailer::new(&config.mail)?;
    if !dry_run && config.mail.verify_on_start {
        mailer.verify().await?;
    }
    let settings = PipelineSettings::from_config(config).dry_run(dry_run);
    Pipeline::new(&source, &mailer, settings).run().await
}

fn print_summary(summary: &RunSummary) {
    println!(
        "📬 {} branch(es): {} ok, {} failed ({}s)",
        summary.outcomes.len(),
        summary.sent(),
        summary.failed(),
        (summary.finished_at - summary.started_at).num_seconds()
    );
    for outcome in &summary.outcomes {
        let status = match &outcome.result {
            Ok(()) => "✅".to_string(),
            Err(e) => format!("❌ {e}"),
        };
        println!(
            "   {} — {} row(s) → {} {}",
            outcome.branch,
            outcome.row_count,
            outcome.recipients.as_slice().join(", "),
            status
        );
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("⚠️ Ctrl-C handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
}
