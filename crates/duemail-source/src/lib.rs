//! # DueMail Source
//!
//! Runs the parameterless overdue query against a relational database and
//! maps the result set into [`OverdueItemRow`]s.
//!
//! Uses the sqlx `Any` driver: PostgreSQL in production, SQLite for local
//! runs and tests. One connection per invocation, closed before the rows
//! are handed back, so no transaction is held across mail sending.

use async_trait::async_trait;
use duemail_core::config::DatabaseConfig;
use duemail_core::error::{DueMailError, Result};
use duemail_core::traits::ItemSource;
use duemail_core::types::OverdueItemRow;
use sqlx::any::AnyRow;
use sqlx::{AnyConnection, Column, Connection, Row};

pub const COL_TOPIC: &str = "TOPICS";
pub const COL_BRANCH: &str = "BRANCHES";
pub const COL_LEADER: &str = "BRANCH_LEADER_EMAIL";
pub const COL_CO_LEADER: &str = "BRANCH_COLEADER_EMAIL";
/// Due date column; older procedure versions return `DUEDATE`.
pub const COL_DUE_DATE: &[&str] = &["DUE_DATES", "DUEDATE"];

/// SQL-backed overdue item source.
pub struct SqlItemSource {
    url: String,
    query: String,
}

impl SqlItemSource {
    pub fn new(url: impl Into<String>, query: impl Into<String>) -> Self {
        sqlx::any::install_default_drivers();
        Self {
            url: url.into(),
            query: query.into(),
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(config.url.clone(), config.query.clone())
    }
}

#[async_trait]
impl ItemSource for SqlItemSource {
    fn name(&self) -> &str {
        "sql"
    }

    async fn fetch_overdue(&self) -> Result<Vec<OverdueItemRow>> {
        let mut conn = AnyConnection::connect(&self.url)
            .await
            .map_err(|e| DueMailError::Database(format!("Connect: {e}")))?;

        let fetched = sqlx::query(&self.query).fetch_all(&mut conn).await;

        if let Err(e) = conn.close().await {
            tracing::warn!("⚠️ Closing database connection: {e}");
        }

        let rows = fetched.map_err(|e| DueMailError::Database(format!("Query: {e}")))?;
        tracing::info!("🗄️ Overdue query returned {} row(s)", rows.len());

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let columns = ColumnMap::resolve(first)?;
        rows.iter().map(|row| columns.decode(row)).collect()
    }
}

/// Column positions resolved once from the first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    topic: usize,
    branch: usize,
    leader: usize,
    co_leader: usize,
    due_date: usize,
}

impl ColumnMap {
    fn resolve(row: &AnyRow) -> Result<Self> {
        let names: Vec<&str> = row.columns().iter().map(|c| c.name()).collect();
        let due_date = COL_DUE_DATE
            .iter()
            .find_map(|name| find_column(&names, name))
            .ok_or_else(|| missing(COL_DUE_DATE.join(" or ").as_str()))?;
        Ok(Self {
            topic: find_column(&names, COL_TOPIC).ok_or_else(|| missing(COL_TOPIC))?,
            branch: find_column(&names, COL_BRANCH).ok_or_else(|| missing(COL_BRANCH))?,
            leader: find_column(&names, COL_LEADER).ok_or_else(|| missing(COL_LEADER))?,
            co_leader: find_column(&names, COL_CO_LEADER)
                .ok_or_else(|| missing(COL_CO_LEADER))?,
            due_date,
        })
    }

    fn decode(&self, row: &AnyRow) -> Result<OverdueItemRow> {
        Ok(OverdueItemRow {
            topic: text(row, self.topic)?,
            branch: text(row, self.branch)?,
            leader_email: text(row, self.leader)?,
            co_leader_email: text(row, self.co_leader)?,
            due_date: text(row, self.due_date)?,
        })
    }
}

/// Exact match first, then case-insensitive (PostgreSQL lower-cases
/// unquoted identifiers).
fn find_column(names: &[&str], wanted: &str) -> Option<usize> {
    names
        .iter()
        .position(|n| *n == wanted)
        .or_else(|| names.iter().position(|n| n.eq_ignore_ascii_case(wanted)))
}

fn missing(column: &str) -> DueMailError {
    DueMailError::Database(format!("Result set has no {column} column"))
}

/// NULL decodes to the empty string.
fn text(row: &AnyRow, index: usize) -> Result<String> {
    row.try_get::<Option<String>, _>(index)
        .map(Option::unwrap_or_default)
        .map_err(|e| DueMailError::Database(format!("Decode column {index}: {e}")))
}
