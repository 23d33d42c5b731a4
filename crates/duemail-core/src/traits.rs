//! Seams between the pipeline and the outside world.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{OverdueItemRow, RenderedMessage};

/// Where overdue rows come from.
#[async_trait]
pub trait ItemSource: Send + Sync {
    fn name(&self) -> &str;

    /// Run the overdue query once and return every row, in query order.
    async fn fetch_overdue(&self) -> Result<Vec<OverdueItemRow>>;
}

/// Outbound mail transport. One instance is reused for every branch
/// group of an invocation.
#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &RenderedMessage) -> Result<()>;
}
