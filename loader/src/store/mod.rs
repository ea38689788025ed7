//! Persistence seam for the raw voters table.
//!
//! The controller is handed an explicitly constructed store instead of
//! reaching for a process-global database handle; the Postgres
//! implementation owns a connection pool opened at process start.

pub mod memory;
pub mod pg;

use async_trait::async_trait;
use common::Result;
use common::models::VoterStats;

pub use memory::MemoryVoterStore;
pub use pg::PgVoterStore;

#[async_trait]
pub trait VoterStore: Send + Sync {
    /// Current row count of the target table.
    async fn count_rows(&self) -> Result<u64>;

    /// Delete all rows as a single operation. Called once, up front,
    /// when the table is non-empty.
    async fn truncate(&self) -> Result<()>;

    /// Append one batch. Rows must land in the order given.
    async fn insert_batch(&self, columns: &[String], rows: &[Vec<Option<String>>])
    -> Result<u64>;

    /// Registration statistics for the completion notifier.
    async fn stats(&self) -> Result<VoterStats>;
}
