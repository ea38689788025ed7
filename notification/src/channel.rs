use async_trait::async_trait;
use common::Result;
use tracing::info;

/// Outbound delivery seam. Email delivery lives with the external
/// reporting stack; the loader only needs something that can carry a
/// subject and a body.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, subject: &str, body: &str) -> Result<()>;
}

/// Channel that writes the summary to the structured log. Used when no
/// external delivery is configured.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    async fn send(&self, subject: &str, body: &str) -> Result<()> {
        info!(subject = subject, "{}", body);
        Ok(())
    }
}
