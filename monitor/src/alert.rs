use async_trait::async_trait;

/// Outbound alert delivery. Fire-and-forget from the monitoring core's
/// perspective; implementations own any transport detail beyond one post.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn post(&self, target: &str, text: &str) -> anyhow::Result<()>;
}

/// Target channel for one user's alerts. Slack channel names cap out at 22
/// characters, so long user names are truncated.
pub fn alert_channel(user: &str) -> String {
    let channel = format!("#alerts-{user}");
    channel.chars().take(22).collect()
}

/// Sink that writes alerts to the log instead of delivering them anywhere.
/// Used when no webhook is configured.
pub struct LogSink;

#[async_trait]
impl AlertSink for LogSink {
    async fn post(&self, target: &str, text: &str) -> anyhow::Result<()> {
        tracing::info!(channel = target, message = text, "alert (log only)");
        Ok(())
    }
}
