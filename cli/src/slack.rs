use async_trait::async_trait;

use monitor::alert::AlertSink;

/// Posts alerts to a Slack incoming webhook. Delivery is one POST per alert;
/// the monitoring core treats it as fire-and-forget.
pub struct SlackWebhookSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackWebhookSink {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }
}

#[async_trait]
impl AlertSink for SlackWebhookSink {
    async fn post(&self, target: &str, text: &str) -> anyhow::Result<()> {
        let payload = serde_json::json!({
            "channel": target,
            "text": text,
            "username": "CoinJumps",
            "mrkdwn": false,
        });

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            anyhow::bail!("slack webhook returned {}", resp.status());
        }
        Ok(())
    }
}
