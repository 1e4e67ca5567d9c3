//! Slack-style webhook-only outbound adapter.
//!
//! Slack receives no inbound polling in this core — it is a push-only
//! ingress handled elsewhere (a webhook receiver is out of scope for the
//! message-routing core). `poll` always returns [`PollOutcome::Timeout`];
//! `send` POSTs `{"text": "<escaped>"}` to a fixed webhook URL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use halyard_bus::Bus;
use halyard_channels::{Channel, ChannelError, PollOutcome};
use halyard_core::config::SlackConfig;

/// Transport name used in session keys and bus routing for this adapter.
pub const TRANSPORT: &str = "slack";

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SlackChannel {
    webhook_url: String,
    http: reqwest::Client,
}

impl SlackChannel {
    pub fn new(config: SlackConfig) -> Self {
        Self {
            webhook_url: config.webhook_url,
            http: reqwest::Client::new(),
        }
    }
}

/// Escape a payload destined for a hand-built JSON string field: `"` and
/// `\` are backslash-escaped, `\n` becomes the two-character `\n`, `\t`
/// becomes `\t`, and bare `\r` is stripped — the same escaping rule used
/// for the HTTP-long-poll adapters' outbound payloads.
fn escape_json_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

#[async_trait]
impl Channel for SlackChannel {
    fn name(&self) -> &str {
        TRANSPORT
    }

    async fn init(&self, _bus: Arc<Bus>) -> Result<(), ChannelError> {
        if self.webhook_url.is_empty() {
            return Err(ChannelError::ConfigError("slack webhook_url is empty".into()));
        }
        Ok(())
    }

    async fn start(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    /// Webhook-only outbound — there is nothing to poll for.
    async fn poll(&self) -> Result<PollOutcome, ChannelError> {
        Ok(PollOutcome::Timeout)
    }

    /// `chat_id` is unused: a single incoming-webhook URL has no
    /// per-conversation addressing.
    async fn send(&self, _chat_id: i64, text: &str) -> Result<(), ChannelError> {
        let body = format!(r#"{{"text": "{}"}}"#, escape_json_text(text));
        let resp = self
            .http
            .post(&self.webhook_url)
            .header("Content-Type", "application/json")
            .body(body)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if !resp.status().is_success() {
            warn!(status = %resp.status(), "slack webhook returned non-success status");
            return Err(ChannelError::SendFailed(format!("webhook status {}", resp.status())));
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn destroy(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_backslashes_and_newlines() {
        let input = "He said \"hi\\bye\"\nnext\tline\rend";
        let escaped = escape_json_text(input);
        assert_eq!(escaped, "He said \\\"hi\\\\bye\\\"\\nnext\\tlineend");
    }

    #[tokio::test]
    async fn poll_always_times_out() {
        let channel = SlackChannel::new(SlackConfig {
            webhook_url: "https://hooks.example.test/x".into(),
        });
        assert_eq!(channel.poll().await.unwrap(), PollOutcome::Timeout);
    }

    #[tokio::test]
    async fn init_rejects_empty_webhook_url() {
        let channel = SlackChannel::new(SlackConfig { webhook_url: String::new() });
        let bus = Arc::new(Bus::with_defaults());
        assert!(channel.init(bus).await.is_err());
    }
}
