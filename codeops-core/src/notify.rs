//! Side-channel notifications
//!
//! Notifications are best-effort: callers log and drop any error from
//! [`Notifier::push`] and never retry.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use crate::pipeline::Verdict;
use crate::prompts::preview;
use crate::{Error, Result};

/// Fire-and-forget text push
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Get the name of this notifier
    fn name(&self) -> &'static str;

    /// Deliver one message, at most once
    async fn push(&self, text: &str) -> Result<()>;
}

/// Notifier posting to a Slack incoming webhook
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    /// Create a notifier for the given webhook URL
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let webhook_url = webhook_url.into();
        url::Url::parse(&webhook_url)
            .map_err(|e| Error::Config(format!("Invalid Slack webhook URL: {}", e)))?;

        Ok(Self {
            client: reqwest::Client::new(),
            webhook_url,
        })
    }

    fn payload(text: &str) -> serde_json::Value {
        json!({
            "text": format!("{}\n_Time: {}_", text, Utc::now().format("%Y-%m-%dT%H:%M:%SZ")),
        })
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn push(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&Self::payload(text))
            .send()
            .await
            .map_err(|e| Error::NotificationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::NotificationFailed(format!(
                "Slack returned HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        debug!(chars = text.len(), "Slack message sent");
        Ok(())
    }
}

/// Notifier that writes messages to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn push(&self, text: &str) -> Result<()> {
        info!(message = text, "Notification");
        Ok(())
    }
}

/// Message announcing a new plan
pub fn plan_message(plan: &str, max_chars: usize) -> String {
    format!(":brain: 🤖 *CodeOps Agent Plan*\n\n{}", preview(plan, max_chars))
}

/// Message carrying the reflection on a plan
pub fn reflection_message(reflection: &str, max_chars: usize) -> String {
    format!(":mag: 🔍 *Plan Reflection*\n\n{}", preview(reflection, max_chars))
}

/// Message wrapping the critic summary
pub fn critique_message(summary: &str) -> String {
    format!(":mag_right: {}", summary)
}

/// Final summary of a run
pub fn run_summary_message(
    verdict: Verdict,
    repo: &str,
    run_id: Option<u32>,
    pr_url: Option<&str>,
) -> String {
    let marker = if verdict.is_success() {
        ":green_heart:"
    } else {
        ":x:"
    };
    let mut message = format!(
        ":gear: {} *CodeOps Agent Run Summary*\n• Repository: {}\n• Verdict: {}",
        marker, repo, verdict
    );

    if let Some(id) = run_id {
        message.push_str(&format!("\n• Run ID: {}", id));
    }

    if let Some(url) = pr_url {
        message.push_str(&format!("\n• Pull Request: <{}|View on GitHub>", url));
    }

    message
}

/// Message reporting a failed run
pub fn error_message(error: &str, context: Option<&str>) -> String {
    let mut message = format!(":rotating_light: :warning: *CodeOps Agent Error*\n• Error: {}", error);
    if let Some(context) = context {
        message.push_str(&format!("\n• Context: {}", context));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_message_truncates() {
        let plan = "x".repeat(1000);
        let message = plan_message(&plan, 400);
        assert!(message.starts_with(":brain:"));
        assert!(message.ends_with("..."));
        assert!(message.len() < 450);
    }

    #[test]
    fn test_run_summary() {
        let message = run_summary_message(
            Verdict::Success,
            "acme/widgets",
            Some(42),
            Some("https://github.com/acme/widgets/pull/7"),
        );
        assert!(message.contains(":green_heart:"));
        assert!(message.contains("• Repository: acme/widgets"));
        assert!(message.contains("• Verdict: success"));
        assert!(message.contains("• Run ID: 42"));
        assert!(message.contains("<https://github.com/acme/widgets/pull/7|View on GitHub>"));

        let failed = run_summary_message(Verdict::Failure, "acme/widgets", None, None);
        assert!(failed.contains(":x:"));
        assert!(!failed.contains("Run ID"));
    }

    #[test]
    fn test_error_message() {
        let message = error_message("Stage 'planning' failed", Some("Commit: abc"));
        assert!(message.contains("• Error: Stage 'planning' failed"));
        assert!(message.contains("• Context: Commit: abc"));
    }

    #[test]
    fn test_slack_payload_has_timestamp() {
        let payload = SlackNotifier::payload("hello");
        let text = payload["text"].as_str().unwrap();
        assert!(text.starts_with("hello\n_Time: "));
        assert!(text.ends_with("Z_"));
    }

    #[test]
    fn test_slack_rejects_bad_url() {
        assert!(matches!(
            SlackNotifier::new("not a url"),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_log_notifier_accepts_everything() {
        assert!(LogNotifier.push("anything").await.is_ok());
    }
}
