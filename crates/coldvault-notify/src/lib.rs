//! Chat-ops webhook notifier.
//!
//! Delivers failure digests to an incoming-webhook endpoint as a JSON
//! `{"text": ...}` payload. Best-effort from the pipeline's point of view:
//! the caller decides whether a delivery failure aborts the run.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use coldvault_lifecycle::{Notifier, NotifyError};

/// Notifier posting to a chat-ops incoming webhook.
pub struct WebhookNotifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl WebhookNotifier {
    /// Create a notifier for the given webhook URL.
    pub fn new(webhook_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            webhook_url: webhook_url.into(),
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn post_message(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .http
            .post(&self.webhook_url)
            .json(&WebhookPayload { text })
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| NotifyError::Transport(e.to_string()))?;
            return Err(NotifyError::Endpoint {
                status: status.as_u16(),
                body,
            });
        }

        debug!(bytes = text.len(), "delivered notification");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_text_payload() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/hooks/backup-alerts"))
            .and(body_json(serde_json::json!({
                "text": "Image export failures:\n1. export task ami-1 failed"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(format!("{}/hooks/backup-alerts", mock_server.uri()));
        notifier
            .post_message("Image export failures:\n1. export task ami-1 failed")
            .await
            .expect("delivery succeeds");
    }

    #[tokio::test]
    async fn surfaces_endpoint_rejection() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("channel_not_found"))
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(mock_server.uri());
        let err = notifier
            .post_message("anything")
            .await
            .expect_err("delivery must fail");

        match err {
            NotifyError::Endpoint { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "channel_not_found");
            }
            other => panic!("expected endpoint error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn surfaces_transport_failure() {
        // Nothing listens on this port.
        let notifier = WebhookNotifier::new("http://127.0.0.1:9/hooks/backup-alerts");
        let err = notifier
            .post_message("anything")
            .await
            .expect_err("delivery must fail");
        assert!(matches!(err, NotifyError::Transport(_)));
    }
}
