use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::event::NotifyEvent;
use crate::sink::NotificationSink;

/// Webhook delivery sink: POSTs the event payload as JSON.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    /// Build the sink with a 10 second delivery timeout.
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Configuration(e.to_string()))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn deliver(&self, event: &NotifyEvent) -> Result<(), NotifyError> {
        debug!(kind = event.kind(), url = %self.url, "sending webhook notification");

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&event.webhook_payload())
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = %status, "webhook returned non-success status");
            return Err(NotifyError::Delivery(format!(
                "webhook returned status {status}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    struct MockHookServer {
        listener: tokio::net::TcpListener,
        url: String,
    }

    impl MockHookServer {
        async fn start() -> Self {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let port = listener.local_addr().unwrap().port();
            Self {
                listener,
                url: format!("http://127.0.0.1:{port}/hook"),
            }
        }

        async fn respond_once(self, status_code: u16) -> Vec<u8> {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};

            let (mut stream, _) = self.listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16384];
            let n = stream.read(&mut buf).await.unwrap();
            buf.truncate(n);

            let response = format!(
                "HTTP/1.1 {status_code} OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{{}}"
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            buf
        }
    }

    fn event() -> NotifyEvent {
        NotifyEvent::MaintenanceTriggered {
            level: "soft".into(),
            reason: "no keys configured".into(),
            feature: Some("mcq".into()),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_json_payload() {
        let server = MockHookServer::start().await;
        let sink = WebhookSink::new(server.url.clone()).unwrap();

        let server_handle = tokio::spawn(async move { server.respond_once(200).await });
        sink.deliver(&event()).await.unwrap();

        let request = server_handle.await.unwrap();
        let request_str = String::from_utf8_lossy(&request);
        assert!(request_str.contains("maintenance_triggered"));
        assert!(request_str.contains("no keys configured"));
    }

    #[tokio::test]
    async fn non_success_status_is_delivery_error() {
        let server = MockHookServer::start().await;
        let sink = WebhookSink::new(server.url.clone()).unwrap();

        let server_handle = tokio::spawn(async move { server.respond_once(500).await });
        let err = sink.deliver(&event()).await.unwrap_err();
        server_handle.await.unwrap();

        assert!(matches!(err, NotifyError::Delivery(_)));
    }
}
