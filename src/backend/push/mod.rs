//! Push Notification Dispatch
//!
//! Fire-and-forget push delivery for recipients with no live
//! connection. Dispatch is decoupled from the send path through an
//! unbounded channel and a detached worker task, so a slow or failing
//! push provider can never delay a message acknowledgment. Failures
//! are logged and swallowed; they must not surface to the event that
//! triggered them.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One notification to deliver to one device token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushNotification {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: Value,
}

/// A push provider backend
#[async_trait]
pub trait PushSink: Send + Sync {
    /// Deliver one notification. Errors are reported for logging only.
    async fn send(&self, notification: &PushNotification) -> Result<(), String>;
}

/// HTTP gateway backend: POSTs notifications as JSON to a configured
/// provider endpoint (Expo-style push gateway).
pub struct HttpPush {
    client: reqwest::Client,
    gateway_url: String,
}

impl HttpPush {
    pub fn new(gateway_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            gateway_url,
        }
    }
}

#[async_trait]
impl PushSink for HttpPush {
    async fn send(&self, notification: &PushNotification) -> Result<(), String> {
        let payload = serde_json::json!({
            "to": notification.token,
            "title": notification.title,
            "body": notification.body,
            "data": notification.data,
        });

        let response = self
            .client
            .post(&self.gateway_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("push gateway request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("push gateway returned {}", response.status()));
        }
        Ok(())
    }
}

/// Logging backend used when no gateway is configured
pub struct LogPush;

#[async_trait]
impl PushSink for LogPush {
    async fn send(&self, notification: &PushNotification) -> Result<(), String> {
        tracing::info!(
            token = %notification.token,
            title = %notification.title,
            "push gateway not configured, dropping notification"
        );
        Ok(())
    }
}

/// Recording backend for tests: captures every notification
#[derive(Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<PushNotification>>,
}

impl RecordingPush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<PushNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSink for RecordingPush {
    async fn send(&self, notification: &PushNotification) -> Result<(), String> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Handle used by the send path to queue notifications.
///
/// `dispatch` only pushes onto a channel; the worker task owns all
/// provider I/O.
#[derive(Clone)]
pub struct PushDispatcher {
    tx: mpsc::UnboundedSender<PushNotification>,
}

impl PushDispatcher {
    /// Spawn the worker task draining the queue into the sink
    pub fn spawn(sink: Arc<dyn PushSink>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PushNotification>();

        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if let Err(e) = sink.send(&notification).await {
                    tracing::warn!("push delivery failed: {}", e);
                }
            }
            tracing::debug!("push dispatch worker stopped");
        });

        Self { tx }
    }

    /// Queue a notification; never blocks, never fails the caller
    pub fn dispatch(&self, notification: PushNotification) {
        if self.tx.send(notification).is_err() {
            tracing::warn!("push dispatch worker is gone, dropping notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_dispatch_reaches_sink() {
        let sink = Arc::new(RecordingPush::new());
        let dispatcher = PushDispatcher::spawn(sink.clone());

        dispatcher.dispatch(PushNotification {
            token: "tok-1".to_string(),
            title: "alice".to_string(),
            body: "hello".to_string(),
            data: json!({"conversation_id": "x"}),
        });

        // Worker runs on its own task; give it a moment
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token, "tok-1");
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_propagate() {
        struct FailingSink;

        #[async_trait]
        impl PushSink for FailingSink {
            async fn send(&self, _n: &PushNotification) -> Result<(), String> {
                Err("provider down".to_string())
            }
        }

        let dispatcher = PushDispatcher::spawn(Arc::new(FailingSink));
        // Must not panic or surface anywhere
        dispatcher.dispatch(PushNotification {
            token: "tok".to_string(),
            title: "t".to_string(),
            body: "b".to_string(),
            data: json!({}),
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}
