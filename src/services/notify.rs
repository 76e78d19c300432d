//! Best-effort delivery of processed reports to the automation webhook (n8n).

use crate::types::NotificationPayload;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("webhook returned {0}")]
    Status(StatusCode),
    #[error("webhook unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError>;
}

pub struct WebhookNotifier {
    client: Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: String) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(WebhookNotifier {
            client,
            url: Some(url),
        })
    }

    /// Notifier used when no webhook URL is configured.
    pub fn disabled() -> Self {
        WebhookNotifier {
            client: Client::new(),
            url: None,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &NotificationPayload) -> Result<(), NotifyError> {
        let Some(url) = &self.url else {
            debug!(report_id = %payload.report_id, "no webhook configured, skipping");
            return Ok(());
        };
        let status = self.client.post(url).json(payload).send().await?.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status));
        }
        info!(report_id = %payload.report_id, "webhook notified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::StatusCode as AxumStatus, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};

    fn payload() -> NotificationPayload {
        NotificationPayload {
            report_id: "r-1".to_string(),
            user_id: "u-1".to_string(),
            phone_number: "+15550100".to_string(),
            key_value_data: [("hb".to_string(), "12.1".to_string())].into_iter().collect(),
            report_date: Some("5 Jan 2024".to_string()),
            image_url: "https://bucket/reports/r-1.png".to_string(),
        }
    }

    async fn spawn_hook(reply: AxumStatus) -> (String, Arc<Mutex<Vec<NotificationPayload>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/hook",
                post(
                    move |State(seen): State<Arc<Mutex<Vec<NotificationPayload>>>>,
                          Json(body): Json<NotificationPayload>| async move {
                        seen.lock().unwrap().push(body);
                        reply
                    },
                ),
            )
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/hook", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (url, received)
    }

    #[tokio::test]
    async fn posts_payload_as_json() {
        let (url, received) = spawn_hook(AxumStatus::OK).await;
        WebhookNotifier::new(url).unwrap().notify(&payload()).await.unwrap();
        assert_eq!(received.lock().unwrap().as_slice(), &[payload()]);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (url, _) = spawn_hook(AxumStatus::INTERNAL_SERVER_ERROR).await;
        let err = WebhookNotifier::new(url)
            .unwrap()
            .notify(&payload())
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Status(s) if s == StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn disabled_notifier_skips_delivery() {
        assert!(WebhookNotifier::disabled().notify(&payload()).await.is_ok());
    }
}
