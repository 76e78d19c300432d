use crate::config::Settings;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum OcrError {
    #[error("OCR submission rejected ({status}): {body}")]
    Submission { status: StatusCode, body: String },
    #[error("OCR service unreachable on submission: {0}")]
    SubmissionUnreachable(reqwest::Error),
    #[error("No Operation-Location in OCR response")]
    MissingOperationLocation,
    #[error("OCR analysis failed: {0}")]
    AnalysisFailed(String),
    #[error("OCR polling timed out after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("OCR network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid OCR response: {0}")]
    InvalidResponse(String),
}

/// Anything that can turn image bytes into a completed analyze operation document.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync {
    async fn analyze(&self, image: Bytes) -> Result<Value, OcrError>;
}

/// Azure Document Intelligence (Form Recognizer) client: submit, then poll the operation.
#[derive(Debug, Clone)]
pub struct AzureOcr {
    client: Client,
    endpoint: String,
    key: String,
    model_id: String,
    api_version: String,
    poll_interval: Duration,
    max_attempts: u32,
}

impl AzureOcr {
    pub fn new(settings: &Settings) -> Result<Self, OcrError> {
        let client = Client::builder().timeout(Duration::from_secs(40)).build()?;
        Ok(AzureOcr {
            client,
            endpoint: settings.azure_endpoint.trim_end_matches('/').to_string(),
            key: settings.azure_key.clone(),
            model_id: settings.azure_model_id.clone(),
            api_version: settings.azure_api_version.clone(),
            poll_interval: settings.ocr_poll_interval,
            max_attempts: settings.ocr_poll_attempts,
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/formrecognizer/documentModels/{}:analyze?api-version={}",
            self.endpoint, self.model_id, self.api_version
        )
    }

    /// Submits the image and returns the operation URL to poll.
    pub async fn submit(&self, image: Bytes) -> Result<String, OcrError> {
        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/octet-stream")
            .body(image)
            .send()
            .await
            .map_err(OcrError::SubmissionUnreachable)?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::Submission {
                status,
                body: if body.is_empty() {
                    "Invalid key or endpoint?".to_string()
                } else {
                    body
                },
            });
        }

        response
            .headers()
            .get("Operation-Location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(OcrError::MissingOperationLocation)
    }

    /// Polls until the operation succeeds, fails, or the attempt ceiling is reached.
    pub async fn poll(&self, operation_url: &str) -> Result<Value, OcrError> {
        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.poll_interval).await;
            let poll_json: Value = self
                .client
                .get(operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .send()
                .await?
                .json()
                .await
                .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;
            let status_str = poll_json
                .get("status")
                .and_then(|s| s.as_str())
                .unwrap_or("");
            debug!(attempt, status = status_str, "polled OCR operation");
            match status_str {
                "succeeded" => {
                    info!(attempts = attempt, "OCR analysis succeeded");
                    return Ok(poll_json);
                }
                "failed" => {
                    let err = poll_json
                        .get("error")
                        .and_then(|e| e.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("Unknown error");
                    return Err(OcrError::AnalysisFailed(err.to_string()));
                }
                _ => {}
            }
        }
        warn!(attempts = self.max_attempts, "OCR polling exhausted");
        Err(OcrError::Timeout {
            attempts: self.max_attempts,
        })
    }
}

#[async_trait]
impl DocumentAnalyzer for AzureOcr {
    async fn analyze(&self, image: Bytes) -> Result<Value, OcrError> {
        let operation_url = self.submit(image).await?;
        self.poll(&operation_url).await
    }
}
