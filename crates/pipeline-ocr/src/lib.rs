//! Client for the external OCR/layout engine.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct OcrOptions {
    pub max_pages: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrResult {
    pub text: String,
    pub confidence: f64,
    pub language: String,
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("ocr request timed out after {0:?}")]
    Timeout(Duration),

    #[error("ocr engine returned an error: {0}")]
    Backend(String),

    #[error("transport error contacting ocr engine: {0}")]
    Transport(#[from] reqwest::Error),
}

/// `extract(blob, options) -> {text, confidence, language}`.
/// Contract: returns best-effort text or a typed error; never hangs past
/// its timeout, enforced here with `tokio::time::timeout`, not trusted to
/// the backend.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract(&self, blob: &[u8], options: &OcrOptions) -> Result<OcrResult, OcrError>;
}

/// HTTP client for a real OCR engine deployment.
pub struct HttpOcrEngine {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOcrEngine {
    #[must_use]
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl OcrEngine for HttpOcrEngine {
    async fn extract(&self, blob: &[u8], options: &OcrOptions) -> Result<OcrResult, OcrError> {
        let request = self
            .client
            .post(&self.endpoint)
            .query(&[("max_pages", options.max_pages.to_string())])
            .body(blob.to_vec())
            .send();

        match tokio::time::timeout(options.timeout, request).await {
            Ok(Ok(response)) if response.status().is_success() => {
                response.json::<OcrResult>().await.map_err(OcrError::Transport)
            }
            Ok(Ok(response)) => Err(OcrError::Backend(format!("status {}", response.status()))),
            Ok(Err(e)) => Err(OcrError::Transport(e)),
            Err(_) => Err(OcrError::Timeout(options.timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn extract_parses_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "Faktura c. 2024-001",
                "confidence": 0.92,
                "language": "cs",
            })))
            .mount(&server)
            .await;

        let engine = HttpOcrEngine::new(server.uri());
        let result = engine
            .extract(
                b"%PDF-fake",
                &OcrOptions {
                    max_pages: 10,
                    timeout: Duration::from_secs(5),
                },
            )
            .await
            .unwrap();

        assert_eq!(result.text, "Faktura c. 2024-001");
    }

    #[tokio::test]
    async fn extract_surfaces_backend_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let engine = HttpOcrEngine::new(server.uri());
        let result = engine
            .extract(
                b"x",
                &OcrOptions {
                    max_pages: 10,
                    timeout: Duration::from_secs(5),
                },
            )
            .await;

        assert!(matches!(result, Err(OcrError::Backend(_))));
    }
}
