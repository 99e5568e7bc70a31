use async_trait::async_trait;

use crate::types::{ModelError, ModelRequest, ModelVerdict};

/// HTTP POST with prompt + model name; returns a structured verdict
/// (`doc_kind`, `fields`, `confidence`) or an error. Implementations back
/// both the Phase 2 local-inference tiers and the Phase 3 external model.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn classify(&self, request: &ModelRequest) -> Result<ModelVerdict, ModelError>;
}

/// HTTP client for a local-inference deployment (small/medium/large tiers all
/// speak the same wire contract; only the model name and timeout differ).
///
/// Retries once on an unparseable response before surfacing
/// [`ModelError::Unparseable`].
pub struct HttpLocalInferenceBackend {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLocalInferenceBackend {
    #[must_use]
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    async fn call_once(&self, request: &ModelRequest) -> Result<ModelVerdict, ModelError> {
        let body = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
        });

        let send = self.client.post(&self.endpoint).json(&body).send();
        let response = match tokio::time::timeout(request.timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ModelError::Transport(e)),
            Err(_) => return Err(ModelError::Timeout(request.timeout)),
        };

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(ModelError::Unparseable(format!("status {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(ModelError::Transport)?;
        serde_json::from_slice::<ModelVerdict>(&bytes)
            .map_err(|e| ModelError::Unparseable(e.to_string()))
    }
}

#[async_trait]
impl ModelBackend for HttpLocalInferenceBackend {
    async fn classify(&self, request: &ModelRequest) -> Result<ModelVerdict, ModelError> {
        match self.call_once(request).await {
            Err(ModelError::Unparseable(_)) => self.call_once(request).await,
            other => other,
        }
    }
}

/// Dispatches a call to one of three underlying backends by matching the
/// request's model name against the small/medium/large names configured for
/// this process. `LocalInferenceConfig` gives each tier its own endpoint, but
/// `run_escalation` takes a single `&dyn ModelBackend` for all three calls;
/// this is the seam that reconciles the two without changing either.
pub struct TieredLocalBackend {
    small: (String, HttpLocalInferenceBackend),
    medium: (String, HttpLocalInferenceBackend),
    large: (String, HttpLocalInferenceBackend),
}

impl TieredLocalBackend {
    #[must_use]
    pub fn new(
        small_model: String,
        small_endpoint: String,
        medium_model: String,
        medium_endpoint: String,
        large_model: String,
        large_endpoint: String,
    ) -> Self {
        Self {
            small: (small_model, HttpLocalInferenceBackend::new(small_endpoint)),
            medium: (medium_model, HttpLocalInferenceBackend::new(medium_endpoint)),
            large: (large_model, HttpLocalInferenceBackend::new(large_endpoint)),
        }
    }
}

#[async_trait]
impl ModelBackend for TieredLocalBackend {
    async fn classify(&self, request: &ModelRequest) -> Result<ModelVerdict, ModelError> {
        let (_, backend) = [&self.small, &self.medium, &self.large]
            .into_iter()
            .find(|(model, _)| model == &request.model)
            .unwrap_or(&self.large);
        backend.classify(request).await
    }
}

/// HTTP client for the external large-model endpoint: same wire
/// contract as the local-inference tiers, plus bearer-token authentication.
/// Does not retry on an unparseable response itself; `external::RetryPolicy`
/// layers retry on top at the call site instead of inside the backend.
pub struct HttpExternalModelBackend {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
}

impl HttpExternalModelBackend {
    #[must_use]
    pub fn new(endpoint: String, api_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_token,
        }
    }
}

#[async_trait]
impl ModelBackend for HttpExternalModelBackend {
    async fn classify(&self, request: &ModelRequest) -> Result<ModelVerdict, ModelError> {
        let body = serde_json::json!({
            "model": request.model,
            "prompt": request.prompt,
        });

        let send = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send();

        let response = match tokio::time::timeout(request.timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ModelError::Transport(e)),
            Err(_) => return Err(ModelError::Timeout(request.timeout)),
        };

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ModelError::RateLimited);
        }
        if !response.status().is_success() {
            return Err(ModelError::Unparseable(format!("status {}", response.status())));
        }

        let bytes = response.bytes().await.map_err(ModelError::Transport)?;
        serde_json::from_slice::<ModelVerdict>(&bytes).map_err(|e| ModelError::Unparseable(e.to_string()))
    }
}
