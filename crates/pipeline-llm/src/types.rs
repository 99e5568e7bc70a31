use std::collections::BTreeMap;
use std::time::Duration;

use pipeline_types::DocumentKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a local-inference or external-model call returns on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVerdict {
    pub doc_kind: DocumentKind,
    pub fields: BTreeMap<String, serde_json::Value>,
    pub confidence: f64,
}

/// A single model call: model name, prompt, and the timeout that bounds it.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub prompt: String,
    pub timeout: Duration,
}

impl ModelRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            timeout,
        }
    }
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    /// Response not decodable as the expected structured form, after one
    /// retry.
    #[error("model response was unparseable: {0}")]
    Unparseable(String),

    #[error("transport error contacting model endpoint: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("rate limited by model endpoint")]
    RateLimited,
}
