use thiserror::Error;

/// Delivery errors, split into a `delivery_conflict`/`delivery_transient`/
/// `delivery_fatal` vocabulary: only `Fatal` ever surfaces as a
/// `FailureRecord`; `Transient` is retried by the caller and `Conflict`
/// (409) is treated as success.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("delivery target reported a conflict (treated as success): {0}")]
    Conflict(String),

    #[error("transient delivery error (retryable): {0}")]
    Transient(String),

    #[error("terminal delivery error: {0}")]
    Fatal(String),

    #[error("transport error contacting delivery service: {0}")]
    Transport(#[from] reqwest::Error),
}

impl DeliveryError {
    /// Classifies an HTTP status: retry on transient 5xx, fail on terminal
    /// 4xx except 409 on upload (duplicate).
    #[must_use]
    pub fn from_status(status: reqwest::StatusCode, body: String, treat_409_as_conflict: bool) -> Self {
        if status == reqwest::StatusCode::CONFLICT && treat_409_as_conflict {
            Self::Conflict(body)
        } else if status.is_server_error() {
            Self::Transient(format!("{status}: {body}"))
        } else {
            Self::Fatal(format!("{status}: {body}"))
        }
    }

    #[must_use]
    pub const fn failure_reason(&self) -> pipeline_utils::FailureReason {
        match self {
            Self::Conflict(_) => pipeline_utils::FailureReason::DeliveryConflict,
            Self::Transient(_) | Self::Transport(_) => pipeline_utils::FailureReason::DeliveryTransient,
            Self::Fatal(_) => pipeline_utils::FailureReason::DeliveryFatal,
        }
    }
}
