use thiserror::Error;

use crate::exit_code::ExitCode;

/// Library-level error type. Analyzer failures (OCR, model calls, delivery)
/// are caught at the worker boundary and turned into `FailureRecord`s, they
/// never reach this type. `PipelineError` is reserved for the handful of
/// conditions that should terminate a worker process.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    #[error("repeated filesystem errors: {0}")]
    RepeatedFsError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("aborted by signal or throttle")]
    Aborted,
}

impl PipelineError {
    #[must_use]
    pub const fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::ConfigError,
            Self::Lock(_) | Self::RepeatedFsError(_) | Self::Io(_) => ExitCode::PartialCompletion,
            Self::Aborted => ExitCode::Aborted,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("missing required configuration: {0}")]
    MissingRequired(String),

    #[error("invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("configuration file not found at {path}")]
    NotFound { path: String },
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error("lock already held for item {item_id} by {owner_host}")]
    AlreadyHeld { item_id: String, owner_host: String },

    #[error("failed to reclaim stale lock for item {item_id}: {reason}")]
    ReclaimFailed { item_id: String, reason: String },

    #[error("io error manipulating lock for item {item_id}: {source}")]
    Io {
        item_id: String,
        #[source]
        source: std::io::Error,
    },
}

/// Typed analyzer-failure reasons, forming a closed vocabulary. Each one
/// maps to a `FailureRecord.reason` string via `Display`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    #[error("claim_contention")]
    ClaimContention,
    #[error("already_done")]
    AlreadyDone,
    #[error("ocr_insufficient")]
    OcrInsufficient,
    #[error("ocr_timeout")]
    OcrTimeout,
    #[error("ocr_error")]
    OcrError,
    #[error("unclassified")]
    Unclassified,
    #[error("model_timeout")]
    ModelTimeout,
    #[error("model_unparseable")]
    ModelUnparseable,
    #[error("model_disagreement_unresolved")]
    ModelDisagreementUnresolved,
    #[error("rate_limited")]
    RateLimited,
    #[error("quota_exhausted")]
    QuotaExhausted,
    #[error("delivery_conflict")]
    DeliveryConflict,
    #[error("delivery_transient")]
    DeliveryTransient,
    #[error("delivery_fatal")]
    DeliveryFatal,
    #[error("fs_error")]
    FsError,
}

impl FailureReason {
    /// Whether this reason should defer the item rather than fail it.
    #[must_use]
    pub const fn is_deferral(self) -> bool {
        matches!(self, Self::RateLimited | Self::QuotaExhausted)
    }

    /// Whether this reason is silently skipped rather than recorded as a
    /// failure (`claim_contention`/`already_done`).
    #[must_use]
    pub const fn is_silent_skip(self) -> bool {
        matches!(self, Self::ClaimContention | Self::AlreadyDone)
    }
}
