use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{DocumentKind, Phase};

/// One output per item per phase. Written exactly once by exactly one phase;
/// later phases must skip an item that already has one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub item_id: String,
    pub phase: Phase,
    pub doc_kind: DocumentKind,
    /// The 31 named fields, keyed by the contract names in `FIELD_NAMES`.
    /// A `BTreeMap` keeps JCS canonicalization and test fixtures stable.
    pub fields: BTreeMap<String, serde_json::Value>,
    /// SHA-256 of the concatenated raw text, hex-encoded.
    pub raw_text_sha256: String,
    /// MD5 of the primary document's bytes; the delivery dedup key.
    pub content_md5: String,
    pub confidence: f64,
    /// Present only when Phase 2 had to traverse more than one model.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub escalation_trace: Option<Vec<EscalationVerdict>>,
}

/// One model's contribution to an [`Artifact::escalation_trace`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationVerdict {
    pub model_tier: ModelTier,
    pub doc_kind: Option<DocumentKind>,
    pub confidence: f64,
    pub timed_out: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Small,
    Medium,
    Large,
}

/// Appended to an append-only failure stream that becomes the next phase's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    pub item_id: String,
    pub phase: Phase,
    pub reason: String,
    /// Bounded to keep each line well under the 4 KiB atomic-append ceiling.
    pub last_text_snippet: String,
}

impl FailureRecord {
    const MAX_SNIPPET_LEN: usize = 512;

    #[must_use]
    pub fn new(item_id: impl Into<String>, phase: Phase, reason: impl Into<String>, snippet: &str) -> Self {
        let truncated: String = snippet.chars().take(Self::MAX_SNIPPET_LEN).collect();
        Self {
            item_id: item_id.into(),
            phase,
            reason: reason.into(),
            last_text_snippet: truncated,
        }
    }
}
