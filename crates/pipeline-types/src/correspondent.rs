use serde::{Deserialize, Serialize};

/// Canonical sender entity. Two raw senders collide iff their normalized
/// keys match; see `pipeline-correspondent` for the normalization rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correspondent {
    pub id: u64,
    pub normalized_key: String,
    pub display_name: String,
    pub document_count: u64,
}

impl Correspondent {
    #[must_use]
    pub fn new(id: u64, normalized_key: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id,
            normalized_key: normalized_key.into(),
            display_name: display_name.into(),
            document_count: 0,
        }
    }
}
