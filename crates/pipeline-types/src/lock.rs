use serde::{Deserialize, Serialize};

/// A claim on a single item in a single phase. Persisted as the body of an
/// exclusively-created lock file; the file's mtime, not any field here, is
/// the authority for staleness (see `pipeline-lock`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub item_id: String,
    pub owner_host: String,
    /// RFC 3339 timestamp; advisory only, mtime governs staleness.
    pub acquired_at: String,
}

impl Lock {
    #[must_use]
    pub fn new(item_id: impl Into<String>, owner_host: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            owner_host: owner_host.into(),
            acquired_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
