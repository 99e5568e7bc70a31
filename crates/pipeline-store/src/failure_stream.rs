use anyhow::{Context, Result};
use pipeline_types::{FailureRecord, Phase};
use pipeline_utils::atomic_write::append_line_bounded;

use crate::WorkStore;

const MAX_RECORD_BYTES: usize = 4096;

impl WorkStore {
    /// Append one FailureRecord to a phase's failure stream. Records are
    /// kept under the filesystem's atomic-append ceiling so
    /// interleaved writers from different processes cannot tear a line.
    pub fn append_failure(&self, record: &FailureRecord) -> Result<()> {
        let path = self.layout.failure_stream_path(record.phase);
        let line = serde_json::to_string(record).context("failed to serialize failure record")?;
        append_line_bounded(&path, &line, MAX_RECORD_BYTES)
            .with_context(|| format!("failed to append failure record for item {}", record.item_id))
    }

    /// Append an item deferred by a budget ceiling.
    pub fn append_deferred(&self, record: &FailureRecord) -> Result<()> {
        let path = self.layout.deferred_stream_path(record.phase);
        let line = serde_json::to_string(record).context("failed to serialize deferred record")?;
        append_line_bounded(&path, &line, MAX_RECORD_BYTES)
            .with_context(|| format!("failed to append deferred record for item {}", record.item_id))
    }

    /// Read every record in a phase's failure stream, in file order, the
    /// "arrival order" the next phase's worker consumes.
    pub fn read_failure_stream(&self, phase: Phase) -> Result<Vec<FailureRecord>> {
        let path = self.layout.failure_stream_path(phase);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(path.as_std_path())
            .with_context(|| format!("failed to read failure stream at {path}"))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("failed to parse failure record"))
            .collect()
    }

    pub fn write_marker(&self, phase: Phase) -> Result<()> {
        pipeline_utils::atomic_write::write_string_atomic(&self.layout.marker_path(phase), "")?;
        Ok(())
    }

    #[must_use]
    pub fn marker_exists(&self, phase: Phase) -> bool {
        self.layout.marker_path(phase).exists()
    }
}
