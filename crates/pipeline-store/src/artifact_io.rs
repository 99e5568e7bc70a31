use anyhow::{Context, Result};
use pipeline_types::{Artifact, Phase};
use pipeline_utils::atomic_write::write_file_atomic;

use crate::WorkStore;

impl WorkStore {
    /// Write an Artifact using JCS canonical JSON (RFC 8785) so the same
    /// logical artifact always serializes to the same bytes, and atomically
    /// (temp file + fsync + rename) so a concurrent reader never observes a
    /// partial file.
    ///
    /// An Artifact is written exactly once per item across all phases;
    /// callers are expected to have already won a claim.
    pub fn write_artifact(&self, artifact: &Artifact) -> Result<()> {
        let path = self.layout.artifact_path(artifact.phase, &artifact.item_id);
        let value = serde_json::to_value(artifact).context("failed to build artifact json")?;
        let canonical =
            serde_json_canonicalizer::to_string(&value).context("failed to canonicalize artifact json")?;
        write_file_atomic(&path, canonical.as_bytes())
            .with_context(|| format!("failed to write artifact for item {}", artifact.item_id))?;
        Ok(())
    }

    pub fn read_artifact(&self, phase: Phase, item_id: &str) -> Result<Option<Artifact>> {
        let path = self.layout.artifact_path(phase, item_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path.as_std_path())
            .with_context(|| format!("failed to read artifact at {path}"))?;
        let artifact: Artifact =
            serde_json::from_str(&content).with_context(|| format!("failed to parse artifact at {path}"))?;
        Ok(Some(artifact))
    }

    /// All Artifacts written by a single phase, in directory iteration
    /// order (no ordering guarantee across instances).
    pub fn list_artifacts(&self, phase: Phase) -> Result<Vec<Artifact>> {
        let dir = self.layout.results_dir(phase);

        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for entry in std::fs::read_dir(dir.as_std_path())? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(entry.path())?;
            artifacts.push(serde_json::from_str(&content)?);
        }
        Ok(artifacts)
    }

    /// Union of successful Artifacts across phases 1-4, the input to Phase 5
    /// delivery.
    pub fn all_delivered_artifacts(&self) -> Result<Vec<Artifact>> {
        let mut all = Vec::new();
        for phase in [Phase::Phase1, Phase::Phase2, Phase::Phase3, Phase::Phase4] {
            all.extend(self.list_artifacts(phase)?);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> WorkStore {
        WorkStore::new(Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(), "host-a".to_string())
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let artifact = crate::tests_support::sample_artifact("item-1", Phase::Phase1);
        store.write_artifact(&artifact).unwrap();

        let read_back = store.read_artifact(Phase::Phase1, "item-1").unwrap().unwrap();
        assert_eq!(read_back.item_id, "item-1");
    }

    #[test]
    fn canonical_json_is_deterministic_across_writes() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let artifact = crate::tests_support::sample_artifact("item-1", Phase::Phase1);

        store.write_artifact(&artifact).unwrap();
        let path = store.layout.artifact_path(Phase::Phase1, "item-1");
        let first = std::fs::read_to_string(path.as_std_path()).unwrap();

        store.write_artifact(&artifact).unwrap();
        let second = std::fs::read_to_string(path.as_std_path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn missing_artifact_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.read_artifact(Phase::Phase1, "missing").unwrap().is_none());
    }
}
