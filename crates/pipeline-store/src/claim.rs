use std::time::Duration;

use pipeline_lock::{ClaimedLock, LockError};
use pipeline_types::Phase;

use crate::WorkStore;

/// Outcome of attempting to claim an item in a phase.
pub enum ClaimOutcome {
    /// The worker now holds the lock and must write an Artifact or
    /// FailureRecord before it goes out of scope.
    Acquired(ClaimedLock),
    /// An Artifact already exists for this item in phases `1..=phase`;
    /// silently skipped, not a failure (`already_done`).
    AlreadyDone,
    /// Another worker holds a fresh lock; silently skipped (`claim_contention`).
    Contended,
}

impl WorkStore {
    /// Implements the three-step claim protocol:
    /// 1. Skip if an Artifact already exists in phases `1..=phase`.
    /// 2. Exclusive-create the lock; reclaim if stale.
    /// 3. Return the held lock for the caller to release on completion.
    pub fn claim(&self, phase: Phase, item_id: &str, ttl: Duration) -> ClaimOutcome {
        if self.has_artifact_through(phase, item_id) {
            return ClaimOutcome::AlreadyDone;
        }

        let lock_path = self.layout.lock_path(phase, item_id);
        match ClaimedLock::acquire(lock_path.as_std_path(), item_id, &self.owner_host, ttl) {
            Ok(lock) => ClaimOutcome::Acquired(lock),
            Err(LockError::AlreadyHeld { .. }) => ClaimOutcome::Contended,
            Err(e) => {
                tracing::warn!(item_id, phase = ?phase, error = %e, "lock acquisition error treated as contention");
                ClaimOutcome::Contended
            }
        }
    }

    /// True iff an Artifact for `item_id` exists in any phase `1..=phase`
    /// (invariant: "at most one Artifact across all phases").
    #[must_use]
    pub fn has_artifact_through(&self, phase: Phase, item_id: &str) -> bool {
        for p in [Phase::Phase1, Phase::Phase2, Phase::Phase3, Phase::Phase4, Phase::Phase5] {
            if p > phase {
                break;
            }
            if self.layout.artifact_path(p, item_id).exists() {
                return true;
            }
        }
        false
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
    fn claim_succeeds_on_fresh_item() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let outcome = store.claim(Phase::Phase1, "item-1", Duration::from_secs(600));
        assert!(matches!(outcome, ClaimOutcome::Acquired(_)));
    }

    #[test]
    fn claim_skips_when_already_done() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let artifact = crate::tests_support::sample_artifact("item-1", Phase::Phase1);
        store.write_artifact(&artifact).unwrap();

        let outcome = store.claim(Phase::Phase2, "item-1", Duration::from_secs(600));
        assert!(matches!(outcome, ClaimOutcome::AlreadyDone));
    }

    #[test]
    fn claim_contends_while_another_worker_holds_lock() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let first = store.claim(Phase::Phase1, "item-1", Duration::from_secs(600));
        assert!(matches!(first, ClaimOutcome::Acquired(_)));

        let second = store.claim(Phase::Phase1, "item-1", Duration::from_secs(600));
        assert!(matches!(second, ClaimOutcome::Contended));
    }
}
