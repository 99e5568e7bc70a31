//! Phase 4: the manual classification queue. There is no automated
//! per-item logic here; a human decides, so this does not implement
//! [`crate::worker::ItemProcessor`]; instead it
//! exposes claim/submit primitives for the future terminal UI to drive,
//! writing results identical in shape to the earlier phases.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pipeline_lock::ClaimedLock;
use pipeline_store::{primary_document_of, WorkStore};
use pipeline_types::{Artifact, DocumentKind, Phase, WorkItem};
use pipeline_utils::hash::{content_md5_hex, sha256_hex};
use serde_json::Value;

use crate::model_fields::full_field_set;
use crate::xml::emit_xml_sidecar;

/// One item claimed for manual review: the held lock plus the work item to
/// show the reviewer. Dropping this without calling [`ManualReviewQueue::submit`]
/// releases the lock, returning the item to the pending pool.
pub struct ReviewClaim {
    lock: ClaimedLock,
    pub item: WorkItem,
}

/// What a human reviewer decided for a claimed item.
pub enum ReviewDecision {
    Classified {
        doc_kind: DocumentKind,
        fields: BTreeMap<String, Value>,
        confidence: f64,
    },
    /// The reviewer could not decide; the item stays unresolved rather than
    /// being forced into a wrong kind.
    Deferred,
}

/// Backs Phase 4's terminal UI: items that failed Phase 3
/// become pending review, one at a time, claimed the same way every other
/// phase claims work so a reviewer and a worker instance can never both
/// touch the same item.
pub struct ManualReviewQueue {
    store: Arc<WorkStore>,
    stale_lock_ttl: Duration,
}

impl ManualReviewQueue {
    #[must_use]
    pub fn new(store: Arc<WorkStore>, stale_lock_ttl: Duration) -> Self {
        Self { store, stale_lock_ttl }
    }

    /// Items Phase 3 gave up on, resolved back to full `WorkItem`s in the
    /// order Phase 3 recorded them.
    pub fn pending_items(&self) -> Result<Vec<WorkItem>> {
        let failures = self.store.read_failure_stream(Phase::Phase3)?;
        let mut items = Vec::with_capacity(failures.len());
        for failure in failures {
            if let Some(item) = self.store.read_work_item(&failure.item_id)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Claims the first pending item not already claimed or already done.
    /// Returns `Ok(None)` once the queue is exhausted for now.
    pub fn claim_next(&self) -> Result<Option<ReviewClaim>> {
        for item in self.pending_items()? {
            match self.store.claim(Phase::Phase4, &item.item_id, self.stale_lock_ttl) {
                pipeline_store::ClaimOutcome::Acquired(lock) => return Ok(Some(ReviewClaim { lock, item })),
                pipeline_store::ClaimOutcome::AlreadyDone | pipeline_store::ClaimOutcome::Contended => continue,
            }
        }
        Ok(None)
    }

    /// Records the reviewer's decision and releases the claim. A `Deferred`
    /// decision writes nothing, leaving the item claimable again once the
    /// lock's TTL lapses.
    pub fn submit(&self, claim: ReviewClaim, decision: ReviewDecision) -> Result<()> {
        if let ReviewDecision::Classified { doc_kind, fields, confidence } = decision {
            let fields = full_field_set(doc_kind, fields, &claim.item.envelope);
            if doc_kind.emits_structured_document() {
                emit_xml_sidecar(&self.store, &claim.item.item_id, doc_kind, &fields);
            }
            let (_, primary_bytes) = primary_document_of(&claim.item);

            let artifact = Artifact {
                item_id: claim.item.item_id.clone(),
                phase: Phase::Phase4,
                doc_kind,
                fields,
                raw_text_sha256: sha256_hex(&claim.item.envelope.body_text),
                content_md5: content_md5_hex(&primary_bytes),
                confidence,
                escalation_trace: None,
            };
            self.store.write_artifact(&artifact)?;
        }

        claim.lock.release().map_err(|e| anyhow::anyhow!("failed to release review lock: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use pipeline_types::{Envelope, FailureRecord};
    use tempfile::TempDir;

    use super::*;

    fn store(dir: &TempDir) -> Arc<WorkStore> {
        Arc::new(WorkStore::new(
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            "host-a".to_string(),
        ))
    }

    fn write_item(store: &WorkStore, item_id: &str) -> WorkItem {
        let item = WorkItem {
            item_id: item_id.to_string(),
            slot: 0,
            envelope: Envelope {
                sender: "a@b.com".to_string(),
                recipients: vec!["me@example.com".to_string()],
                subject: "subject".to_string(),
                date: "2024-01-01T00:00:00Z".to_string(),
                body_text: "body".to_string(),
            },
            attachments: Vec::new(),
        };
        let path = store.layout().input_item_path(item_id);
        std::fs::create_dir_all(path.parent().unwrap().as_std_path()).unwrap();
        std::fs::write(path.as_std_path(), serde_json::to_string(&item).unwrap()).unwrap();
        item
    }

    #[tokio::test]
    async fn claim_then_submit_writes_a_phase4_artifact() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        write_item(&store, "item-1");
        store
            .append_failure(&FailureRecord::new("item-1", Phase::Phase3, "model_unparseable", "..."))
            .unwrap();

        let queue = ManualReviewQueue::new(Arc::clone(&store), Duration::from_secs(600));
        let claim = queue.claim_next().unwrap().expect("one pending item");
        assert_eq!(claim.item.item_id, "item-1");

        queue
            .submit(
                claim,
                ReviewDecision::Classified {
                    doc_kind: DocumentKind::Invoice,
                    fields: BTreeMap::new(),
                    confidence: 1.0,
                },
            )
            .unwrap();

        assert!(store.read_artifact(Phase::Phase4, "item-1").unwrap().is_some());
    }

    #[tokio::test]
    async fn contended_item_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        write_item(&store, "item-1");
        store
            .append_failure(&FailureRecord::new("item-1", Phase::Phase3, "model_unparseable", "..."))
            .unwrap();

        let queue = ManualReviewQueue::new(Arc::clone(&store), Duration::from_secs(600));
        let _held = queue.claim_next().unwrap().expect("one pending item");

        let second = queue.claim_next().unwrap();
        assert!(second.is_none());
    }
}
