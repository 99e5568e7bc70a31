//! Phase 2: hierarchical local-model escalation. Walks
//! SMALL -> MEDIUM -> LARGE via `pipeline_llm::run_escalation`, wraps the
//! winning tier's fields into the full 31-field contract, and emits an XML
//! sidecar for the accounting kinds just like Phase 1.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline_config::LocalInferenceConfig;
use pipeline_llm::{run_escalation, EscalationOutcome, ModelBackend, TierTimeouts};
use pipeline_store::{primary_document_of, WorkStore};
use pipeline_types::{Artifact, Phase, WorkItem};
use pipeline_utils::error::FailureReason;
use pipeline_utils::hash::{content_md5_hex, sha256_hex};

use crate::model_fields::{build_prompt, full_field_set};
use crate::worker::{ItemOutcome, ItemProcessor};
use crate::xml::emit_xml_sidecar;

pub struct Phase2Processor {
    backend: Arc<dyn ModelBackend>,
    small_model: String,
    medium_model: String,
    large_model: String,
    timeouts: TierTimeouts,
    store: Arc<WorkStore>,
}

impl Phase2Processor {
    #[must_use]
    pub fn new(backend: Arc<dyn ModelBackend>, config: &LocalInferenceConfig, store: Arc<WorkStore>) -> Self {
        Self {
            backend,
            small_model: config.small_model.clone(),
            medium_model: config.medium_model.clone(),
            large_model: config.large_model.clone(),
            timeouts: TierTimeouts {
                small: std::time::Duration::from_secs(config.small_timeout_seconds),
                medium: std::time::Duration::from_secs(config.medium_timeout_seconds),
                large: std::time::Duration::from_secs(config.large_timeout_seconds),
            },
            store,
        }
    }
}

#[async_trait]
impl ItemProcessor for Phase2Processor {
    fn phase(&self) -> Phase {
        Phase::Phase2
    }

    async fn process(&self, item: &WorkItem) -> ItemOutcome {
        let prompt = build_prompt(item);
        let outcome = run_escalation(
            self.backend.as_ref(),
            &self.small_model,
            &self.medium_model,
            &self.large_model,
            &self.timeouts,
            &prompt,
        )
        .await;

        match outcome {
            EscalationOutcome::Done { doc_kind, fields, confidence, trace } => {
                let fields = full_field_set(doc_kind, fields, &item.envelope);
                if doc_kind.emits_structured_document() {
                    emit_xml_sidecar(&self.store, &item.item_id, doc_kind, &fields);
                }
                let (_, primary_bytes) = primary_document_of(item);

                ItemOutcome::Artifact(Box::new(Artifact {
                    item_id: item.item_id.clone(),
                    phase: Phase::Phase2,
                    doc_kind,
                    fields,
                    raw_text_sha256: sha256_hex(&item.envelope.body_text),
                    content_md5: content_md5_hex(&primary_bytes),
                    confidence,
                    escalation_trace: Some(trace),
                }))
            }
            EscalationOutcome::Failed { trace } => {
                let timed_out = trace.last().is_some_and(|v| v.timed_out);
                let reason = if timed_out {
                    FailureReason::ModelTimeout
                } else {
                    FailureReason::ModelDisagreementUnresolved
                };
                ItemOutcome::Failed {
                    reason,
                    snippet: format!("escalation trace: {trace:?}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use pipeline_llm::{ModelError, ModelRequest, ModelVerdict};
    use pipeline_types::{DocumentKind, Envelope};
    use tempfile::TempDir;
    use tokio::sync::Mutex;

    use super::*;

    struct ScriptedBackend {
        responses: Mutex<Vec<Result<ModelVerdict, ModelError>>>,
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn classify(&self, _request: &ModelRequest) -> Result<ModelVerdict, ModelError> {
            self.responses.lock().await.remove(0)
        }
    }

    fn verdict(kind: DocumentKind) -> ModelVerdict {
        ModelVerdict {
            doc_kind: kind,
            fields: BTreeMap::new(),
            confidence: 0.8,
        }
    }

    fn config() -> LocalInferenceConfig {
        LocalInferenceConfig {
            small_endpoint: "http://localhost:1".to_string(),
            small_model: "small".to_string(),
            small_timeout_seconds: 1,
            medium_endpoint: "http://localhost:2".to_string(),
            medium_model: "medium".to_string(),
            medium_timeout_seconds: 1,
            large_endpoint: "http://localhost:3".to_string(),
            large_model: "large".to_string(),
            large_timeout_seconds: 1,
        }
    }

    fn store() -> (TempDir, Arc<WorkStore>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(WorkStore::new(
            camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            "host-a".to_string(),
        ));
        (dir, store)
    }

    fn item() -> WorkItem {
        WorkItem {
            item_id: "item-1".to_string(),
            slot: 0,
            envelope: Envelope {
                sender: "billing@acme.com".to_string(),
                recipients: vec!["ap@example.com".to_string()],
                subject: "Invoice".to_string(),
                date: "2024-01-01T00:00:00Z".to_string(),
                body_text: "body".to_string(),
            },
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn agreement_produces_a_two_verdict_artifact() {
        let (_dir, store) = store();
        let backend = Arc::new(ScriptedBackend {
            responses: Mutex::new(vec![Ok(verdict(DocumentKind::Invoice)), Ok(verdict(DocumentKind::Invoice))]),
        });
        let processor = Phase2Processor::new(backend, &config(), store);

        match processor.process(&item()).await {
            ItemOutcome::Artifact(artifact) => {
                assert_eq!(artifact.doc_kind, DocumentKind::Invoice);
                assert_eq!(artifact.escalation_trace.unwrap().len(), 2);
            }
            _ => panic!("expected an artifact"),
        }
    }

    #[tokio::test]
    async fn large_timeout_fails_as_model_timeout() {
        let (_dir, store) = store();
        let backend = Arc::new(ScriptedBackend {
            responses: Mutex::new(vec![
                Ok(verdict(DocumentKind::Receipt)),
                Ok(verdict(DocumentKind::Invoice)),
                Err(ModelError::Timeout(Duration::from_secs(1))),
            ]),
        });
        let processor = Phase2Processor::new(backend, &config(), store);

        let outcome = processor.process(&item()).await;
        assert!(matches!(outcome, ItemOutcome::Failed { reason: FailureReason::ModelTimeout, .. }));
    }
}
