//! Phase 3: the external large-model call, gated by a persisted daily
//! budget. One call attempt, successful or not, consumes one budget unit:
//! `ModelVerdict` carries no token-usage field to account more finely, so
//! `daily_budget_units` is effectively a call-count ceiling (see
//! DESIGN.md).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use camino::Utf8PathBuf;
use pipeline_config::ExternalModelConfig;
use pipeline_llm::{classify_with_retry, Budget, ModelBackend, ModelError, ModelRequest, RetryPolicy};
use pipeline_store::{primary_document_of, WorkStore};
use pipeline_types::{Artifact, Phase, WorkItem};
use pipeline_utils::error::FailureReason;
use pipeline_utils::hash::{content_md5_hex, sha256_hex};

use crate::model_fields::{build_prompt, full_field_set};
use crate::worker::{ItemOutcome, ItemProcessor};
use crate::xml::emit_xml_sidecar;

/// One call attempt, regardless of outcome, is one unit (see module docs).
const UNITS_PER_CALL: u64 = 1;

pub struct Phase3Processor {
    backend: Arc<dyn ModelBackend>,
    model: String,
    timeout: Duration,
    retry: RetryPolicy,
    store: Arc<WorkStore>,
    budget_path: Utf8PathBuf,
    daily_budget_units: u64,
}

impl Phase3Processor {
    #[must_use]
    pub fn new(backend: Arc<dyn ModelBackend>, config: &ExternalModelConfig, store: Arc<WorkStore>) -> Self {
        let budget_path = store.layout().budget_path("external_model");
        Self {
            backend,
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            retry: RetryPolicy {
                max_attempts: config.retry.max_attempts,
                initial_delay: Duration::from_secs(config.retry.initial_backoff_seconds),
                factor: config.retry.backoff_factor as u32,
                max_delay: Duration::from_secs(config.retry.max_backoff_seconds),
            },
            store,
            budget_path,
            daily_budget_units: config.daily_budget_units,
        }
    }

    fn load_budget(&self) -> Budget {
        let today = chrono::Utc::now().date_naive();
        Budget::load_or_init(&self.budget_path, today, self.daily_budget_units).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to load external-model budget, treating as exhausted");
            Budget::load_or_init(&self.budget_path, today, 0).expect("zero-ceiling budget never fails to load")
        })
    }
}

#[async_trait]
impl ItemProcessor for Phase3Processor {
    fn phase(&self) -> Phase {
        Phase::Phase3
    }

    async fn process(&self, item: &WorkItem) -> ItemOutcome {
        let mut budget = self.load_budget();
        if !budget.can_afford(UNITS_PER_CALL) {
            return ItemOutcome::Deferred {
                reason: FailureReason::QuotaExhausted,
                snippet: "daily external-model budget exhausted".to_string(),
            };
        }

        let prompt = build_prompt(item);
        let request = ModelRequest::new(&self.model, &prompt, self.timeout);
        let result = classify_with_retry(self.backend.as_ref(), &request, &self.retry).await;

        budget.record_spend(UNITS_PER_CALL);
        if let Err(e) = budget.persist(&self.budget_path) {
            tracing::error!(error = %e, "failed to persist external-model budget");
        }

        match result {
            Ok(verdict) => {
                let fields = full_field_set(verdict.doc_kind, verdict.fields, &item.envelope);
                if verdict.doc_kind.emits_structured_document() {
                    emit_xml_sidecar(&self.store, &item.item_id, verdict.doc_kind, &fields);
                }
                let (_, primary_bytes) = primary_document_of(item);

                ItemOutcome::Artifact(Box::new(Artifact {
                    item_id: item.item_id.clone(),
                    phase: Phase::Phase3,
                    doc_kind: verdict.doc_kind,
                    fields,
                    raw_text_sha256: sha256_hex(&item.envelope.body_text),
                    content_md5: content_md5_hex(&primary_bytes),
                    confidence: verdict.confidence,
                    escalation_trace: None,
                }))
            }
            Err(ModelError::RateLimited) => ItemOutcome::Deferred {
                reason: FailureReason::RateLimited,
                snippet: "external model rate-limited the request".to_string(),
            },
            Err(ModelError::Timeout(d)) => ItemOutcome::Failed {
                reason: FailureReason::ModelTimeout,
                snippet: format!("external model call timed out after {d:?}"),
            },
            Err(e @ (ModelError::Unparseable(_) | ModelError::Transport(_))) => ItemOutcome::Failed {
                reason: FailureReason::ModelUnparseable,
                snippet: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pipeline_llm::ModelVerdict;
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

    fn config(daily_budget_units: u64) -> ExternalModelConfig {
        ExternalModelConfig {
            endpoint: "http://localhost:1".to_string(),
            api_token: "token".to_string(),
            model: "external-large".to_string(),
            timeout_seconds: 5,
            retry: pipeline_config::RetryPolicy::default(),
            daily_budget_units,
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
    async fn successful_call_produces_an_artifact_and_spends_budget() {
        let (_dir, store) = store();
        let backend = Arc::new(ScriptedBackend {
            responses: Mutex::new(vec![Ok(ModelVerdict {
                doc_kind: DocumentKind::Invoice,
                fields: BTreeMap::new(),
                confidence: 0.95,
            })]),
        });
        let processor = Phase3Processor::new(backend, &config(10), store);

        match processor.process(&item()).await {
            ItemOutcome::Artifact(artifact) => assert_eq!(artifact.doc_kind, DocumentKind::Invoice),
            _ => panic!("expected an artifact"),
        }

        let budget = processor.load_budget();
        assert_eq!(budget.remaining_units(), 9);
    }

    #[tokio::test]
    async fn exhausted_budget_defers_without_calling() {
        let (_dir, store) = store();
        let backend = Arc::new(ScriptedBackend {
            responses: Mutex::new(Vec::new()),
        });
        let processor = Phase3Processor::new(backend, &config(0), store);

        let outcome = processor.process(&item()).await;
        assert!(matches!(
            outcome,
            ItemOutcome::Deferred { reason: FailureReason::QuotaExhausted, .. }
        ));
    }

    #[tokio::test]
    async fn rate_limited_response_is_deferred() {
        let (_dir, store) = store();
        let backend = Arc::new(ScriptedBackend {
            responses: Mutex::new(vec![Err(ModelError::RateLimited)]),
        });
        let processor = Phase3Processor::new(backend, &config(10), store);

        let outcome = processor.process(&item()).await;
        assert!(matches!(
            outcome,
            ItemOutcome::Deferred { reason: FailureReason::RateLimited, .. }
        ));
    }
}
