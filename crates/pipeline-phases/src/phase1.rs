//! Phase 1: rule-based classification. OCRs each attachment
//! (bounded by a per-attachment timeout and a concurrency pool), concatenates
//! the resulting text with the envelope body, classifies it against the
//! configured rule table, extracts fields, and emits an XML sidecar for the
//! accounting kinds.

use std::sync::Arc;

use async_trait::async_trait;
use pipeline_config::OcrConfig;
use pipeline_extract::{extract_fields, ClassifyOutcome, RuleTable};
use pipeline_ocr::{OcrEngine, OcrError, OcrOptions};
use pipeline_store::{primary_document_of, WorkStore};
use pipeline_types::{Artifact, DocumentKind, Phase, WorkItem};
use pipeline_utils::error::FailureReason;
use pipeline_utils::hash::{content_md5_hex, sha256_hex};
use tokio::sync::Semaphore;

use crate::worker::{ItemOutcome, ItemProcessor};
use crate::xml::emit_xml_sidecar;

/// Attachments below this extracted-character count (including envelope-only
/// items with no attachments at all) fail as `ocr_insufficient`.
const MIN_RAW_TEXT_CHARS: usize = 100;

pub struct Phase1Processor {
    ocr: Arc<dyn OcrEngine>,
    rules: Arc<RuleTable>,
    store: Arc<WorkStore>,
    ocr_options: OcrOptions,
    pool: Arc<Semaphore>,
}

impl Phase1Processor {
    #[must_use]
    pub fn new(ocr: Arc<dyn OcrEngine>, rules: Arc<RuleTable>, store: Arc<WorkStore>, config: &OcrConfig) -> Self {
        Self {
            ocr,
            rules,
            store,
            ocr_options: OcrOptions {
                max_pages: config.max_pages,
                timeout: std::time::Duration::from_secs(config.per_attachment_timeout_seconds),
            },
            pool: Arc::new(Semaphore::new(config.worker_pool_size.max(1))),
        }
    }

    /// OCRs every attachment concurrently, bounded by `self.pool`. The first
    /// timeout or backend error among them short-circuits the rest.
    async fn ocr_attachments(&self, item: &WorkItem) -> Result<String, OcrError> {
        let mut tasks = Vec::with_capacity(item.attachments.len());
        for attachment in &item.attachments {
            let ocr = Arc::clone(&self.ocr);
            let options = self.ocr_options.clone();
            let permit = Arc::clone(&self.pool);
            let bytes = attachment.bytes.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore never closed");
                ocr.extract(&bytes, &options).await
            }));
        }

        let mut texts = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(Ok(result)) => texts.push(result.text),
                Ok(Err(e)) => return Err(e),
                Err(e) => return Err(OcrError::Backend(format!("ocr task panicked: {e}"))),
            }
        }
        Ok(texts.join("\n"))
    }
}

#[async_trait]
impl ItemProcessor for Phase1Processor {
    fn phase(&self) -> Phase {
        Phase::Phase1
    }

    async fn process(&self, item: &WorkItem) -> ItemOutcome {
        let attachment_text = if item.has_attachments() {
            match self.ocr_attachments(item).await {
                Ok(text) => text,
                Err(OcrError::Timeout(_)) => {
                    return ItemOutcome::Failed {
                        reason: FailureReason::OcrTimeout,
                        snippet: format!("ocr timed out for item {}", item.item_id),
                    };
                }
                Err(e) => {
                    return ItemOutcome::Failed {
                        reason: FailureReason::OcrError,
                        snippet: e.to_string(),
                    };
                }
            }
        } else {
            String::new()
        };

        let raw_text = if attachment_text.is_empty() {
            item.envelope.body_text.clone()
        } else {
            format!("{}\n{}", item.envelope.body_text, attachment_text)
        };

        if raw_text.chars().count() < MIN_RAW_TEXT_CHARS {
            return ItemOutcome::Failed {
                reason: FailureReason::OcrInsufficient,
                snippet: raw_text,
            };
        }

        let ClassifyOutcome { doc_kind, confidence } =
            self.rules
                .classify(&item.envelope.sender, &item.envelope.subject, &raw_text);

        if doc_kind == DocumentKind::Unknown {
            return ItemOutcome::Failed {
                reason: FailureReason::Unclassified,
                snippet: raw_text,
            };
        }

        let fields = extract_fields(&raw_text, doc_kind, &item.envelope);
        if doc_kind.emits_structured_document() {
            emit_xml_sidecar(&self.store, &item.item_id, doc_kind, &fields);
        }

        let (_, primary_bytes) = primary_document_of(item);

        ItemOutcome::Artifact(Box::new(Artifact {
            item_id: item.item_id.clone(),
            phase: Phase::Phase1,
            doc_kind,
            fields,
            raw_text_sha256: sha256_hex(&raw_text),
            content_md5: content_md5_hex(&primary_bytes),
            confidence,
            escalation_trace: None,
        }))
    }
}
