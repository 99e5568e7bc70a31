use std::collections::BTreeMap;
use std::time::Duration;

use pipeline_types::{DocumentKind, EscalationVerdict, ModelTier};

use crate::backend::ModelBackend;
use crate::types::{ModelError, ModelRequest};

/// Per-tier timeouts for a Phase 2 run.
#[derive(Debug, Clone)]
pub struct TierTimeouts {
    pub small: Duration,
    pub medium: Duration,
    pub large: Duration,
}

impl Default for TierTimeouts {
    fn default() -> Self {
        Self {
            small: Duration::from_secs(60),
            medium: Duration::from_secs(90),
            large: Duration::from_secs(180),
        }
    }
}

/// Result of walking the `SMALL -> MEDIUM -> LARGE -> DONE | FAILED` state
/// machine for one item.
pub enum EscalationOutcome {
    Done {
        doc_kind: DocumentKind,
        fields: BTreeMap<String, serde_json::Value>,
        confidence: f64,
        trace: Vec<EscalationVerdict>,
    },
    Failed {
        trace: Vec<EscalationVerdict>,
    },
}

struct TierCall {
    tier: ModelTier,
    verdict: EscalationVerdict,
    fields: Option<BTreeMap<String, serde_json::Value>>,
}

async fn call_tier(
    backend: &dyn ModelBackend,
    tier: ModelTier,
    model: &str,
    prompt: &str,
    timeout: Duration,
) -> TierCall {
    let request = ModelRequest::new(model, prompt, timeout);
    match backend.classify(&request).await {
        Ok(verdict) => TierCall {
            tier,
            verdict: EscalationVerdict {
                model_tier: tier,
                doc_kind: Some(verdict.doc_kind),
                confidence: verdict.confidence,
                timed_out: false,
            },
            fields: Some(verdict.fields),
        },
        Err(ModelError::Timeout(_)) => TierCall {
            tier,
            verdict: EscalationVerdict {
                model_tier: tier,
                doc_kind: None,
                confidence: 0.0,
                timed_out: true,
            },
            fields: None,
        },
        Err(_) => TierCall {
            tier,
            verdict: EscalationVerdict {
                model_tier: tier,
                doc_kind: None,
                confidence: 0.0,
                timed_out: false,
            },
            fields: None,
        },
    }
}

/// Walks SMALL, always on to MEDIUM, escalating to LARGE only on
/// disagreement or medium timeout. "Agreement" compares `DocumentKind` only;
/// the fields carried into `Done` are always the earliest successful
/// model's.
#[allow(clippy::too_many_arguments)]
pub async fn run_escalation(
    backend: &dyn ModelBackend,
    small_model: &str,
    medium_model: &str,
    large_model: &str,
    timeouts: &TierTimeouts,
    prompt: &str,
) -> EscalationOutcome {
    let small = call_tier(backend, ModelTier::Small, small_model, prompt, timeouts.small).await;
    let medium = call_tier(backend, ModelTier::Medium, medium_model, prompt, timeouts.medium).await;

    let mut trace = vec![small.verdict.clone(), medium.verdict.clone()];

    let agree = matches!(
        (small.verdict.doc_kind, medium.verdict.doc_kind),
        (Some(a), Some(b)) if a == b
    );

    if agree {
        // small's fields, per the transition table; small must have succeeded
        // for `agree` to be true, so its fields are always present here.
        let doc_kind = small.verdict.doc_kind.expect("agreement implies a kind");
        return EscalationOutcome::Done {
            doc_kind,
            fields: small.fields.unwrap_or_default(),
            confidence: small.verdict.confidence,
            trace,
        };
    }

    let large = call_tier(backend, ModelTier::Large, large_model, prompt, timeouts.large).await;
    trace.push(large.verdict.clone());

    match (large.verdict.doc_kind, large.fields) {
        (Some(doc_kind), Some(fields)) => EscalationOutcome::Done {
            doc_kind,
            fields,
            confidence: large.verdict.confidence,
            trace,
        },
        _ => EscalationOutcome::Failed { trace },
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use pipeline_types::DocumentKind;
    use tokio::sync::Mutex;

    use super::*;
    use crate::types::ModelVerdict;

    struct ScriptedBackend {
        responses: Mutex<Vec<Result<ModelVerdict, ModelError>>>,
    }

    #[async_trait]
    impl ModelBackend for ScriptedBackend {
        async fn classify(&self, _request: &ModelRequest) -> Result<ModelVerdict, ModelError> {
            let mut responses = self.responses.lock().await;
            responses.remove(0)
        }
    }

    fn verdict(kind: DocumentKind) -> ModelVerdict {
        ModelVerdict {
            doc_kind: kind,
            fields: BTreeMap::new(),
            confidence: 0.7,
        }
    }

    #[tokio::test]
    async fn small_and_medium_agreement_skips_large() {
        let backend = ScriptedBackend {
            responses: Mutex::new(vec![Ok(verdict(DocumentKind::Invoice)), Ok(verdict(DocumentKind::Invoice))]),
        };
        let outcome = run_escalation(
            &backend,
            "small",
            "medium",
            "large",
            &TierTimeouts::default(),
            "prompt",
        )
        .await;

        match outcome {
            EscalationOutcome::Done { doc_kind, trace, .. } => {
                assert_eq!(doc_kind, DocumentKind::Invoice);
                assert_eq!(trace.len(), 2);
            }
            EscalationOutcome::Failed { .. } => panic!("expected Done"),
        }
    }

    #[tokio::test]
    async fn disagreement_escalates_to_large_and_large_wins() {
        let backend = ScriptedBackend {
            responses: Mutex::new(vec![
                Ok(verdict(DocumentKind::Receipt)),
                Ok(verdict(DocumentKind::Invoice)),
                Ok(verdict(DocumentKind::Invoice)),
            ]),
        };
        let outcome = run_escalation(
            &backend,
            "small",
            "medium",
            "large",
            &TierTimeouts::default(),
            "prompt",
        )
        .await;

        match outcome {
            EscalationOutcome::Done { doc_kind, trace, .. } => {
                assert_eq!(doc_kind, DocumentKind::Invoice);
                assert_eq!(trace.len(), 3);
                assert_eq!(trace[0].doc_kind, Some(DocumentKind::Receipt));
                assert_eq!(trace[2].doc_kind, Some(DocumentKind::Invoice));
            }
            EscalationOutcome::Failed { .. } => panic!("expected Done"),
        }
    }

    #[tokio::test]
    async fn large_timeout_fails_the_item() {
        let backend = ScriptedBackend {
            responses: Mutex::new(vec![
                Ok(verdict(DocumentKind::Receipt)),
                Ok(verdict(DocumentKind::Invoice)),
                Err(ModelError::Timeout(Duration::from_secs(180))),
            ]),
        };
        let outcome = run_escalation(
            &backend,
            "small",
            "medium",
            "large",
            &TierTimeouts::default(),
            "prompt",
        )
        .await;

        assert!(matches!(outcome, EscalationOutcome::Failed { .. }));
    }
}
