//! Phase 5 orchestration: content dedup, correspondent resolution, tag
//! resolution, and idempotent upload/patch. The transport
//! lives in `client.rs`; this module only decides which calls to make and
//! in what order.

use std::collections::BTreeMap;
use std::sync::Arc;

use pipeline_correspondent::{normalize, KnownMappings};
use pipeline_store::WorkStore;
use pipeline_types::Artifact;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::client::DeliveryClient;
use crate::error::DeliveryError;
use crate::retry::{with_retry, RetryPolicy};
use crate::tag_vocabulary::TagVocabulary;

/// Whether an item's document already existed on the delivery target before
/// this run (content-hash match, or a 409 on upload) or was created fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Created,
    AlreadyDelivered,
}

/// Tally of a [`run_delivery`] call, for the `docpipeline` CLI and logs.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    pub created: u64,
    pub already_delivered: u64,
    /// `(item_id, error message)` for every item whose delivery ended in a
    /// terminal failure; these are the only Phase 5 outcomes that would
    /// warrant a `FailureRecord` further up the call stack.
    pub fatal: Vec<(String, String)>,
}

impl DeliveryReport {
    #[must_use]
    pub fn total_processed(&self) -> u64 {
        self.created + self.already_delivered + self.fatal.len() as u64
    }

    fn record(&mut self, item_id: String, result: Result<DeliveryOutcome, DeliveryError>) {
        match result {
            Ok(DeliveryOutcome::Created) => self.created += 1,
            Ok(DeliveryOutcome::AlreadyDelivered) => self.already_delivered += 1,
            Err(error) => {
                tracing::warn!(item_id = %item_id, error = %error, "item failed delivery");
                self.fatal.push((item_id, error.to_string()));
            }
        }
    }
}

/// Delivers the union of Phase 1-4 Artifacts. Requests against the single
/// configured target are bounded to `fan_out` concurrent items; the target
/// itself never sees more than that many in-flight requests at once.
pub async fn run_delivery(
    client: Arc<DeliveryClient>,
    store: Arc<WorkStore>,
    vocabulary: Arc<TagVocabulary>,
    mappings: Arc<KnownMappings>,
    retry: RetryPolicy,
    fan_out: usize,
    artifacts: Vec<Artifact>,
) -> DeliveryReport {
    let semaphore = Arc::new(Semaphore::new(fan_out.max(1)));
    let mut tasks = JoinSet::new();

    for artifact in artifacts {
        let client = Arc::clone(&client);
        let store = Arc::clone(&store);
        let vocabulary = Arc::clone(&vocabulary);
        let mappings = Arc::clone(&mappings);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
            let item_id = artifact.item_id.clone();
            let result = deliver_one(&client, &store, &vocabulary, &mappings, &retry, &artifact).await;
            (item_id, result)
        });
    }

    let mut report = DeliveryReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((item_id, result)) => report.record(item_id, result),
            Err(join_error) => tracing::error!(error = %join_error, "delivery task panicked"),
        }
    }
    report
}

async fn deliver_one(
    client: &DeliveryClient,
    store: &WorkStore,
    vocabulary: &TagVocabulary,
    mappings: &KnownMappings,
    retry: &RetryPolicy,
    artifact: &Artifact,
) -> Result<DeliveryOutcome, DeliveryError> {
    let (document_id, outcome) = resolve_document(client, store, retry, artifact).await?;

    let normalized_key = normalize(&sender_raw(artifact));
    let correspondent_id = if normalized_key.is_empty() {
        None
    } else {
        Some(resolve_correspondent(client, mappings, retry, &normalized_key).await?)
    };

    let mut tag_ids = Vec::with_capacity(1);
    for tag_name in vocabulary.tags_for(artifact.doc_kind) {
        tag_ids.push(resolve_tag(client, retry, &tag_name).await?);
    }

    let fields = patch_body(artifact, correspondent_id, &tag_ids);
    with_retry(retry, || client.patch_fields(document_id, &fields)).await?;

    Ok(outcome)
}

/// Content deduplication: a hash match skips upload
/// entirely; a 409 on upload means a concurrent writer won the race and is
/// likewise treated as a match rather than a failure.
async fn resolve_document(
    client: &DeliveryClient,
    store: &WorkStore,
    retry: &RetryPolicy,
    artifact: &Artifact,
) -> Result<(u64, DeliveryOutcome), DeliveryError> {
    if let Some(existing) = with_retry(retry, || client.find_document_by_hash(&artifact.content_md5)).await? {
        return Ok((existing.id, DeliveryOutcome::AlreadyDelivered));
    }

    let (filename, bytes) = store.primary_document(&artifact.item_id).map_err(|error| {
        DeliveryError::Fatal(format!("cannot load source document for {}: {error}", artifact.item_id))
    })?;

    match with_retry(retry, || client.create_document(&filename, bytes.clone(), &artifact.content_md5)).await {
        Ok(document) => Ok((document.id, DeliveryOutcome::Created)),
        Err(DeliveryError::Conflict(_)) => {
            let existing = client
                .find_document_by_hash(&artifact.content_md5)
                .await?
                .ok_or_else(|| DeliveryError::Fatal("409 on upload but hash not found on re-query".to_string()))?;
            Ok((existing.id, DeliveryOutcome::AlreadyDelivered))
        }
        Err(other) => Err(other),
    }
}

/// Correspondent resolution: look up by normalized
/// key before creating, so repeated runs never produce duplicate
/// correspondents.
async fn resolve_correspondent(
    client: &DeliveryClient,
    mappings: &KnownMappings,
    retry: &RetryPolicy,
    normalized_key: &str,
) -> Result<u64, DeliveryError> {
    if let Some(existing) = with_retry(retry, || client.find_correspondent(normalized_key)).await? {
        return Ok(existing.id);
    }
    let display_name = mappings.get_best_name(normalized_key);
    let created = with_retry(retry, || client.create_correspondent(normalized_key, &display_name)).await?;
    Ok(created.id)
}

/// Tag & category resolution: same look-up-before-create
/// discipline as correspondents.
async fn resolve_tag(client: &DeliveryClient, retry: &RetryPolicy, name: &str) -> Result<u64, DeliveryError> {
    if let Some(existing) = with_retry(retry, || client.find_tag(name)).await? {
        return Ok(existing.id);
    }
    let created = with_retry(retry, || client.create_tag(name)).await?;
    Ok(created.id)
}

/// The 31 named fields plus the resolved correspondent and tags, merged into
/// one body so a single `PATCH` leaves the document fully reconciled.
fn patch_body(artifact: &Artifact, correspondent_id: Option<u64>, tag_ids: &[u64]) -> BTreeMap<String, Value> {
    let mut fields = artifact.fields.clone();
    if let Some(correspondent_id) = correspondent_id {
        fields.insert("correspondent_id".to_string(), Value::from(correspondent_id));
    }
    fields.insert("tag_ids".to_string(), Value::from(tag_ids.to_vec()));
    fields
}

/// Best-effort raw sender string for the Correspondent Normalizer, built
/// from whichever of `contact_name_sender`/`contact_email_sender` the
/// extractor populated.
fn sender_raw(artifact: &Artifact) -> String {
    let name = field_str(artifact, "contact_name_sender");
    let email = field_str(artifact, "contact_email_sender");
    match (name, email) {
        (Some(name), Some(email)) => format!("{name} <{email}>"),
        (Some(name), None) => name,
        (None, Some(email)) => email,
        (None, None) => String::new(),
    }
}

fn field_str(artifact: &Artifact, key: &str) -> Option<String> {
    artifact.fields.get(key).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use camino::Utf8PathBuf;
    use pipeline_types::{DocumentKind, Phase};
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn sample_artifact(item_id: &str) -> Artifact {
        let mut fields = BTreeMap::new();
        fields.insert("contact_name_sender".to_string(), json!("Aukro s.r.o."));
        fields.insert("contact_email_sender".to_string(), json!("noreply@aukro.cz"));
        Artifact {
            item_id: item_id.to_string(),
            phase: Phase::Phase1,
            doc_kind: DocumentKind::Invoice,
            fields,
            raw_text_sha256: "0".repeat(64),
            content_md5: "d41d8cd98f00b204e9800998ecf8427e".to_string(),
            confidence: 0.9,
            escalation_trace: None,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            initial_delay: std::time::Duration::from_millis(1),
            factor: 2,
            max_delay: std::time::Duration::from_millis(5),
        }
    }

    fn empty_store() -> (TempDir, Arc<WorkStore>) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        (dir, Arc::new(WorkStore::new(root, "host-a".to_string())))
    }

    #[test]
    fn sender_raw_combines_name_and_email() {
        let artifact = sample_artifact("item-1");
        assert_eq!(sender_raw(&artifact), "Aukro s.r.o. <noreply@aukro.cz>");
    }

    #[tokio::test]
    async fn already_delivered_document_is_not_reuploaded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 7, "content_hash": "d41d8cd98f00b204e9800998ecf8427e"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/correspondents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "normalized_key": "aukro"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 2, "name": "invoice"}])))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (_dir, store) = empty_store();
        let client = Arc::new(DeliveryClient::new(server.uri(), "token".to_string()));
        let report = run_delivery(
            client,
            store,
            Arc::new(TagVocabulary::default()),
            Arc::new(KnownMappings::default()),
            fast_retry(),
            2,
            vec![sample_artifact("item-1")],
        )
        .await;

        assert_eq!(report.already_delivered, 1);
        assert_eq!(report.created, 0);
        assert!(report.fatal.is_empty());
    }

    #[tokio::test]
    async fn fatal_error_is_recorded_without_panicking_other_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (_dir, store) = empty_store();
        let client = Arc::new(DeliveryClient::new(server.uri(), "token".to_string()));
        let report = run_delivery(
            client,
            store,
            Arc::new(TagVocabulary::default()),
            Arc::new(KnownMappings::default()),
            fast_retry(),
            2,
            vec![sample_artifact("item-1")],
        )
        .await;

        assert_eq!(report.fatal.len(), 1);
        assert_eq!(report.fatal[0].0, "item-1");
    }
}
