//! Thin HTTP client for the document-management service: bearer-token
//! authenticated, with no logic beyond the transport and
//! idempotence-support lookups. Orchestration (dedup, reconciliation,
//! retry policy) lives in `deliver.rs`.

use std::collections::BTreeMap;

use reqwest::multipart;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DeliveryError;

pub struct DeliveryClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentRef {
    pub id: u64,
    pub content_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorrespondentRef {
    pub id: u64,
    pub normalized_key: String,
}

/// Full correspondent record, including the document count the offline
/// merger (`pipeline-correspondent`) needs to pick a primary.
#[derive(Debug, Clone, Deserialize)]
pub struct CorrespondentDetail {
    pub id: u64,
    pub normalized_key: String,
    pub display_name: String,
    pub document_count: u64,
}

impl From<CorrespondentDetail> for pipeline_types::Correspondent {
    fn from(detail: CorrespondentDetail) -> Self {
        Self {
            id: detail.id,
            normalized_key: detail.normalized_key,
            display_name: detail.display_name,
            document_count: detail.document_count,
        }
    }
}

#[derive(Debug, Serialize)]
struct MergeCorrespondentsRequest {
    duplicate_ids: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagRef {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Serialize)]
struct CreateCorrespondentRequest<'a> {
    normalized_key: &'a str,
    display_name: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateTagRequest<'a> {
    name: &'a str,
}

impl DeliveryClient {
    #[must_use]
    pub fn new(base_url: String, api_token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_token,
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.api_token)
    }

    /// `GET /documents?hash=…`; `None` when no document has this hash yet.
    pub async fn find_document_by_hash(&self, content_hash: &str) -> Result<Option<DocumentRef>, DeliveryError> {
        let url = format!("{}/documents", self.base_url);
        let response = self
            .authed(self.client.get(&url).query(&[("hash", content_hash)]))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, false));
        }
        let found: Vec<DocumentRef> = response.json().await?;
        Ok(found.into_iter().next())
    }

    /// `POST /documents` (multipart). A 409 means another writer beat this
    /// one to the same content hash, which is treated as success.
    pub async fn create_document(&self, filename: &str, bytes: Vec<u8>, content_hash: &str) -> Result<DocumentRef, DeliveryError> {
        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = multipart::Form::new().part("file", part).text("content_hash", content_hash.to_string());

        let url = format!("{}/documents", self.base_url);
        let response = self.authed(self.client.post(&url).multipart(form)).send().await?;

        if !response.status().is_success() {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, true));
        }
        Ok(response.json().await?)
    }

    /// `PATCH /documents/{id}` with the full 31-field set.
    pub async fn patch_fields(&self, document_id: u64, fields: &BTreeMap<String, Value>) -> Result<(), DeliveryError> {
        let url = format!("{}/documents/{document_id}", self.base_url);
        let response = self.authed(self.client.patch(&url).json(fields)).send().await?;

        if !response.status().is_success() {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, false));
        }
        Ok(())
    }

    /// `GET /correspondents?normalized_key=…`.
    pub async fn find_correspondent(&self, normalized_key: &str) -> Result<Option<CorrespondentRef>, DeliveryError> {
        let url = format!("{}/correspondents", self.base_url);
        let response = self
            .authed(self.client.get(&url).query(&[("normalized_key", normalized_key)]))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, false));
        }
        let found: Vec<CorrespondentRef> = response.json().await?;
        Ok(found.into_iter().next())
    }

    /// `POST /correspondents`. A 409 means another writer created the same
    /// normalized key first; callers re-query rather than treat this as a
    /// distinct correspondent.
    pub async fn create_correspondent(&self, normalized_key: &str, display_name: &str) -> Result<CorrespondentRef, DeliveryError> {
        let url = format!("{}/correspondents", self.base_url);
        let response = self
            .authed(
                self.client
                    .post(&url)
                    .json(&CreateCorrespondentRequest { normalized_key, display_name }),
            )
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            return self
                .find_correspondent(normalized_key)
                .await?
                .ok_or_else(|| DeliveryError::Fatal("409 on create but no correspondent found on re-query".to_string()));
        }
        if !response.status().is_success() {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, false));
        }
        Ok(response.json().await?)
    }

    /// `GET /correspondents` with no filter: every correspondent, for the
    /// offline merger to group by normalized key.
    pub async fn list_correspondents(&self) -> Result<Vec<CorrespondentDetail>, DeliveryError> {
        let url = format!("{}/correspondents", self.base_url);
        let response = self.authed(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, false));
        }
        Ok(response.json().await?)
    }

    /// `POST /correspondents/{primary_id}/merge`: reassigns every document
    /// owned by `duplicate_ids` onto `primary_id`, then deletes the
    /// duplicates server-side. Applied only when a merge plan isn't run
    /// with `--dry-run`.
    pub async fn merge_correspondents(&self, primary_id: u64, duplicate_ids: &[u64]) -> Result<(), DeliveryError> {
        let url = format!("{}/correspondents/{primary_id}/merge", self.base_url);
        let response = self
            .authed(self.client.post(&url).json(&MergeCorrespondentsRequest {
                duplicate_ids: duplicate_ids.to_vec(),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, false));
        }
        Ok(())
    }

    pub async fn delete_correspondent(&self, id: u64) -> Result<(), DeliveryError> {
        let url = format!("{}/correspondents/{id}", self.base_url);
        let response = self.authed(self.client.delete(&url)).send().await?;
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, false));
        }
        Ok(())
    }

    /// `GET /tags?name=…`.
    pub async fn find_tag(&self, name: &str) -> Result<Option<TagRef>, DeliveryError> {
        let url = format!("{}/tags", self.base_url);
        let response = self.authed(self.client.get(&url).query(&[("name", name)])).send().await?;

        if !response.status().is_success() {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, false));
        }
        let found: Vec<TagRef> = response.json().await?;
        Ok(found.into_iter().next())
    }

    pub async fn create_tag(&self, name: &str) -> Result<TagRef, DeliveryError> {
        let url = format!("{}/tags", self.base_url);
        let response = self.authed(self.client.post(&url).json(&CreateTagRequest { name })).send().await?;

        if response.status() == reqwest::StatusCode::CONFLICT {
            return self
                .find_tag(name)
                .await?
                .ok_or_else(|| DeliveryError::Fatal("409 on create but no tag found on re-query".to_string()));
        }
        if !response.status().is_success() {
            return Err(DeliveryError::from_status(response.status(), response_body(response).await, false));
        }
        Ok(response.json().await?)
    }
}

async fn response_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}
