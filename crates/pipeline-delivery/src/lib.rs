//! Phase 5 delivery: the HTTP client for the downstream document-management
//! service (`client.rs`), the dedup/reconciliation orchestration that drives
//! it (`deliver.rs`), and the kind-to-tag lookup table it consults
//! (`tag_vocabulary.rs`).

mod client;
mod deliver;
mod error;
mod retry;
mod tag_vocabulary;

pub use client::{CorrespondentDetail, CorrespondentRef, DeliveryClient, DocumentRef, TagRef};
pub use deliver::{run_delivery, DeliveryOutcome, DeliveryReport};
pub use error::DeliveryError;
pub use retry::RetryPolicy;
pub use tag_vocabulary::TagVocabulary;
