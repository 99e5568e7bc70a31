//! Best-effort XML sidecar emission for accounting document kinds. Shared by every phase
//! that can produce a terminal classification, since the side channel isn't
//! phase-specific.

use std::collections::BTreeMap;

use pipeline_store::WorkStore;
use pipeline_types::DocumentKind;
use pipeline_utils::atomic_write::write_string_atomic;
use serde_json::Value;

pub(crate) fn emit_xml_sidecar(store: &WorkStore, item_id: &str, doc_kind: DocumentKind, fields: &BTreeMap<String, Value>) {
    if !doc_kind.emits_structured_document() {
        return;
    }

    let xml = match pipeline_extract::emit_xml(doc_kind, fields) {
        Ok(xml) => xml,
        Err(e) => {
            tracing::error!(item_id, ?doc_kind, error = %e, "failed to render xml sidecar");
            return;
        }
    };

    let path = store.layout().xml_path(item_id);
    if let Err(e) = write_string_atomic(&path, &xml) {
        tracing::error!(item_id, %path, error = %e, "failed to write xml sidecar");
    }
}
