//! Shared helpers for the model-backed phases (2 and 3, plus manual review):
//! merging a model's returned fields into the fixed 31-name contract Phase
//! 1's rule-based extractor already produces, and building the classification
//! prompt sent to a local or external model.

use std::collections::BTreeMap;

use pipeline_types::{DocumentKind, Envelope, FIELD_NAMES, WorkItem};
use serde_json::Value;

/// Merges `model_fields` into a full 31-key map, defaulting unset fields to
/// `null` and filling the envelope-derived contact fields the same way
/// `pipeline_extract::extract_fields` does, so an Artifact's shape never
/// reveals which phase produced it.
pub(crate) fn full_field_set(
    doc_kind: DocumentKind,
    model_fields: BTreeMap<String, Value>,
    envelope: &Envelope,
) -> BTreeMap<String, Value> {
    let mut fields: BTreeMap<String, Value> = FIELD_NAMES.iter().map(|&name| (name.to_string(), Value::Null)).collect();

    fields.insert("doc_kind".into(), Value::String(doc_kind.to_string()));
    fields.insert("contact_email_sender".into(), Value::String(envelope.sender.clone()));
    if let Some(recipient) = envelope.recipients.first() {
        fields.insert("contact_email_recipient".into(), Value::String(recipient.clone()));
    }
    fields.insert("topic".into(), Value::String(envelope.subject.clone()));

    for (key, value) in model_fields {
        if fields.contains_key(&key) {
            fields.insert(key, value);
        }
    }

    fields
}

/// The prompt sent to a local-inference or external-model tier: sender,
/// subject, and body text, parameterized by nothing beyond the envelope
/// itself, kind-hint templating is the rule/prompt author's concern, not
/// this worker's.
pub(crate) fn build_prompt(item: &WorkItem) -> String {
    format!(
        "Classify this document and extract its fields.\nSender: {}\nSubject: {}\nBody:\n{}",
        item.envelope.sender, item.envelope.subject, item.envelope.body_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope() -> Envelope {
        Envelope {
            sender: "billing@acme.com".to_string(),
            recipients: vec!["ap@example.com".to_string()],
            subject: "Your invoice".to_string(),
            date: "2024-01-05T00:00:00Z".to_string(),
            body_text: "body".to_string(),
        }
    }

    #[test]
    fn unknown_model_field_names_are_dropped() {
        let mut model_fields = BTreeMap::new();
        model_fields.insert("amount".to_string(), json!("100.00"));
        model_fields.insert("not_a_real_field".to_string(), json!("ignored"));

        let fields = full_field_set(DocumentKind::Invoice, model_fields, &envelope());
        assert_eq!(fields.len(), FIELD_NAMES.len());
        assert_eq!(fields["amount"], json!("100.00"));
        assert!(!fields.contains_key("not_a_real_field"));
    }

    #[test]
    fn envelope_contact_fields_are_always_filled() {
        let fields = full_field_set(DocumentKind::Invoice, BTreeMap::new(), &envelope());
        assert_eq!(fields["contact_email_sender"], json!("billing@acme.com"));
        assert_eq!(fields["contact_email_recipient"], json!("ap@example.com"));
    }
}
