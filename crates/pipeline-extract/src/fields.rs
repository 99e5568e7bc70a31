//! Field Extractor: pure function, raw text + document kind → the 31 named
//! fields. The specific regex/keyword tables are explicitly
//! out of scope; what follows is a plausible baseline rather
//! than a claimed-exhaustive one, and is meant to be swappable without
//! touching callers.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use pipeline_types::{DocumentKind, Envelope, FIELD_NAMES};
use regex::Regex;
use serde_json::Value;

static DOCUMENT_NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:faktura|invoice|doklad|receipt)\s*(?:č\.?|no\.?|#|číslo)?\s*[:]?\s*([A-Za-z0-9][A-Za-z0-9/\-]{2,})")
        .expect("static regex is valid")
});

static TAX_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:dič|vat|ič|ico)\s*[:]?\s*([A-Za-z0-9]{6,})").expect("static regex is valid"));

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,3}(?:[ .]\d{3})*(?:,\d{2})?|\d+(?:\.\d{2})?)\s*(Kč|CZK|EUR|USD|\$|€)")
        .expect("static regex is valid")
});

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").expect("static regex is valid"));

static EU_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})\.\s?(\d{1,2})\.\s?(\d{4})\b").expect("static regex is valid"));

static VARIABLE_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)variabiln[ií]\s*symbol\s*[:]?\s*(\d+)").expect("static regex is valid"));

static CONSTANT_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)konstantn[ií]\s*symbol\s*[:]?\s*(\d+)").expect("static regex is valid"));

/// `extract(raw_text, kind) -> 31 named fields`. Takes the
/// envelope too since several fields (sender/recipient contact info, topic)
/// come straight from it rather than from OCR'd text; the function remains
/// pure and stateless, no I/O, no global state.
#[must_use]
pub fn extract_fields(raw_text: &str, kind: DocumentKind, envelope: &Envelope) -> BTreeMap<String, Value> {
    let mut fields: BTreeMap<String, Value> = FIELD_NAMES.iter().map(|&name| (name.to_string(), Value::Null)).collect();

    fields.insert("doc_kind".into(), Value::String(kind.to_string()));
    fields.insert("contact_email_sender".into(), Value::String(envelope.sender.clone()));
    if let Some(recipient) = envelope.recipients.first() {
        fields.insert("contact_email_recipient".into(), Value::String(recipient.clone()));
    }
    fields.insert("topic".into(), Value::String(envelope.subject.clone()));

    if let Some(caps) = DOCUMENT_NUMBER_RE.captures(raw_text) {
        fields.insert("document_number".into(), Value::String(caps[1].to_string()));
    }
    if let Some(caps) = TAX_NUMBER_RE.captures(raw_text) {
        fields.insert("counterparty_tax_number".into(), Value::String(caps[1].to_string()));
    }
    if let Some(caps) = AMOUNT_RE.captures(raw_text) {
        fields.insert("amount".into(), Value::String(caps[1].replace(' ', "")));
        fields.insert("currency".into(), Value::String(normalize_currency(&caps[2])));
    }
    if let Some(date) = extract_date(raw_text) {
        fields.insert("document_date".into(), Value::String(date));
    }
    if let Some(caps) = VARIABLE_SYMBOL_RE.captures(raw_text) {
        fields.insert("variable_symbol".into(), Value::String(caps[1].to_string()));
    }
    if let Some(caps) = CONSTANT_SYMBOL_RE.captures(raw_text) {
        fields.insert("constant_symbol".into(), Value::String(caps[1].to_string()));
    }

    fields.insert("ai_summary".into(), Value::String(first_sentence(raw_text)));
    fields.insert("line_items_json".into(), Value::Array(Vec::new()));

    fields
}

fn normalize_currency(raw: &str) -> String {
    match raw {
        "Kč" => "CZK".to_string(),
        "$" => "USD".to_string(),
        "€" => "EUR".to_string(),
        other => other.to_string(),
    }
}

fn extract_date(text: &str) -> Option<String> {
    if let Some(m) = ISO_DATE_RE.find(text) {
        return Some(m.as_str().to_string());
    }
    if let Some(caps) = EU_DATE_RE.captures(text) {
        return Some(format!("{}-{:0>2}-{:0>2}", &caps[3], &caps[2], &caps[1]));
    }
    None
}

/// Crude placeholder summary: the first sentence of the raw text, bounded so
/// it can never itself exceed a reasonable field size. Phase 2/3 escalation
/// replaces this with the model's own summary when the item escalates.
fn first_sentence(text: &str) -> String {
    let trimmed = text.trim();
    let end = trimmed.find(['.', '\n']).unwrap_or(trimmed.len());
    trimmed[..end.min(trimmed.len())].chars().take(240).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> Envelope {
        Envelope {
            sender: "billing@acme.com".to_string(),
            recipients: vec!["ap@example.com".to_string()],
            subject: "Your invoice".to_string(),
            date: "2024-01-05T00:00:00Z".to_string(),
            body_text: String::new(),
        }
    }

    #[test]
    fn extracts_invoice_number_and_tax_id() {
        let text = "Faktura č. 2024-001\nDIC: CZ12345678\nCelkem 1 500,00 Kč";
        let fields = extract_fields(text, DocumentKind::Invoice, &envelope());
        assert_eq!(fields["document_number"], Value::String("2024-001".to_string()));
        assert_eq!(fields["counterparty_tax_number"], Value::String("CZ12345678".to_string()));
        assert_eq!(fields["currency"], Value::String("CZK".to_string()));
    }

    #[test]
    fn all_31_field_names_are_present_even_when_unmatched() {
        let fields = extract_fields("no useful structure here", DocumentKind::Unknown, &envelope());
        assert_eq!(fields.len(), 31);
        for name in FIELD_NAMES {
            assert!(fields.contains_key(name));
        }
    }

    #[test]
    fn eu_date_is_normalized_to_iso() {
        let fields = extract_fields("Datum splatnosti: 15. 3. 2024", DocumentKind::Invoice, &envelope());
        assert_eq!(fields["document_date"], Value::String("2024-03-15".to_string()));
    }
}
