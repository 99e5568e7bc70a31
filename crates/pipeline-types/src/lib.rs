//! Core data model for the extraction pipeline: work items, artifacts,
//! failure records, locks, document kinds, and correspondents.
//!
//! These types are deliberately free of I/O; reading and writing them to
//! the shared work store lives in `pipeline-store`.

mod artifact;
mod correspondent;
mod kind;
mod lock;
mod work_item;

pub use artifact::{Artifact, EscalationVerdict, FailureRecord};
pub use correspondent::Correspondent;
pub use kind::DocumentKind;
pub use lock::Lock;
pub use work_item::{Attachment, Envelope, WorkItem};

/// One of the five processing phases an item moves through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[strum(serialize = "1")]
    Phase1,
    #[strum(serialize = "2")]
    Phase2,
    #[strum(serialize = "3")]
    Phase3,
    #[strum(serialize = "4")]
    Phase4,
    #[strum(serialize = "5")]
    Phase5,
}

impl Phase {
    /// The phase whose failure stream feeds this phase, if any.
    #[must_use]
    pub const fn predecessor(self) -> Option<Self> {
        match self {
            Self::Phase1 => None,
            Self::Phase2 => Some(Self::Phase1),
            Self::Phase3 => Some(Self::Phase2),
            Self::Phase4 => Some(Self::Phase3),
            Self::Phase5 => None,
        }
    }

    /// Numeric index as used in filesystem paths (`results/phase{N}`).
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::Phase1 => 1,
            Self::Phase2 => 2,
            Self::Phase3 => 3,
            Self::Phase4 => 4,
            Self::Phase5 => 5,
        }
    }
}

/// The 31 named fields every Artifact carries, by contract name.
///
/// Kept as a plain ordered list rather than a struct so the Field Extractor
/// and Emitter can iterate it without knowing every field's type up front;
/// values are stored as [`serde_json::Value`] in [`Artifact::fields`].
pub const FIELD_NAMES: [&str; 31] = [
    "doc_kind",
    "counterparty_name",
    "counterparty_tax_number",
    "counterparty_address",
    "counterparty_email",
    "own_party_name",
    "own_party_tax_number",
    "amount",
    "currency",
    "document_date",
    "document_number",
    "payment_state",
    "due_date",
    "category",
    "contact_name_sender",
    "contact_email_sender",
    "contact_phone_sender",
    "contact_name_recipient",
    "contact_email_recipient",
    "contact_phone_recipient",
    "topic",
    "ai_summary",
    "ai_keywords",
    "ai_description",
    "service_type",
    "service_name",
    "line_items_text",
    "line_items_json",
    "period",
    "variable_symbol",
    "constant_symbol",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_predecessor_chain() {
        assert_eq!(Phase::Phase2.predecessor(), Some(Phase::Phase1));
        assert_eq!(Phase::Phase3.predecessor(), Some(Phase::Phase2));
        assert_eq!(Phase::Phase4.predecessor(), Some(Phase::Phase3));
        assert_eq!(Phase::Phase1.predecessor(), None);
        assert_eq!(Phase::Phase5.predecessor(), None);
    }

    #[test]
    fn field_names_has_31_entries() {
        assert_eq!(FIELD_NAMES.len(), 31);
    }
}
