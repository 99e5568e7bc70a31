use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, VariantNames};

/// Closed tag set describing what a document is.
///
/// Adding a variant here requires updating the per-kind extractor table in
/// `pipeline-extract` and the tag-vocabulary mapping in `pipeline-delivery`;
/// both match exhaustively on this enum.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    VariantNames,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Invoice,
    Receipt,
    TaxDocument,
    BankStatement,
    Order,
    Contract,
    ParkingTicket,
    CarService,
    CarWash,
    GlassWork,
    Proforma,
    DeliveryNote,
    PaymentDocument,
    SystemNotification,
    Marketing,
    Correspondence,
    ItNotes,
    ProjectNotes,
    /// No rule or model produced a confident kind. Bypasses structured
    /// XML emission; never a terminal state on its own (triggers escalation).
    Unknown,
}

impl DocumentKind {
    /// Accounting kinds get a structured XML payload from the emitter.
    #[must_use]
    pub const fn emits_structured_document(self) -> bool {
        matches!(
            self,
            Self::Invoice | Self::Receipt | Self::TaxDocument | Self::BankStatement
        )
    }
}
