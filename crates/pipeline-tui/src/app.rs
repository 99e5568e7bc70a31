//! Application state for the review screen: which item is claimed, what the
//! reviewer has picked so far, and the free-text fields they've typed in.
//! Holds no terminal or I/O concerns, [`crate::run`] owns those.

use std::collections::BTreeMap;

use pipeline_phases::{ManualReviewQueue, ReviewClaim, ReviewDecision};
use pipeline_types::DocumentKind;
use serde_json::Value;
use strum::IntoEnumIterator;

/// Which free-text field the kind/category editor currently targets.
pub const EDITABLE_FIELDS: [&str; 2] = ["category", "ai_summary"];

pub enum Screen {
    /// Nothing claimed; listing what's pending.
    Browsing,
    /// Holding a claim, picking a document kind from the closed tag set.
    PickingKind { kind_index: usize },
    /// Holding a claim with a kind chosen, editing the free-text fields
    /// before submitting.
    EditingFields { doc_kind: DocumentKind, field_index: usize, input: String },
    /// Queue is empty; nothing left to review.
    Empty,
}

pub struct App {
    queue: ManualReviewQueue,
    pub screen: Screen,
    pub claim: Option<ReviewClaim>,
    pub fields: BTreeMap<String, Value>,
    pub status: String,
    pub should_quit: bool,
}

impl App {
    #[must_use]
    pub fn new(queue: ManualReviewQueue) -> Self {
        Self {
            queue,
            screen: Screen::Browsing,
            claim: None,
            fields: BTreeMap::new(),
            status: "claim the next item with Enter".to_string(),
            should_quit: false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.queue.pending_items().map(|items| items.len()).unwrap_or_default()
    }

    pub fn pending_preview(&self) -> Vec<(String, String)> {
        self.queue
            .pending_items()
            .unwrap_or_default()
            .into_iter()
            .map(|item| (item.envelope.sender.clone(), item.envelope.subject.clone()))
            .collect()
    }

    /// Claims the next pending item, or reports an empty queue.
    pub fn claim_next(&mut self) {
        match self.queue.claim_next() {
            Ok(Some(claim)) => {
                self.status = format!("reviewing {}", claim.item.item_id);
                self.claim = Some(claim);
                self.fields = BTreeMap::new();
                self.screen = Screen::PickingKind { kind_index: 0 };
            }
            Ok(None) => {
                self.screen = Screen::Empty;
                self.status = "queue is empty".to_string();
            }
            Err(e) => {
                self.status = format!("failed to claim: {e}");
            }
        }
    }

    pub fn cycle_kind(&mut self, delta: i32) {
        if let Screen::PickingKind { kind_index } = &mut self.screen {
            let count = DocumentKind::iter().count() as i32;
            let next = (*kind_index as i32 + delta).rem_euclid(count);
            *kind_index = next as usize;
        }
    }

    pub fn confirm_kind(&mut self) {
        if let Screen::PickingKind { kind_index } = &self.screen {
            let doc_kind = DocumentKind::iter().nth(*kind_index).unwrap_or(DocumentKind::Unknown);
            self.screen = Screen::EditingFields { doc_kind, field_index: 0, input: String::new() };
        }
    }

    pub fn cycle_field(&mut self, delta: i32) {
        self.commit_current_field();
        if let Screen::EditingFields { field_index, input, .. } = &mut self.screen {
            let count = EDITABLE_FIELDS.len() as i32;
            let next = (*field_index as i32 + delta).rem_euclid(count);
            *field_index = next as usize;
            *input = String::new();
        }
    }

    pub fn type_char(&mut self, c: char) {
        if let Screen::EditingFields { input, .. } = &mut self.screen {
            input.push(c);
        }
    }

    pub fn backspace(&mut self) {
        if let Screen::EditingFields { input, .. } = &mut self.screen {
            input.pop();
        }
    }

    /// Commits the current field's text into the pending field map without
    /// submitting, so the reviewer can move to the next field first.
    pub fn commit_current_field(&mut self) {
        if let Screen::EditingFields { field_index, input, .. } = &self.screen {
            if !input.is_empty() {
                self.fields.insert(EDITABLE_FIELDS[*field_index].to_string(), Value::String(input.clone()));
            }
        }
    }

    pub fn submit_classified(&mut self) {
        self.commit_current_field();
        let Screen::EditingFields { doc_kind, .. } = &self.screen else { return };
        let doc_kind = *doc_kind;
        let Some(claim) = self.claim.take() else { return };

        let decision = ReviewDecision::Classified { doc_kind, fields: self.fields.clone(), confidence: 1.0 };
        match self.queue.submit(claim, decision) {
            Ok(()) => self.status = "submitted".to_string(),
            Err(e) => self.status = format!("submit failed: {e}"),
        }
        self.fields.clear();
        self.screen = Screen::Browsing;
    }

    pub fn defer_current(&mut self) {
        let Some(claim) = self.claim.take() else { return };
        match self.queue.submit(claim, ReviewDecision::Deferred) {
            Ok(()) => self.status = "deferred".to_string(),
            Err(e) => self.status = format!("defer failed: {e}"),
        }
        self.screen = Screen::Browsing;
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }
}
