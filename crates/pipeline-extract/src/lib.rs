//! Phase 1's stateless analyzers: the precedence-ordered kind classifier,
//! the 31-field extractor, and the structured-document XML emitter. None of
//! these touch the filesystem or the network; that's
//! `pipeline-store`/`pipeline-ocr`'s job.

pub mod classify;
pub mod emitter;
pub mod fields;

pub use classify::{ClassifyError, ClassifyOutcome, KindRule, RuleTable};
pub use emitter::{emit_xml, EmitError};
pub use fields::extract_fields;
