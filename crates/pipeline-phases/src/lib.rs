//! The per-phase worker processes: the launcher that spawns and tracks
//! OS-process instances, the claim/process/persist loop every instance
//! runs, and each phase's business logic.
//!
//! Phases 1-3 implement [`ItemProcessor`] and run under [`run_worker_loop`].
//! Phase 4 (manual review) and Phase 5 (delivery) don't fit that shape:
//! Phase 4 has no automated decision to make, and Phase 5 is a single
//! bounded fan-out over all ready artifacts rather than a per-item claim
//! loop, so they're exposed as their own APIs for the future terminal UI
//! and CLI to drive directly.

pub mod launcher;
mod model_fields;
pub mod phase1;
pub mod phase2;
pub mod phase3;
pub mod phase4;
mod worker;
mod xml;

pub use launcher::{
    plan_launch, spawn_instances, stop_instances, subdivide_range, InstanceRange, InstanceRecord, LaunchError,
    LaunchPlan, StopReport,
};
pub use phase1::Phase1Processor;
pub use phase2::Phase2Processor;
pub use phase3::Phase3Processor;
pub use phase4::{ManualReviewQueue, ReviewClaim, ReviewDecision};
pub use worker::{run_worker_loop, ItemOutcome, ItemProcessor, ShutdownSignal, WorkerStats};
