//! Correspondent normalization and the offline merger.

pub mod mapping;
pub mod merger;
pub mod normalize;

pub use mapping::KnownMappings;
pub use merger::{plan_merges, MergePlan};
pub use normalize::normalize;
