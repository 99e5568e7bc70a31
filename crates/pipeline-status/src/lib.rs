//! Structured status reporting for the `docpipeline status` command: per-phase
//! artifact/failure/deferred counts, running instance counts from the
//! launcher's PID files, marker state, and the effective configuration with
//! source attribution, built here from `pipeline-store`'s raw filesystem
//! facts instead of a receipt/orchestrator layer.

mod config_report;
mod report;

pub use config_report::{build_effective_config, ConfigSource, ConfigValue};
pub use report::{generate_status, PhaseStatus, StatusReport};
