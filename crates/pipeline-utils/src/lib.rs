//! Low-level primitives shared across every pipeline crate: atomic file
//! writes, the error taxonomy, process exit codes, and content hashing.

pub mod atomic_write;
pub mod error;
pub mod exit_code;
pub mod hash;
pub mod host;

pub use error::{ConfigError, FailureReason, LockError, PipelineError};
pub use exit_code::ExitCode;
