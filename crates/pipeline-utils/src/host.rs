//! Host identification for lock ownership and log correlation.

/// The identifier written into a [`pipeline_types::Lock::owner_host`] and
/// attached to every tracing span. Falls back to a fixed placeholder if the
/// OS can't report a hostname (e.g. a minimal container).
#[must_use]
pub fn current_host_tag() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-host".to_string())
}
