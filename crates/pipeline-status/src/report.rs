//! Per-phase counts and running-instance tallies read directly from the
//! Shared Work Store.

use anyhow::Result;
use pipeline_phases::InstanceRecord;
use pipeline_store::WorkStore;
use pipeline_types::Phase;
use serde::{Deserialize, Serialize};

const ALL_PHASES: [Phase; 5] = [Phase::Phase1, Phase::Phase2, Phase::Phase3, Phase::Phase4, Phase::Phase5];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseStatus {
    pub phase: Phase,
    pub artifacts_written: u64,
    pub failed: u64,
    pub deferred: u64,
    pub running_instances: u32,
    pub marker_done: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub schema_version: String,
    /// RFC 3339 timestamp; `None` in tests that construct a report without a
    /// clock source to keep output deterministic.
    pub emitted_at: String,
    pub work_store_root: String,
    pub phases: Vec<PhaseStatus>,
}

impl StatusReport {
    /// JCS-canonical JSON rendering, matching every other on-disk or
    /// stdout JSON surface in this pipeline.
    pub fn to_canonical_json(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json_canonicalizer::to_string(&value)?)
    }
}

fn phase_status(store: &WorkStore, phase: Phase) -> Result<PhaseStatus> {
    let artifacts_written = store.list_artifacts(phase)?.len() as u64;
    let failed = store.read_failure_stream(phase)?.len() as u64;
    let deferred = read_deferred_count(store, phase)?;
    let running_instances = count_running_instances(store, phase)?;
    let marker_done = store.marker_exists(phase);

    Ok(PhaseStatus {
        phase,
        artifacts_written,
        failed,
        deferred,
        running_instances,
        marker_done,
    })
}

fn read_deferred_count(store: &WorkStore, phase: Phase) -> Result<u64> {
    let path = store.layout().deferred_stream_path(phase);
    if !path.exists() {
        return Ok(0);
    }
    let content = std::fs::read_to_string(path.as_std_path())?;
    Ok(content.lines().filter(|line| !line.trim().is_empty()).count() as u64)
}

/// Counts PID files under `pids/phase{N}/` whose process is still alive.
/// A stale PID file (the instance crashed without `stop` cleaning it up)
/// does not count as running.
fn count_running_instances(store: &WorkStore, phase: Phase) -> Result<u32> {
    let dir = store.layout().pids_dir(phase);
    if !dir.exists() {
        return Ok(0);
    }

    let mut running = 0;
    for entry in std::fs::read_dir(dir.as_std_path())? {
        let entry = entry?;
        if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let content = std::fs::read_to_string(entry.path())?;
        let record: InstanceRecord = serde_json::from_str(&content)?;
        if process_is_alive(record.pid) {
            running += 1;
        }
    }
    Ok(running)
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), None).is_ok()
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    false
}

/// Generates a full status report across all five phases.
pub fn generate_status(store: &WorkStore) -> Result<StatusReport> {
    let mut phases = Vec::with_capacity(ALL_PHASES.len());
    for phase in ALL_PHASES {
        phases.push(phase_status(store, phase)?);
    }

    Ok(StatusReport {
        schema_version: "1".to_string(),
        emitted_at: chrono::Utc::now().to_rfc3339(),
        work_store_root: store.layout().root().to_string(),
        phases,
    })
}
