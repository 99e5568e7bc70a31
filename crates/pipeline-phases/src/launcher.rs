//! Partitions a machine's configured index range across local OS-process
//! instances, spawns one `docpipeline` process per instance (argv-only,
//! never a shell string), and tracks their PIDs so a later `stop`
//! invocation can terminate them.
//!
//! One instance is one OS process; the bounded `tokio` task pools inside a
//! single instance are a different, smaller-grained concern handled by each
//! phase's worker loop.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use pipeline_config::Config;
use pipeline_store::WorkStore;
use pipeline_types::Phase;
use pipeline_utils::atomic_write::write_string_atomic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("no index range configured for machine tag {0}")]
    NoIndexRange(String),

    #[error("no instance count configured for phase {0}")]
    NoInstanceCount(Phase),

    #[error("failed to spawn instance {0}: {1}")]
    SpawnFailed(u32, String),
}

/// The half-open sub-range one instance owns, plus its place in the
/// machine's instance list (used to name its PID file).
#[derive(Debug, Clone, Copy)]
pub struct InstanceRange {
    pub index: u32,
    pub start: u64,
    pub end: u64,
}

/// Subdivides `[start, end)` into `instance_count` contiguous, disjoint,
/// as-equal-as-possible half-open ranges covering the whole span. The first
/// `remainder` ranges get one extra item so every index is covered exactly
/// once even when the span doesn't divide evenly.
#[must_use]
pub fn subdivide_range(range: (u64, u64), instance_count: u32) -> Vec<InstanceRange> {
    let (start, end) = range;
    let instance_count = instance_count.max(1) as u64;
    let total = end.saturating_sub(start);
    let base = total / instance_count;
    let remainder = total % instance_count;

    let mut ranges = Vec::with_capacity(instance_count as usize);
    let mut cursor = start;
    for index in 0..instance_count {
        let size = base + u64::from(index < remainder as u32);
        let instance_start = cursor;
        let instance_end = cursor + size;
        ranges.push(InstanceRange {
            index: index as u32,
            start: instance_start,
            end: instance_end,
        });
        cursor = instance_end;
    }
    ranges
}

/// The fully resolved plan for `launch <phase> <machine-tag>`: which global
/// range this machine owns and how it subdivides across local instances.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub phase: Phase,
    pub machine_tag: String,
    pub instances: Vec<InstanceRange>,
}

/// Resolves a launch plan from configuration. Refuses to start rather than
/// silently process the whole input when a machine tag has no configured
/// range.
pub fn plan_launch(config: &Config, phase: Phase, machine_tag: &str) -> Result<LaunchPlan, LaunchError> {
    let range = config
        .index_range_for(machine_tag)
        .ok_or_else(|| LaunchError::NoIndexRange(machine_tag.to_string()))?;
    let instance_count = *config
        .instances_per_phase
        .get(&phase.index())
        .ok_or(LaunchError::NoInstanceCount(phase))?;

    Ok(LaunchPlan {
        phase,
        machine_tag: machine_tag.to_string(),
        instances: subdivide_range(range, instance_count),
    })
}

/// One running instance, as recorded in its PID file under
/// `pids/phase{N}/{machine_tag}-{index}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub machine_tag: String,
    pub instance_index: u32,
    pub pid: u32,
    pub start: u64,
    pub end: u64,
}

/// Spawns one OS process per [`InstanceRange`] in `plan`, re-invoking the
/// current `docpipeline` binary with the hidden `run-worker` subcommand.
/// Arguments are passed as discrete argv elements only, never through a
/// shell.
pub async fn spawn_instances(
    store: &WorkStore,
    exe: &std::path::Path,
    config_path: Option<&Utf8PathBuf>,
    plan: &LaunchPlan,
) -> Result<Vec<InstanceRecord>, LaunchError> {
    let mut spawned = Vec::with_capacity(plan.instances.len());

    for instance in &plan.instances {
        let mut args: Vec<OsString> = vec![
            "run-worker".into(),
            "--phase".into(),
            plan.phase.index().to_string().into(),
            "--start".into(),
            instance.start.to_string().into(),
            "--end".into(),
            instance.end.to_string().into(),
            "--machine-tag".into(),
            plan.machine_tag.clone().into(),
            "--instance-index".into(),
            instance.index.to_string().into(),
        ];
        if let Some(path) = config_path {
            args.push("--config-path".into());
            args.push(path.as_str().into());
        }

        let mut child = tokio::process::Command::new(exe)
            .args(&args)
            .stdin(std::process::Stdio::null())
            .spawn()
            .map_err(|e| LaunchError::SpawnFailed(instance.index, e.to_string()))?;

        let pid = child.id().ok_or_else(|| LaunchError::SpawnFailed(instance.index, "process exited immediately".to_string()))?;
        // The launcher tracks the instance via its PID file in the work
        // store, not via a held `Child` handle, so `launch` can exit while
        // instances keep running; this background task only reaps the
        // eventual exit status so the OS doesn't accumulate zombies.
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        let record = InstanceRecord {
            machine_tag: plan.machine_tag.clone(),
            instance_index: instance.index,
            pid,
            start: instance.start,
            end: instance.end,
        };
        let pid_path = store.layout().pid_path(plan.phase, &plan.machine_tag, instance.index);
        let body = serde_json::to_string(&record).expect("InstanceRecord serializes infallibly");
        write_string_atomic(&pid_path, &body)
            .with_context(|| format!("failed to record pid file for instance {}", instance.index))
            .map_err(|e| LaunchError::SpawnFailed(instance.index, e.to_string()))?;

        spawned.push(record);
    }

    Ok(spawned)
}

/// Outcome of a `stop` invocation: how many instances were asked to
/// terminate gracefully vs. force-killed after the grace window elapsed.
#[derive(Debug, Default)]
pub struct StopReport {
    pub terminated_gracefully: u32,
    pub force_killed: u32,
    pub not_running: u32,
}

/// Terminates every instance recorded for `machine_tag` (or every machine,
/// if `None`) across all phases: SIGTERM first, SIGKILL after `grace` has
/// elapsed and the process is still alive.
pub async fn stop_instances(store: &WorkStore, machine_tag: Option<&str>, grace: Duration) -> Result<StopReport> {
    let mut report = StopReport::default();
    let mut pending_paths = Vec::new();

    for phase in [Phase::Phase1, Phase::Phase2, Phase::Phase3, Phase::Phase4, Phase::Phase5] {
        let dir = store.layout().pids_dir(phase);
        if !dir.exists() {
            continue;
        }
        for entry in std::fs::read_dir(dir.as_std_path())? {
            let entry = entry?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = std::fs::read_to_string(entry.path())?;
            let record: InstanceRecord = serde_json::from_str(&content)?;
            if let Some(tag) = machine_tag {
                if record.machine_tag != tag {
                    continue;
                }
            }

            let path: PathBuf = entry.path();
            if !signal_terminate(record.pid) {
                report.not_running += 1;
                let _ = std::fs::remove_file(&path);
                continue;
            }
            pending_paths.push((path, record.pid));
        }
    }

    if pending_paths.is_empty() {
        return Ok(report);
    }

    tokio::time::sleep(grace).await;

    for (path, pid) in pending_paths {
        if process_is_alive(pid) {
            signal_kill(pid);
            report.force_killed += 1;
        } else {
            report.terminated_gracefully += 1;
        }
        let _ = std::fs::remove_file(&path);
    }

    Ok(report)
}

#[cfg(unix)]
fn signal_terminate(pid: u32) -> bool {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
fn signal_terminate(_pid: u32) -> bool {
    // Graceful termination on non-unix targets is left to the platform's own
    // process-management tooling; `stop` degrades to a best-effort no-op.
    false
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

#[cfg(unix)]
fn signal_kill(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
}

#[cfg(not(unix))]
fn signal_kill(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subdivide_covers_the_whole_span_with_no_overlap() {
        let ranges = subdivide_range((0, 10), 3);
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].start, 0);
        assert_eq!(ranges.last().unwrap().end, 10);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn subdivide_distributes_remainder_to_earliest_instances() {
        let ranges = subdivide_range((0, 7), 3);
        let sizes: Vec<u64> = ranges.iter().map(|r| r.end - r.start).collect();
        assert_eq!(sizes, vec![3, 2, 2]);
    }

    #[test]
    fn subdivide_handles_more_instances_than_items() {
        let ranges = subdivide_range((0, 2), 5);
        assert_eq!(ranges.len(), 5);
        assert_eq!(ranges.iter().map(|r| r.end - r.start).sum::<u64>(), 2);
    }

    #[test]
    fn plan_launch_rejects_unconfigured_machine() {
        let config = Config::default();
        let result = plan_launch(&config, Phase::Phase1, "unknown-host");
        assert!(matches!(result, Err(LaunchError::NoIndexRange(_))));
    }

    #[test]
    fn plan_launch_succeeds_with_configured_range_and_instance_count() {
        let mut config = Config::default();
        config.machine_index_ranges.insert("host-a".to_string(), (0, 10));
        config.instances_per_phase.insert(1, 2);
        let plan = plan_launch(&config, Phase::Phase1, "host-a").unwrap();
        assert_eq!(plan.instances.len(), 2);
    }
}
