//! `docpipeline status [--json]`: per-phase artifact/failure/deferred counts
//! and running-instance tallies, plus the effective configuration with
//! per-field source attribution.

use pipeline_config::DiscoveredConfig;
use pipeline_status::{build_effective_config, generate_status};
use pipeline_store::WorkStore;
use pipeline_utils::ExitCode;

use crate::args::StatusArgs;

pub fn run(discovered: &DiscoveredConfig, args: &StatusArgs) -> ExitCode {
    let store = WorkStore::new(
        discovered.config.work_store_root.clone(),
        pipeline_utils::host::current_host_tag(),
    );

    let report = match generate_status(&store) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "failed to generate status report");
            return ExitCode::Aborted;
        }
    };

    if args.json {
        let effective_config = build_effective_config(&discovered.config, &discovered.sources);
        let combined = serde_json::json!({
            "status": serde_json::to_value(&report).unwrap_or_default(),
            "config": effective_config,
        });
        println!("{combined}");
    } else {
        print_human(&report);
    }

    ExitCode::Success
}

fn print_human(report: &pipeline_status::StatusReport) {
    println!("work store: {}", report.work_store_root);
    for phase in &report.phases {
        println!(
            "  phase {}: {} artifacts, {} failed, {} deferred, {} running, marker {}",
            phase.phase,
            phase.artifacts_written,
            phase.failed,
            phase.deferred,
            phase.running_instances,
            if phase.marker_done { "done" } else { "pending" }
        );
    }
}
