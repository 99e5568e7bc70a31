//! `docpipeline stop [machine-tag]`: SIGTERM every matching running
//! instance, SIGKILL any still alive after a grace window.

use std::time::Duration;

use pipeline_phases::stop_instances;
use pipeline_store::WorkStore;
use pipeline_utils::ExitCode;

use crate::args::StopArgs;

const STOP_GRACE: Duration = Duration::from_secs(10);

pub async fn run(config: &pipeline_config::Config, args: &StopArgs) -> ExitCode {
    let store = WorkStore::new(config.work_store_root.clone(), pipeline_utils::host::current_host_tag());

    match stop_instances(&store, args.machine_tag.as_deref(), STOP_GRACE).await {
        Ok(report) => {
            tracing::info!(
                terminated_gracefully = report.terminated_gracefully,
                force_killed = report.force_killed,
                not_running = report.not_running,
                "stop complete"
            );
            println!(
                "stopped {} gracefully, force-killed {}, {} were not running",
                report.terminated_gracefully, report.force_killed, report.not_running
            );
            ExitCode::Success
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to stop instances");
            ExitCode::Aborted
        }
    }
}
