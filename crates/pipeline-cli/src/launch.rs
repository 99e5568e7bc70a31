//! `docpipeline launch <phase> <machine-tag>`: resolves this machine's
//! configured range, subdivides it across local instances, and spawns one
//! `run-worker` process per instance.

use std::env;

use camino::Utf8PathBuf;
use pipeline_phases::{plan_launch, spawn_instances, LaunchError};
use pipeline_store::WorkStore;
use pipeline_utils::ExitCode;

use crate::args::LaunchArgs;

pub async fn run(config: &pipeline_config::Config, args: &LaunchArgs, config_path: Option<&Utf8PathBuf>) -> ExitCode {
    let plan = match plan_launch(config, args.phase, &args.machine_tag) {
        Ok(plan) => plan,
        Err(e) => {
            tracing::error!(error = %e, "failed to plan launch");
            return match e {
                LaunchError::NoIndexRange(_) | LaunchError::NoInstanceCount(_) => ExitCode::ConfigError,
                LaunchError::SpawnFailed(..) => ExitCode::Aborted,
            };
        }
    };

    let store = WorkStore::new(config.work_store_root.clone(), args.machine_tag.clone());

    let exe = match env::current_exe() {
        Ok(path) => path,
        Err(e) => {
            tracing::error!(error = %e, "failed to resolve current executable path");
            return ExitCode::Aborted;
        }
    };

    match spawn_instances(&store, &exe, config_path, &plan).await {
        Ok(spawned) => {
            tracing::info!(
                phase = %plan.phase,
                machine_tag = %plan.machine_tag,
                instances = spawned.len(),
                "launched instances"
            );
            ExitCode::Success
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to spawn one or more instances");
            ExitCode::Aborted
        }
    }
}
