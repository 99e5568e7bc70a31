//! `docpipeline doctor [--strict]`: preflight health checks against every
//! configured collaborator and the work store itself.

use pipeline_doctor::DoctorCommand;
use pipeline_utils::ExitCode;

use crate::args::DoctorArgs;

pub async fn run(config: &pipeline_config::Config, args: &DoctorArgs) -> ExitCode {
    let doctor = DoctorCommand::new(config.clone());
    let output = doctor.run_with_options_strict(args.strict).await;

    if args.json {
        match output.to_canonical_json() {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize doctor output");
                return ExitCode::Aborted;
            }
        }
    } else {
        for check in &output.checks {
            println!("[{:?}] {}: {}", check.status, check.name, check.details);
        }
    }

    if output.ok {
        ExitCode::Success
    } else {
        ExitCode::PartialCompletion
    }
}
