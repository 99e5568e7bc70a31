//! The `docpipeline` command-line surface: config discovery, logging init,
//! and dispatch to one of the subcommands in [`args::Command`].

mod args;
mod doctor;
mod ingest;
mod launch;
mod logging;
mod merge;
mod monitor;
mod run_worker;
mod status;
mod stop;

use std::process::ExitCode;

use clap::Parser;
use pipeline_config::Config;

use args::{Cli, Command};

/// Parses arguments, discovers configuration, initializes logging, and runs
/// the selected subcommand. This is the only entry point `main` calls.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let discovered = match Config::discover(&cli.config_args) {
        Ok(discovered) => discovered,
        Err(e) => {
            eprintln!("configuration error: {e}");
            return pipeline_utils::ExitCode::ConfigError.into();
        }
    };

    logging::init(&discovered.config);

    if let Err(e) = pipeline_config::validate(&discovered.config) {
        tracing::error!(error = %e, "configuration failed validation");
        return pipeline_utils::ExitCode::ConfigError.into();
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return pipeline_utils::ExitCode::Aborted.into();
        }
    };

    let config_path = cli.config_args.config_path.clone();
    let exit_code = runtime.block_on(dispatch(cli.command, discovered, config_path));
    exit_code.into()
}

async fn dispatch(
    command: Command,
    discovered: pipeline_config::DiscoveredConfig,
    config_path: Option<camino::Utf8PathBuf>,
) -> pipeline_utils::ExitCode {
    let config = &discovered.config;
    match command {
        Command::Ingest(args) => ingest::run(config, &args),
        Command::Launch(args) => launch::run(config, &args, config_path.as_ref()).await,
        Command::Status(args) => status::run(&discovered, &args),
        Command::Stop(args) => stop::run(config, &args).await,
        Command::Monitor(args) => monitor::run(config, &args).await,
        Command::Merge(args) => merge::run(config, &args).await,
        Command::Doctor(args) => doctor::run(config, &args).await,
        Command::RunWorker(args) => run_worker::run(config, &args).await,
    }
}
