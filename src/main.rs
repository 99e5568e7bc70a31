use std::process::ExitCode;

fn main() -> ExitCode {
    pipeline_cli::run()
}
