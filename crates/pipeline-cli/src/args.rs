//! Clap argument definitions for `docpipeline`: the five documented
//! subcommands (`launch`, `status`, `stop`, `monitor`, plus `merge`,
//! `doctor`, and `ingest`), and the hidden `run-worker` every launched
//! instance re-invokes itself with.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use pipeline_config::CliArgs;
use pipeline_types::Phase;

#[derive(Parser)]
#[command(name = "docpipeline")]
#[command(about = "Distributed email/document extraction and delivery pipeline")]
#[command(long_about = r#"
docpipeline partitions an input tree of email items across a small fleet of
hosts and processes each item through up to five escalating phases: rule-based
classification, hierarchical local-model inference, an external large model,
manual review, and delivery to a downstream document-management service.

EXAMPLES:
  # Ingest a raw input tree into the shared work store
  docpipeline ingest --input-root /mnt/archive/2024

  # Launch this host's share of phase 1 instances
  docpipeline launch 1 workstation-a

  # Check progress across every phase
  docpipeline status --json

  # Stop every instance this host is running
  docpipeline stop workstation-a

  # Watch resource pressure and the throttle signal
  docpipeline monitor

  # Preview correspondent merges without applying them
  docpipeline merge

  # Check every external collaborator is reachable
  docpipeline doctor

CONFIGURATION:
  Configuration is layered CLI flags > environment variables > config file >
  built-in defaults. Config file discovery walks upward from the current
  directory for docpipeline.toml, or honors DOCPIPELINE_HOME.
"#)]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub config_args: CliArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Scan a raw input tree and populate the work store's input directory.
    Ingest(IngestArgs),

    /// Launch this host's configured instances for a phase.
    Launch(LaunchArgs),

    /// Print per-phase artifact/failure/deferred counts and running instances.
    Status(StatusArgs),

    /// Terminate running instances (all of them, or just one machine tag's).
    Stop(StopArgs),

    /// Print the current resource sample, throttle state, and recommended instance count.
    Monitor(MonitorArgs),

    /// Preview or apply correspondent merges.
    Merge(MergeArgs),

    /// Check reachability of every configured external collaborator.
    Doctor(DoctorArgs),

    /// Runs one worker instance's claim/process/persist loop. Spawned by
    /// `launch`; not intended to be invoked directly by an operator.
    #[command(hide = true)]
    RunWorker(RunWorkerArgs),
}

#[derive(Args)]
pub struct IngestArgs {
    /// Root of the raw input tree to scan.
    #[arg(long)]
    pub input_root: Utf8PathBuf,
}

#[derive(Args)]
pub struct LaunchArgs {
    /// Which phase to launch (1-5).
    pub phase: Phase,
    /// This host's configured machine tag.
    pub machine_tag: String,
}

#[derive(Args, Default)]
pub struct StatusArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct StopArgs {
    /// Limit to a single machine tag's instances; omit to stop every instance.
    pub machine_tag: Option<String>,
}

#[derive(Args, Default)]
pub struct MonitorArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Default)]
pub struct MergeArgs {
    /// Apply the planned merges instead of only reporting them.
    #[arg(long)]
    pub apply: bool,
}

#[derive(Args, Default)]
pub struct DoctorArgs {
    /// Treat a warning the same as a failure for exit-code purposes.
    #[arg(long)]
    pub strict: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct RunWorkerArgs {
    #[arg(long)]
    pub phase: Phase,
    #[arg(long)]
    pub start: u64,
    #[arg(long)]
    pub end: u64,
    #[arg(long)]
    pub machine_tag: String,
    #[arg(long)]
    pub instance_index: u32,
}
