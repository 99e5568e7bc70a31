use camino::Utf8PathBuf;
use clap::Args;

/// Config-affecting flags shared by every subcommand. Values set here win
/// over both the environment and the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct CliArgs {
    /// Explicit path to a `docpipeline.toml`; skips upward discovery.
    #[arg(long, global = true)]
    pub config_path: Option<Utf8PathBuf>,

    /// Overrides `work_store_root`.
    #[arg(long, global = true)]
    pub work_store_root: Option<Utf8PathBuf>,

    #[arg(long, global = true, value_enum)]
    pub log_format: Option<CliLogFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogFormat {
    Human,
    Json,
}
