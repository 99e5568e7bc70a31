//! Layered configuration: CLI flags > environment variables > config file >
//! built-in defaults, with per-field source attribution for `status`/`monitor`
//! output.

mod cli_args;
mod discovery;
mod model;

pub use cli_args::CliArgs;
pub use discovery::{validate, ConfigError, DiscoveredConfig};
pub use model::{
    Config, DeliveryConfig, ExternalModelConfig, LocalInferenceConfig, LogFormat, OcrConfig,
    ResourceThresholds, RetryPolicy,
};

/// Where a resolved configuration value came from; surfaced by `status`/`monitor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    ConfigFile(camino::Utf8PathBuf),
    Environment,
    Cli,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::ConfigFile(path) => write!(f, "config file ({path})"),
            Self::Environment => write!(f, "environment"),
            Self::Cli => write!(f, "cli"),
        }
    }
}
