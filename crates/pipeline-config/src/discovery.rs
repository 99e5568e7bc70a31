use std::collections::HashMap;
use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

use crate::cli_args::CliArgs;
use crate::model::{Config, DeliveryConfig, ExternalModelConfig, LocalInferenceConfig, OcrConfig};
use crate::ConfigSource;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration file {path}: {reason}")]
    InvalidFile { path: Utf8PathBuf, reason: String },

    #[error("configuration file not found at {path}")]
    NotFound { path: Utf8PathBuf },

    #[error("missing required configuration: {0}")]
    MissingRequired(String),
}

/// Shape of `docpipeline.toml`. Every field is optional; whatever is present
/// overrides the built-in default for that section as a whole block. Finer
/// per-leaf merging is not needed because these sections are always
/// authored together in practice.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    work_store_root: Option<Utf8PathBuf>,
    instances_per_phase: Option<HashMap<u8, u32>>,
    machine_index_ranges: Option<HashMap<String, (u64, u64)>>,
    ocr: Option<OcrConfig>,
    local_inference: Option<LocalInferenceConfig>,
    external_model: Option<ExternalModelConfig>,
    delivery: Option<DeliveryConfig>,
    stale_lock_ttl_seconds: Option<u64>,
    resource_sample_interval_seconds: Option<u64>,
    correspondent_known_mappings_path: Option<Utf8PathBuf>,
    kind_rules_path: Option<Utf8PathBuf>,
    tag_vocabulary_path: Option<Utf8PathBuf>,
}

/// The resolved configuration plus where each top-level field came from, for
/// `status`/`monitor --json` output.
pub struct DiscoveredConfig {
    pub config: Config,
    pub sources: HashMap<&'static str, ConfigSource>,
}

impl Config {
    /// Discover and load configuration with precedence CLI > env > file > defaults.
    pub fn discover(cli_args: &CliArgs) -> Result<DiscoveredConfig, ConfigError> {
        let start_dir = env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
        Self::discover_from(&start_dir, cli_args)
    }

    /// Path-driven variant used by tests to avoid depending on process CWD.
    pub fn discover_from(
        start_dir: &Path,
        cli_args: &CliArgs,
    ) -> Result<DiscoveredConfig, ConfigError> {
        let mut config = Config::default();
        let mut sources: HashMap<&'static str, ConfigSource> = HashMap::new();
        for field in TRACKED_FIELDS {
            sources.insert(field, ConfigSource::Default);
        }

        let config_path = if let Some(explicit) = &cli_args.config_path {
            Some(explicit.clone())
        } else {
            discover_config_file_from(start_dir)
        };

        if let Some(path) = &config_path {
            let file_config = load_config_file(path)?;
            let source = ConfigSource::ConfigFile(path.clone());
            apply_file_config(&mut config, &mut sources, file_config, source);
        }

        apply_env(&mut config, &mut sources);
        apply_cli(&mut config, &mut sources, cli_args);

        Ok(DiscoveredConfig { config, sources })
    }
}

const TRACKED_FIELDS: &[&str] = &[
    "work_store_root",
    "instances_per_phase",
    "machine_index_ranges",
    "ocr",
    "local_inference",
    "external_model",
    "delivery",
    "stale_lock_ttl_seconds",
    "resource_sample_interval_seconds",
    "correspondent_known_mappings_path",
    "kind_rules_path",
    "tag_vocabulary_path",
    "log_format",
];

/// Walk upward from `start_dir` looking for `docpipeline.toml`, honoring
/// `DOCPIPELINE_HOME` as an override root.
fn discover_config_file_from(start_dir: &Path) -> Option<Utf8PathBuf> {
    if let Ok(home) = env::var("DOCPIPELINE_HOME") {
        let candidate = Utf8PathBuf::from(home).join("docpipeline.toml");
        if candidate.exists() {
            return Some(candidate);
        }
    }

    let mut dir = Utf8Path::from_path(start_dir)?.to_path_buf();
    loop {
        let candidate = dir.join("docpipeline.toml");
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

fn load_config_file(path: &Utf8Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path.as_std_path()).map_err(|_| ConfigError::NotFound {
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|e| ConfigError::InvalidFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn apply_file_config(
    config: &mut Config,
    sources: &mut HashMap<&'static str, ConfigSource>,
    file: FileConfig,
    source: ConfigSource,
) {
    macro_rules! apply {
        ($field:ident) => {
            if let Some(value) = file.$field {
                config.$field = value;
                sources.insert(stringify!($field), source.clone());
            }
        };
    }

    apply!(work_store_root);
    apply!(instances_per_phase);
    apply!(machine_index_ranges);
    apply!(ocr);
    apply!(local_inference);
    apply!(external_model);
    apply!(delivery);
    apply!(stale_lock_ttl_seconds);
    apply!(resource_sample_interval_seconds);
    apply!(correspondent_known_mappings_path);
    apply!(kind_rules_path);
    apply!(tag_vocabulary_path);
}

/// Environment overrides, all prefixed `DOCPIPELINE_`. Only the handful of
/// values operators commonly override per-host (tokens, endpoints, roots)
/// are exposed this way; structural config (retry policy shape, thresholds)
/// is file-only.
fn apply_env(config: &mut Config, sources: &mut HashMap<&'static str, ConfigSource>) {
    if let Ok(v) = env::var("DOCPIPELINE_WORK_STORE_ROOT") {
        config.work_store_root = Utf8PathBuf::from(v);
        sources.insert("work_store_root", ConfigSource::Environment);
    }
    if let Ok(v) = env::var("DOCPIPELINE_DELIVERY_API_TOKEN") {
        config.delivery.api_token = v;
        sources.insert("delivery", ConfigSource::Environment);
    }
    if let Ok(v) = env::var("DOCPIPELINE_EXTERNAL_MODEL_API_TOKEN") {
        config.external_model.api_token = v;
        sources.insert("external_model", ConfigSource::Environment);
    }
    if let Ok(v) = env::var("DOCPIPELINE_STALE_LOCK_TTL_SECONDS") {
        if let Ok(parsed) = v.parse() {
            config.stale_lock_ttl_seconds = parsed;
            sources.insert("stale_lock_ttl_seconds", ConfigSource::Environment);
        }
    }
}

fn apply_cli(config: &mut Config, sources: &mut HashMap<&'static str, ConfigSource>, cli: &CliArgs) {
    if let Some(root) = &cli.work_store_root {
        config.work_store_root = root.clone();
        sources.insert("work_store_root", ConfigSource::Cli);
    }
    if let Some(format) = cli.log_format {
        config.log_format = match format {
            crate::cli_args::CliLogFormat::Human => crate::model::LogFormat::Human,
            crate::cli_args::CliLogFormat::Json => crate::model::LogFormat::Json,
        };
        sources.insert("log_format", ConfigSource::Cli);
    }
}

/// Validate configuration after layering; returns the first problem found.
/// Callers map this to `ExitCode::ConfigError`.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.delivery.service_url.is_empty() {
        return Err(ConfigError::MissingRequired("delivery.service_url".to_string()));
    }
    if config.stale_lock_ttl_seconds == 0 {
        return Err(ConfigError::MissingRequired(
            "stale_lock_ttl_seconds must be nonzero".to_string(),
        ));
    }
    Ok(())
}
