//! Config-value-with-source-attribution reporting: every tracked field is
//! rendered as a JSON value plus where it came from, for
//! `status`/`monitor --json`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Serializable mirror of `pipeline_config::ConfigSource`; the config crate's
/// own enum carries a `Utf8PathBuf` payload for `ConfigFile`, which collapses
/// to a single label here since callers only need to know the provenance
/// tier, not the exact path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    ConfigFile,
    Environment,
    Cli,
}

impl From<&pipeline_config::ConfigSource> for ConfigSource {
    fn from(source: &pipeline_config::ConfigSource) -> Self {
        match source {
            pipeline_config::ConfigSource::Default => Self::Default,
            pipeline_config::ConfigSource::ConfigFile(_) => Self::ConfigFile,
            pipeline_config::ConfigSource::Environment => Self::Environment,
            pipeline_config::ConfigSource::Cli => Self::Cli,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue {
    pub value: serde_json::Value,
    pub source: ConfigSource,
}

/// Renders every tracked config field (keyed the same way
/// `Config::discover`'s `sources` map is) as a `ConfigValue`, using each
/// field's own `Serialize` impl so structured fields (e.g. `local_inference`)
/// come through as nested JSON rather than a debug string.
#[must_use]
pub fn build_effective_config(
    config: &pipeline_config::Config,
    sources: &HashMap<&'static str, pipeline_config::ConfigSource>,
) -> BTreeMap<String, ConfigValue> {
    let mut effective = BTreeMap::new();

    macro_rules! field {
        ($name:literal, $value:expr) => {
            if let Some(source) = sources.get($name) {
                if let Ok(value) = serde_json::to_value($value) {
                    effective.insert($name.to_string(), ConfigValue { value, source: source.into() });
                }
            }
        };
    }

    field!("work_store_root", &config.work_store_root);
    field!("instances_per_phase", &config.instances_per_phase);
    field!("machine_index_ranges", &config.machine_index_ranges);
    field!("ocr", &config.ocr);
    field!("local_inference", &config.local_inference);
    field!("external_model", &config.external_model);
    field!("delivery", &config.delivery);
    field!("stale_lock_ttl_seconds", &config.stale_lock_ttl_seconds);
    field!("resource_sample_interval_seconds", &config.resource_sample_interval_seconds);
    field!("correspondent_known_mappings_path", &config.correspondent_known_mappings_path);
    field!("kind_rules_path", &config.kind_rules_path);
    field!("tag_vocabulary_path", &config.tag_vocabulary_path);
    field!("log_format", &config.log_format);

    effective
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_config::{CliArgs, Config};

    #[test]
    fn default_fields_are_attributed_as_default() {
        let discovered = Config::discover_from(std::path::Path::new("/nonexistent-dir-xyz"), &CliArgs::default()).unwrap();
        let effective = build_effective_config(&discovered.config, &discovered.sources);
        assert_eq!(effective["work_store_root"].source, ConfigSource::Default);
    }

    #[test]
    fn cli_override_is_attributed_as_cli() {
        let cli = CliArgs {
            work_store_root: Some(camino::Utf8PathBuf::from("/from/cli")),
            ..Default::default()
        };
        let discovered = Config::discover_from(std::path::Path::new("/nonexistent-dir-xyz"), &cli).unwrap();
        let effective = build_effective_config(&discovered.config, &discovered.sources);
        assert_eq!(effective["work_store_root"].source, ConfigSource::Cli);
        assert_eq!(effective["work_store_root"].value, serde_json::json!("/from/cli"));
    }
}
