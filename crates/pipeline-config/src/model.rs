use std::collections::HashMap;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Fully resolved configuration for a pipeline process.
///
/// Every field here corresponds to one of the pipeline's configurable
/// environment/configuration items; `Config::discover` is the only
/// constructor callers should use outside of tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub work_store_root: Utf8PathBuf,

    /// Configured instance count per phase, keyed by phase index (1-5).
    #[serde(default)]
    pub instances_per_phase: HashMap<u8, u32>,

    /// Half-open `[start, end)` index range each machine is responsible for,
    /// keyed by machine tag. A
    /// machine tag absent from this map owns no slice of the input and the
    /// launcher refuses to start for it.
    #[serde(default)]
    pub machine_index_ranges: HashMap<String, (u64, u64)>,

    pub ocr: OcrConfig,
    pub local_inference: LocalInferenceConfig,
    pub external_model: ExternalModelConfig,
    pub delivery: DeliveryConfig,
    pub resource_thresholds: ResourceThresholds,

    /// Default 600s (10 minutes).
    pub stale_lock_ttl_seconds: u64,

    /// Resource Monitor sample interval; default 2s.
    pub resource_sample_interval_seconds: u64,

    pub correspondent_known_mappings_path: Utf8PathBuf,
    pub kind_rules_path: Utf8PathBuf,
    pub tag_vocabulary_path: Utf8PathBuf,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Config {
    /// The half-open index range this machine owns, if the operator
    /// configured one. The launcher refuses to start a phase for a machine
    /// tag with no entry here rather than silently processing everything.
    #[must_use]
    pub fn index_range_for(&self, machine_tag: &str) -> Option<(u64, u64)> {
        self.machine_index_ranges.get(machine_tag).copied()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    pub endpoint: String,
    pub per_attachment_timeout_seconds: u64,
    pub max_pages: u32,
    /// Size of the bounded task pool used for concurrent attachment OCR.
    pub worker_pool_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalInferenceConfig {
    pub small_endpoint: String,
    pub small_model: String,
    pub small_timeout_seconds: u64,
    pub medium_endpoint: String,
    pub medium_model: String,
    pub medium_timeout_seconds: u64,
    pub large_endpoint: String,
    pub large_model: String,
    pub large_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalModelConfig {
    pub endpoint: String,
    pub api_token: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub retry: RetryPolicy,
    /// Per-day token or cost ceiling; enforced before each call, persisted
    /// across restarts (see `pipeline-llm::budget`).
    pub daily_budget_units: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    pub service_url: String,
    pub api_token: String,
    pub retry: RetryPolicy,
    /// Number of items processed concurrently against the single configured
    /// delivery target.
    pub fan_out: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff_seconds: u64,
    pub backoff_factor: f64,
    pub max_backoff_seconds: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_seconds: 2,
            backoff_factor: 2.0,
            max_backoff_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceThresholds {
    pub cpu_percent: f32,
    pub ram_percent: f32,
    pub gpu_percent: f32,
    pub free_disk_gib: f64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            cpu_percent: 85.0,
            ram_percent: 85.0,
            gpu_percent: 90.0,
            free_disk_gib: 10.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_store_root: Utf8PathBuf::from("./work-store"),
            instances_per_phase: HashMap::new(),
            machine_index_ranges: HashMap::new(),
            ocr: OcrConfig {
                endpoint: "http://localhost:8081/ocr".to_string(),
                per_attachment_timeout_seconds: 60,
                max_pages: 50,
                worker_pool_size: 4,
            },
            local_inference: LocalInferenceConfig {
                small_endpoint: "http://localhost:8001".to_string(),
                small_model: "small".to_string(),
                small_timeout_seconds: 60,
                medium_endpoint: "http://localhost:8002".to_string(),
                medium_model: "medium".to_string(),
                medium_timeout_seconds: 90,
                large_endpoint: "http://localhost:8003".to_string(),
                large_model: "large".to_string(),
                large_timeout_seconds: 180,
            },
            external_model: ExternalModelConfig {
                endpoint: "https://api.example.com/v1/chat".to_string(),
                api_token: String::new(),
                model: "external-large".to_string(),
                timeout_seconds: 180,
                retry: RetryPolicy::default(),
                daily_budget_units: 100_000,
            },
            delivery: DeliveryConfig {
                service_url: "http://localhost:8010".to_string(),
                api_token: String::new(),
                retry: RetryPolicy::default(),
                fan_out: 4,
            },
            resource_thresholds: ResourceThresholds::default(),
            stale_lock_ttl_seconds: 600,
            resource_sample_interval_seconds: 2,
            correspondent_known_mappings_path: Utf8PathBuf::from("./config/known_mappings.toml"),
            kind_rules_path: Utf8PathBuf::from("./config/kind_rules.toml"),
            tag_vocabulary_path: Utf8PathBuf::from("./config/tag_vocabulary.toml"),
            log_format: LogFormat::Human,
        }
    }
}
