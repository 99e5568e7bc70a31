//! Preflight health checks for `docpipeline doctor`: work-store writability
//! and atomic-rename sanity, config validity, and reachability of every
//! HTTP collaborator a configured run depends on (OCR, the three local
//! inference tiers, the external model, and delivery).
//!
//! Checks are sorted by name before emission so JCS-canonical output is
//! stable across runs, matching every other on-disk or stdout JSON surface
//! in this pipeline.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use pipeline_config::Config;
use serde::{Deserialize, Serialize};

const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorCheck {
    pub name: String,
    pub status: CheckStatus,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorOutput {
    pub schema_version: String,
    pub emitted_at: DateTime<Utc>,
    pub ok: bool,
    pub checks: Vec<DoctorCheck>,
}

impl DoctorOutput {
    pub fn to_canonical_json(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json_canonicalizer::to_string(&value)?)
    }
}

pub struct DoctorCommand {
    config: Config,
    http: reqwest::Client,
}

impl DoctorCommand {
    #[must_use]
    pub fn new(config: Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REACHABILITY_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { config, http }
    }

    /// Runs every check and reports exit health. In strict mode, warnings
    /// count as failures for exit-code purposes, same as a bare failure.
    pub async fn run_with_options_strict(&self, strict_exit: bool) -> DoctorOutput {
        let mut checks = vec![
            self.check_config_parse(),
            self.check_work_store_writable(),
            self.check_atomic_rename(),
            self.check_ocr_endpoint().await,
            self.check_local_inference_tier("small", &self.config.local_inference.small_endpoint).await,
            self.check_local_inference_tier("medium", &self.config.local_inference.medium_endpoint).await,
            self.check_local_inference_tier("large", &self.config.local_inference.large_endpoint).await,
            self.check_external_model_endpoint().await,
            self.check_delivery_endpoint().await,
        ];

        checks.sort_by(|a, b| a.name.cmp(&b.name));

        let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
        let has_warn = checks.iter().any(|c| c.status == CheckStatus::Warn);
        let ok = !has_fail && (!strict_exit || !has_warn);

        DoctorOutput {
            schema_version: "1".to_string(),
            emitted_at: Utc::now(),
            ok,
            checks,
        }
    }

    fn check_config_parse(&self) -> DoctorCheck {
        match pipeline_config::validate(&self.config) {
            Ok(()) => DoctorCheck {
                name: "config_parse".to_string(),
                status: CheckStatus::Pass,
                details: "configuration parsed and validated successfully".to_string(),
            },
            Err(e) => DoctorCheck {
                name: "config_parse".to_string(),
                status: CheckStatus::Fail,
                details: format!("configuration invalid: {e}"),
            },
        }
    }

    fn check_work_store_writable(&self) -> DoctorCheck {
        let root = self.config.work_store_root.as_std_path();

        if let Err(e) = std::fs::create_dir_all(root) {
            return DoctorCheck {
                name: "work_store_writable".to_string(),
                status: CheckStatus::Fail,
                details: format!("cannot create work store root {}: {e}", self.config.work_store_root),
            };
        }

        let probe = root.join(".doctor_probe");
        match std::fs::write(&probe, b"doctor") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                DoctorCheck {
                    name: "work_store_writable".to_string(),
                    status: CheckStatus::Pass,
                    details: format!("{} is writable", self.config.work_store_root),
                }
            }
            Err(e) => DoctorCheck {
                name: "work_store_writable".to_string(),
                status: CheckStatus::Fail,
                details: format!("cannot write to {}: {e}", self.config.work_store_root),
            },
        }
    }

    /// Writes then renames within the work store root, same mechanism the
    /// worker loop relies on to publish artifacts without partial writes
    /// visible to another instance.
    fn check_atomic_rename(&self) -> DoctorCheck {
        let root = self.config.work_store_root.as_std_path();
        let tmp = root.join(".doctor_rename_src");
        let dst = root.join(".doctor_rename_dst");

        let result = std::fs::write(&tmp, b"doctor").and_then(|()| std::fs::rename(&tmp, &dst));
        let _ = std::fs::remove_file(&tmp);
        let _ = std::fs::remove_file(&dst);

        match result {
            Ok(()) => DoctorCheck {
                name: "atomic_rename".to_string(),
                status: CheckStatus::Pass,
                details: "atomic rename works on the work store volume".to_string(),
            },
            Err(e) => DoctorCheck {
                name: "atomic_rename".to_string(),
                status: CheckStatus::Fail,
                details: format!("atomic rename failed: {e}"),
            },
        }
    }

    /// A collaborator is reachable if it answers at all, even with a
    /// non-2xx status. Only a connection-level failure (refused, DNS,
    /// timeout) fails the check, since these HTTP endpoints are not
    /// expected to accept a bare GET without a request body.
    async fn probe(&self, name: &str, url: &str) -> DoctorCheck {
        match self.http.get(url).send().await {
            Ok(response) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Pass,
                details: format!("{url} responded with status {}", response.status()),
            },
            Err(e) if e.is_timeout() => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Warn,
                details: format!("{url} did not respond within the reachability timeout: {e}"),
            },
            Err(e) => DoctorCheck {
                name: name.to_string(),
                status: CheckStatus::Fail,
                details: format!("{url} is unreachable: {e}"),
            },
        }
    }

    async fn check_ocr_endpoint(&self) -> DoctorCheck {
        self.probe("ocr_endpoint", &self.config.ocr.endpoint).await
    }

    async fn check_local_inference_tier(&self, tier: &str, endpoint: &str) -> DoctorCheck {
        let mut check = self.probe(&format!("local_inference_{tier}"), endpoint).await;
        check.name = format!("local_inference_{tier}");
        check
    }

    async fn check_external_model_endpoint(&self) -> DoctorCheck {
        if self.config.external_model.api_token.is_empty() {
            return DoctorCheck {
                name: "external_model_endpoint".to_string(),
                status: CheckStatus::Warn,
                details: "no api_token configured for the external model; escalation to LARGE will fail".to_string(),
            };
        }
        self.probe("external_model_endpoint", &self.config.external_model.endpoint).await
    }

    async fn check_delivery_endpoint(&self) -> DoctorCheck {
        self.probe("delivery_endpoint", &self.config.delivery.service_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_with(work_store_root: camino::Utf8PathBuf) -> Config {
        Config {
            work_store_root,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn writable_work_store_passes() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let doctor = DoctorCommand::new(config_with(root));
        let check = doctor.check_work_store_writable();
        assert_eq!(check.status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn atomic_rename_passes_on_local_filesystem() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let doctor = DoctorCommand::new(config_with(root));
        let check = doctor.check_atomic_rename();
        assert_eq!(check.status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn reachable_endpoint_passes_even_on_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let dir = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let mut config = config_with(root);
        config.ocr.endpoint = server.uri();
        let doctor = DoctorCommand::new(config);

        let check = doctor.check_ocr_endpoint().await;
        assert_eq!(check.status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let mut config = config_with(root);
        config.delivery.service_url = "http://127.0.0.1:1".to_string();
        let doctor = DoctorCommand::new(config);

        let check = doctor.check_delivery_endpoint().await;
        assert_eq!(check.status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn missing_external_model_token_warns() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let mut config = config_with(root);
        config.external_model.api_token = String::new();
        let doctor = DoctorCommand::new(config);

        let check = doctor.check_external_model_endpoint().await;
        assert_eq!(check.status, CheckStatus::Warn);
    }

    #[tokio::test]
    async fn checks_are_sorted_by_name_in_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let root = camino::Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let doctor = DoctorCommand::new(config_with(root));
        let output = doctor.run_with_options_strict(false).await;
        let names: Vec<&str> = output.checks.iter().map(|c| c.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
