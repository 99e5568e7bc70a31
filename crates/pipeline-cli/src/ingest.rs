//! `docpipeline ingest --input-root <path>`: scans a tree of per-item JSON
//! manifests and populates the work store's `input/` directory.
//!
//! No raw mailbox or MIME parsing lives in this crate; an upstream step
//! (outside this pipeline) is expected to have already split a mailbox into
//! one manifest file per item, each holding the envelope and any attachment
//! bytes inline. This keeps ingestion a pure filesystem-to-filesystem
//! transform with no parsing surface of its own.

use std::fs;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use pipeline_store::WorkStore;
use pipeline_types::{Attachment, Envelope, WorkItem};
use pipeline_utils::atomic_write::write_string_atomic;
use pipeline_utils::hash::item_id_from_path;
use pipeline_utils::ExitCode;
use serde::Deserialize;

use crate::args::IngestArgs;

/// On-disk shape of one item manifest. Reuses the envelope/attachment
/// fields `WorkItem` already defines; `item_id` and `slot` are derived
/// during ingestion rather than read from the manifest.
#[derive(Debug, Deserialize)]
struct Manifest {
    sender: String,
    recipients: Vec<String>,
    subject: String,
    date: String,
    body_text: String,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

pub fn run(config: &pipeline_config::Config, args: &IngestArgs) -> ExitCode {
    match ingest(config, &args.input_root) {
        Ok(count) => {
            tracing::info!(items = count, input_root = %args.input_root, "ingest complete");
            println!("ingested {count} items");
            ExitCode::Success
        }
        Err(e) => {
            tracing::error!(error = %e, "ingest failed");
            ExitCode::Aborted
        }
    }
}

fn ingest(config: &pipeline_config::Config, input_root: &Utf8PathBuf) -> Result<usize> {
    let store = WorkStore::new(config.work_store_root.clone(), pipeline_utils::host::current_host_tag());

    let mut manifest_paths = Vec::new();
    collect_manifests(input_root.as_std_path(), &mut manifest_paths)?;
    manifest_paths.sort();

    for (slot, path) in manifest_paths.iter().enumerate() {
        let relative = path
            .strip_prefix(input_root.as_std_path())
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        let content = fs::read_to_string(path).with_context(|| format!("failed to read manifest at {}", path.display()))?;
        let manifest: Manifest =
            serde_json::from_str(&content).with_context(|| format!("failed to parse manifest at {}", path.display()))?;

        let item_id = item_id_from_path(&relative);
        let item = WorkItem {
            item_id: item_id.clone(),
            slot: slot as u64,
            envelope: Envelope {
                sender: manifest.sender,
                recipients: manifest.recipients,
                subject: manifest.subject,
                date: manifest.date,
                body_text: manifest.body_text,
            },
            attachments: manifest.attachments,
        };

        let item_path = store.layout().input_item_path(&item_id);
        let serialized = serde_json::to_string(&item).context("failed to serialize work item")?;
        write_string_atomic(&item_path, &serialized)
            .with_context(|| format!("failed to write work item at {item_path}"))?;
    }

    Ok(manifest_paths.len())
}

fn collect_manifests(dir: &std::path::Path, out: &mut Vec<std::path::PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read directory {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_manifests(&path, out)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("json") {
            out.push(path);
        }
    }
    Ok(())
}
