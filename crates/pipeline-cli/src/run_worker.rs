//! The hidden `run-worker` subcommand: one OS-process instance's
//! claim/process/persist loop for phases 1-3, the Phase 4 manual-review
//! terminal UI, or the single Phase 5 delivery fan-out. `launch` is the only
//! caller that spawns this; an operator would not normally invoke it by hand.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use pipeline_correspondent::KnownMappings;
use pipeline_delivery::{run_delivery, DeliveryClient, TagVocabulary};
use pipeline_extract::RuleTable;
use pipeline_llm::{HttpExternalModelBackend, ModelBackend, TieredLocalBackend};
use pipeline_monitor::{NoopGpuSampler, ResourceMonitor};
use pipeline_ocr::{HttpOcrEngine, OcrEngine};
use pipeline_phases::{run_worker_loop, ManualReviewQueue, Phase1Processor, Phase2Processor, Phase3Processor, ShutdownSignal};
use pipeline_store::WorkStore;
use pipeline_types::{Phase, WorkItem};
use pipeline_utils::ExitCode;

use crate::args::RunWorkerArgs;

pub async fn run(config: &pipeline_config::Config, args: &RunWorkerArgs) -> ExitCode {
    let store = Arc::new(WorkStore::new(config.work_store_root.clone(), args.machine_tag.clone()));
    let shutdown = ShutdownSignal::install();

    let interval = Duration::from_secs(config.resource_sample_interval_seconds.max(1));
    let monitor = ResourceMonitor::spawn(interval, vec![config.work_store_root.clone()], Arc::new(NoopGpuSampler));
    let throttle = monitor.subscribe();
    let stale_lock_ttl = Duration::from_secs(config.stale_lock_ttl_seconds);

    let result = match args.phase {
        Phase::Phase1 | Phase::Phase2 | Phase::Phase3 => {
            run_automated(config, Arc::clone(&store), args, throttle, stale_lock_ttl, shutdown).await
        }
        Phase::Phase4 => run_manual_review(store, stale_lock_ttl).await,
        Phase::Phase5 => run_delivery_phase(config, store).await,
    };

    match result {
        Ok(()) => ExitCode::Success,
        Err(e) => {
            tracing::error!(error = %e, phase = %args.phase, "run-worker failed");
            ExitCode::Aborted
        }
    }
}

/// Resolves this instance's item list and runs the shared claim/process/persist
/// loop for a phase that implements `ItemProcessor`.
async fn run_automated(
    config: &pipeline_config::Config,
    store: Arc<WorkStore>,
    args: &RunWorkerArgs,
    throttle: tokio::sync::watch::Receiver<pipeline_monitor::ResourceSample>,
    stale_lock_ttl: Duration,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let items = resolve_instance_items(&store, args.phase, args.start, args.end)?;

    let stats = match args.phase {
        Phase::Phase1 => {
            let ocr: Arc<dyn OcrEngine> = Arc::new(HttpOcrEngine::new(config.ocr.endpoint.clone()));
            let rules = Arc::new(load_rule_table(config)?);
            let processor = Phase1Processor::new(ocr, rules, Arc::clone(&store), &config.ocr);
            run_worker_loop(
                Arc::clone(&store),
                &processor,
                &items,
                stale_lock_ttl,
                Some(throttle),
                config.resource_thresholds,
                shutdown,
            )
            .await
        }
        Phase::Phase2 => {
            let backend: Arc<dyn ModelBackend> = Arc::new(TieredLocalBackend::new(
                config.local_inference.small_model.clone(),
                config.local_inference.small_endpoint.clone(),
                config.local_inference.medium_model.clone(),
                config.local_inference.medium_endpoint.clone(),
                config.local_inference.large_model.clone(),
                config.local_inference.large_endpoint.clone(),
            ));
            let processor = Phase2Processor::new(backend, &config.local_inference, Arc::clone(&store));
            run_worker_loop(
                Arc::clone(&store),
                &processor,
                &items,
                stale_lock_ttl,
                Some(throttle),
                config.resource_thresholds,
                shutdown,
            )
            .await
        }
        Phase::Phase3 => {
            let backend: Arc<dyn ModelBackend> =
                Arc::new(HttpExternalModelBackend::new(config.external_model.endpoint.clone(), config.external_model.api_token.clone()));
            let processor = Phase3Processor::new(backend, &config.external_model, Arc::clone(&store));
            run_worker_loop(
                Arc::clone(&store),
                &processor,
                &items,
                stale_lock_ttl,
                Some(throttle),
                config.resource_thresholds,
                shutdown,
            )
            .await
        }
        _ => unreachable!("run_automated is only called for phases 1-3"),
    };

    tracing::info!(
        phase = %args.phase,
        machine_tag = %args.machine_tag,
        instance_index = args.instance_index,
        artifacts_written = stats.artifacts_written,
        failed = stats.failed,
        deferred = stats.deferred,
        skipped_already_done = stats.skipped_already_done,
        skipped_contended = stats.skipped_contended,
        stopped_early = stats.stopped_early,
        "instance finished"
    );
    Ok(())
}

/// Phase 1 has no predecessor, so its instance items come straight from the
/// global input enumeration. Every later automated phase instead resolves
/// its items from the previous phase's failure stream.
fn resolve_instance_items(store: &WorkStore, phase: Phase, start: u64, end: u64) -> Result<Vec<WorkItem>> {
    let items = match phase.predecessor() {
        None => store.list_work_items().context("failed to list work items")?,
        Some(predecessor) => {
            let failures = store
                .read_failure_stream(predecessor)
                .with_context(|| format!("failed to read phase {predecessor} failure stream"))?;
            let mut items = Vec::with_capacity(failures.len());
            for failure in failures {
                if let Some(item) = store.read_work_item(&failure.item_id)? {
                    items.push(item);
                }
            }
            items
        }
    };
    Ok(items.into_iter().filter(|item| item.slot >= start && item.slot < end).collect())
}

fn load_rule_table(config: &pipeline_config::Config) -> Result<RuleTable> {
    let content = fs::read_to_string(&config.kind_rules_path)
        .with_context(|| format!("failed to read kind rules at {}", config.kind_rules_path))?;
    RuleTable::load_toml(&content).with_context(|| format!("failed to parse kind rules at {}", config.kind_rules_path))
}

/// Phase 4 is human-driven: this instance just owns the terminal for as long
/// as the reviewer keeps it open. `ManualReviewQueue` has no automated
/// `process` step, so there is nothing to feed `run_worker_loop`.
async fn run_manual_review(store: Arc<WorkStore>, stale_lock_ttl: Duration) -> Result<()> {
    let queue = ManualReviewQueue::new(store, stale_lock_ttl);
    tokio::task::spawn_blocking(move || pipeline_tui::run(queue))
        .await
        .context("manual review task panicked")?
}

/// Phase 5 delivers the union of every earlier phase's Artifacts in one
/// bounded fan-out rather than a per-item claim loop.
async fn run_delivery_phase(config: &pipeline_config::Config, store: Arc<WorkStore>) -> Result<()> {
    let client = Arc::new(DeliveryClient::new(config.delivery.service_url.clone(), config.delivery.api_token.clone()));

    let vocabulary_content = fs::read_to_string(&config.tag_vocabulary_path)
        .with_context(|| format!("failed to read tag vocabulary at {}", config.tag_vocabulary_path))?;
    let vocabulary = Arc::new(TagVocabulary::load_toml(&vocabulary_content).context("failed to parse tag vocabulary")?);

    let mappings_content = fs::read_to_string(&config.correspondent_known_mappings_path)
        .with_context(|| format!("failed to read known mappings at {}", config.correspondent_known_mappings_path))?;
    let mappings = Arc::new(KnownMappings::load_toml(&mappings_content).context("failed to parse known mappings")?);

    let artifacts = store.all_delivered_artifacts().context("failed to list delivered artifacts")?;
    let retry = pipeline_delivery::RetryPolicy::from(config.delivery.retry);

    let report = run_delivery(client, Arc::clone(&store), vocabulary, mappings, retry, config.delivery.fan_out, artifacts).await;

    tracing::info!(
        created = report.created,
        already_delivered = report.already_delivered,
        fatal = report.fatal.len(),
        "delivery run complete"
    );
    for (item_id, error) in &report.fatal {
        tracing::warn!(item_id = %item_id, error = %error, "item failed delivery permanently");
    }

    Ok(())
}
