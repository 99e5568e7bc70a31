//! The per-item loop every phase's worker instance runs: claim, process,
//! write an Artifact or record a failure/deferral, release, and check for a
//! shutdown request before moving to the next item. This is the piece every
//! `phase{1..5}` module shares; only [`ItemProcessor::process`] differs
//! between phases.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pipeline_config::ResourceThresholds;
use pipeline_monitor::{is_throttled, ResourceSample};
use pipeline_store::{ClaimOutcome, WorkStore};
use pipeline_types::{Artifact, FailureRecord, Phase, WorkItem};
use pipeline_utils::error::FailureReason;
use tokio::sync::watch;

/// What processing one item produced, before the worker loop decides how to
/// persist it. `Artifact` and `Failed` are terminal; `Deferred` means the
/// item goes back into the work for a later run rather than being marked
/// done.
pub enum ItemOutcome {
    Artifact(Box<Artifact>),
    Failed { reason: FailureReason, snippet: String },
    Deferred { reason: FailureReason, snippet: String },
}

/// One phase's item-processing logic, with no knowledge of claiming,
/// locking, or the failure/deferred streams; the worker loop owns all of
/// that.
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    fn phase(&self) -> Phase;
    async fn process(&self, item: &WorkItem) -> ItemOutcome;
}

/// Cooperative shutdown flag, set by a Ctrl-C or SIGTERM listener and
/// checked by the worker loop only between items.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Installs OS signal handlers and returns a cheap, cloneable handle.
    /// Ctrl-C (all platforms) and SIGTERM (unix) both request shutdown;
    /// the grace window itself is enforced by the launcher's `stop`
    /// handling, not here.
    #[must_use]
    pub fn install() -> Self {
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to install SIGTERM handler");
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
            tracing::info!("shutdown requested, finishing in-flight item then stopping");
            let _ = tx.send(true);
        });
        Self { rx }
    }

    /// For tests and non-process contexts that never installed real signal
    /// handlers: a signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Tally returned by [`run_worker_loop`] for the `status`/`stop` CLI output.
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkerStats {
    pub artifacts_written: u64,
    pub failed: u64,
    pub deferred: u64,
    pub skipped_already_done: u64,
    pub skipped_contended: u64,
    pub stopped_early: bool,
}

/// Runs the claim/process/persist loop over `items` in order, stopping
/// early if `shutdown` is requested between items. Throttling never pauses
/// an in-flight item; it only logs so the
/// operator can see why the launcher might stop spawning more instances.
pub async fn run_worker_loop(
    store: Arc<WorkStore>,
    processor: &dyn ItemProcessor,
    items: &[WorkItem],
    stale_lock_ttl: Duration,
    throttle: Option<watch::Receiver<ResourceSample>>,
    thresholds: ResourceThresholds,
    shutdown: ShutdownSignal,
) -> WorkerStats {
    let phase = processor.phase();
    let mut stats = WorkerStats::default();
    let already_logged_throttle = AtomicBool::new(false);

    for item in items {
        if shutdown.is_requested() {
            tracing::info!(phase = %phase, "stopping before next item due to shutdown signal");
            stats.stopped_early = true;
            break;
        }

        if let Some(rx) = &throttle {
            let sample = *rx.borrow();
            if is_throttled(&sample, &thresholds) {
                if !already_logged_throttle.swap(true, Ordering::Relaxed) {
                    tracing::warn!(phase = %phase, ?sample, "resource thresholds exceeded; continuing in-flight work");
                }
            } else {
                already_logged_throttle.store(false, Ordering::Relaxed);
            }
        }

        let span = tracing::info_span!("process_item", phase = %phase, item_id = %item.item_id, host = %store.owner_host());
        let _entered = span.enter();

        let lock = match store.claim(phase, &item.item_id, stale_lock_ttl) {
            ClaimOutcome::Acquired(lock) => lock,
            ClaimOutcome::AlreadyDone => {
                stats.skipped_already_done += 1;
                continue;
            }
            ClaimOutcome::Contended => {
                stats.skipped_contended += 1;
                continue;
            }
        };

        match processor.process(item).await {
            ItemOutcome::Artifact(artifact) => {
                if let Err(e) = store.write_artifact(&artifact) {
                    tracing::error!(item_id = %item.item_id, error = %e, "failed to write artifact");
                    let record = FailureRecord::new(&item.item_id, phase, FailureReason::FsError.to_string(), &e.to_string());
                    let _ = store.append_failure(&record);
                    stats.failed += 1;
                } else {
                    stats.artifacts_written += 1;
                }
            }
            ItemOutcome::Failed { reason, snippet } => {
                let record = FailureRecord::new(&item.item_id, phase, reason.to_string(), &snippet);
                if let Err(e) = store.append_failure(&record) {
                    tracing::error!(item_id = %item.item_id, error = %e, "failed to append failure record");
                }
                stats.failed += 1;
            }
            ItemOutcome::Deferred { reason, snippet } => {
                let record = FailureRecord::new(&item.item_id, phase, reason.to_string(), &snippet);
                if let Err(e) = store.append_deferred(&record) {
                    tracing::error!(item_id = %item.item_id, error = %e, "failed to append deferred record");
                }
                stats.deferred += 1;
            }
        }

        drop(lock.release());
    }

    stats
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;
    use pipeline_types::{DocumentKind, Envelope};
    use tempfile::TempDir;

    use super::*;

    struct AlwaysSucceeds;

    #[async_trait]
    impl ItemProcessor for AlwaysSucceeds {
        fn phase(&self) -> Phase {
            Phase::Phase1
        }

        async fn process(&self, item: &WorkItem) -> ItemOutcome {
            ItemOutcome::Artifact(Box::new(Artifact {
                item_id: item.item_id.clone(),
                phase: Phase::Phase1,
                doc_kind: DocumentKind::Invoice,
                fields: Default::default(),
                raw_text_sha256: "0".repeat(64),
                content_md5: "0".repeat(32),
                confidence: 0.9,
                escalation_trace: None,
            }))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl ItemProcessor for AlwaysFails {
        fn phase(&self) -> Phase {
            Phase::Phase1
        }

        async fn process(&self, _item: &WorkItem) -> ItemOutcome {
            ItemOutcome::Failed {
                reason: FailureReason::Unclassified,
                snippet: "no rule matched".to_string(),
            }
        }
    }

    fn sample_item(item_id: &str, slot: u64) -> WorkItem {
        WorkItem {
            item_id: item_id.to_string(),
            slot,
            envelope: Envelope {
                sender: "a@b.com".to_string(),
                recipients: vec!["me@example.com".to_string()],
                subject: "subject".to_string(),
                date: "2024-01-01T00:00:00Z".to_string(),
                body_text: "body".to_string(),
            },
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn successful_items_produce_artifacts() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(WorkStore::new(
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            "host-a".to_string(),
        ));
        let items = vec![sample_item("item-1", 0), sample_item("item-2", 1)];
        let stats = run_worker_loop(
            Arc::clone(&store),
            &AlwaysSucceeds,
            &items,
            Duration::from_secs(600),
            None,
            ResourceThresholds::default(),
            ShutdownSignal::never(),
        )
        .await;

        assert_eq!(stats.artifacts_written, 2);
        assert!(store.read_artifact(Phase::Phase1, "item-1").unwrap().is_some());
    }

    #[tokio::test]
    async fn already_done_items_are_skipped_not_reprocessed() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(WorkStore::new(
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            "host-a".to_string(),
        ));
        let items = vec![sample_item("item-1", 0)];
        run_worker_loop(
            Arc::clone(&store),
            &AlwaysSucceeds,
            &items,
            Duration::from_secs(600),
            None,
            ResourceThresholds::default(),
            ShutdownSignal::never(),
        )
        .await;

        let stats = run_worker_loop(
            Arc::clone(&store),
            &AlwaysFails,
            &items,
            Duration::from_secs(600),
            None,
            ResourceThresholds::default(),
            ShutdownSignal::never(),
        )
        .await;

        assert_eq!(stats.skipped_already_done, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn failures_are_appended_to_the_failure_stream() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(WorkStore::new(
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap(),
            "host-a".to_string(),
        ));
        let items = vec![sample_item("item-1", 0)];
        let stats = run_worker_loop(
            Arc::clone(&store),
            &AlwaysFails,
            &items,
            Duration::from_secs(600),
            None,
            ResourceThresholds::default(),
            ShutdownSignal::never(),
        )
        .await;

        assert_eq!(stats.failed, 1);
        let records = store.read_failure_stream(Phase::Phase1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason, "unclassified");
    }
}
