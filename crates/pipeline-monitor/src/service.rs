//! Resource Monitor as a small in-process service. A background task samples at a configured interval and
//! publishes over a `tokio::sync::watch` channel; workers subscribe and
//! check the latest value only at item boundaries.

use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use sysinfo::System;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::gpu::GpuSampler;
use crate::sample::ResourceSample;

/// A running monitor. Dropping this stops the background sampling task.
pub struct ResourceMonitor {
    receiver: watch::Receiver<ResourceSample>,
    handle: JoinHandle<()>,
}

impl ResourceMonitor {
    /// Spawns the sampling task. `disk_paths` are the filesystem paths
    /// configured for free-space checks.
    #[must_use]
    pub fn spawn(interval: Duration, disk_paths: Vec<Utf8PathBuf>, gpu: Arc<dyn GpuSampler>) -> Self {
        let mut sys = System::new_all();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        let paths: Vec<&camino::Utf8Path> = disk_paths.iter().map(camino::Utf8PathBuf::as_path).collect();
        let initial = ResourceSample::take(&sys, &paths, gpu.as_ref());

        let (sender, receiver) = watch::channel(initial);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                sys.refresh_cpu_usage();
                sys.refresh_memory();
                let paths: Vec<&camino::Utf8Path> = disk_paths.iter().map(camino::Utf8PathBuf::as_path).collect();
                let sample = ResourceSample::take(&sys, &paths, gpu.as_ref());
                if sender.send(sample).is_err() {
                    // every receiver dropped; nothing left to publish to.
                    break;
                }
            }
        });

        Self { receiver, handle }
    }

    /// A cheap handle workers subscribe to; cloning never re-samples.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ResourceSample> {
        self.receiver.clone()
    }

    #[must_use]
    pub fn latest(&self) -> ResourceSample {
        *self.receiver.borrow()
    }
}

impl Drop for ResourceMonitor {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::NoopGpuSampler;

    #[tokio::test]
    async fn spawn_publishes_an_initial_sample_immediately() {
        let monitor = ResourceMonitor::spawn(Duration::from_millis(50), Vec::new(), Arc::new(NoopGpuSampler));
        let sample = monitor.latest();
        assert!(sample.cpu_percent >= 0.0);
    }

    #[tokio::test]
    async fn subscribers_see_updated_samples_over_time() {
        let monitor = ResourceMonitor::spawn(Duration::from_millis(20), Vec::new(), Arc::new(NoopGpuSampler));
        let mut rx = monitor.subscribe();
        rx.changed().await.unwrap();
    }
}
