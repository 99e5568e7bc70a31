//! GPU utilization sampling, abstracted behind a trait. The accelerator
//! host's NVML (or similar) integration is an external collaborator, out of
//! scope here; the monitor only needs a number, never the driver
//! integration itself.

/// Returns the current GPU utilization percentage, or `None` when no
/// accelerator is configured for this host.
pub trait GpuSampler: Send + Sync {
    fn sample_percent(&self) -> Option<f32>;
}

/// Used on hosts with no accelerator. Always reports "no GPU present" rather
/// than 0%, so a throttle check never mistakes "unmeasured" for "idle".
pub struct NoopGpuSampler;

impl GpuSampler for NoopGpuSampler {
    fn sample_percent(&self) -> Option<f32> {
        None
    }
}

/// Reports a fixed value, driven by an out-of-process integration (a
/// sidecar script, `nvidia-smi` wrapper, etc.) that writes the current
/// utilization somewhere this process can read it cheaply.
pub struct FixedGpuSampler {
    percent: std::sync::atomic::AtomicU32,
}

impl FixedGpuSampler {
    #[must_use]
    pub fn new(initial_percent: f32) -> Self {
        Self {
            percent: std::sync::atomic::AtomicU32::new(initial_percent.to_bits()),
        }
    }

    pub fn set(&self, percent: f32) {
        self.percent.store(percent.to_bits(), std::sync::atomic::Ordering::Relaxed);
    }
}

impl GpuSampler for FixedGpuSampler {
    fn sample_percent(&self) -> Option<f32> {
        Some(f32::from_bits(self.percent.load(std::sync::atomic::Ordering::Relaxed)))
    }
}
