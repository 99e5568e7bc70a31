//! One reading from the Resource Monitor: aggregate CPU, RAM, GPU utilization and free disk
//! space on each configured path.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

use crate::gpu::GpuSampler;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f32,
    pub ram_percent: f32,
    /// `None` when no accelerator is configured.
    pub gpu_percent: Option<f32>,
    /// The minimum free space across every configured disk path, since the
    /// throttle signal raises when free space on *any* path crosses the
    /// threshold.
    pub free_disk_gib: f64,
}

impl ResourceSample {
    /// Takes one reading. `sys` must already have had CPU and memory
    /// refreshed by the caller with the sampling interval sysinfo needs to
    /// compute a meaningful CPU delta (a single fresh `System` always
    /// reports 0% CPU on its first refresh).
    #[must_use]
    pub fn take(sys: &System, disk_paths: &[&Utf8Path], gpu: &dyn GpuSampler) -> Self {
        let cpu_percent = if sys.cpus().is_empty() {
            0.0
        } else {
            sys.cpus().iter().map(sysinfo::Cpu::cpu_usage).sum::<f32>() / sys.cpus().len() as f32
        };

        let ram_percent = if sys.total_memory() == 0 {
            0.0
        } else {
            (sys.used_memory() as f64 / sys.total_memory() as f64 * 100.0) as f32
        };

        let free_disk_gib = free_disk_gib_for(disk_paths);

        Self {
            cpu_percent,
            ram_percent,
            gpu_percent: gpu.sample_percent(),
            free_disk_gib,
        }
    }
}

fn free_disk_gib_for(paths: &[&Utf8Path]) -> f64 {
    let disks = Disks::new_with_refreshed_list();
    const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

    if paths.is_empty() {
        return disks.list().iter().map(|d| d.available_space() as f64 / GIB).sum();
    }

    paths
        .iter()
        .map(|path| {
            disks
                .list()
                .iter()
                .filter(|d| path.as_str().starts_with(d.mount_point().to_string_lossy().as_ref()))
                .max_by_key(|d| d.mount_point().to_string_lossy().len())
                .map(|d| d.available_space() as f64 / GIB)
                .unwrap_or(0.0)
        })
        .fold(f64::INFINITY, f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::NoopGpuSampler;

    #[test]
    fn sample_with_no_accelerator_has_no_gpu_reading() {
        let sys = System::new();
        let sample = ResourceSample::take(&sys, &[], &NoopGpuSampler);
        assert_eq!(sample.gpu_percent, None);
    }

    #[test]
    fn sample_reports_nonnegative_percentages() {
        let mut sys = System::new_all();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        let sample = ResourceSample::take(&sys, &[], &NoopGpuSampler);
        assert!(sample.cpu_percent >= 0.0);
        assert!(sample.ram_percent >= 0.0);
    }
}
