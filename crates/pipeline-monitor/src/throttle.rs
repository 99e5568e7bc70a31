//! The throttle signal and recommended-instance-count formula. Throttling is advisory: in-flight items always complete; workers
//! only consult this at inter-item checkpoints.

use pipeline_config::ResourceThresholds;

use crate::sample::ResourceSample;

/// Raised when any signal crosses its configured threshold.
#[must_use]
pub fn is_throttled(sample: &ResourceSample, thresholds: &ResourceThresholds) -> bool {
    sample.cpu_percent > thresholds.cpu_percent
        || sample.ram_percent > thresholds.ram_percent
        || sample.gpu_percent.is_some_and(|gpu| gpu > thresholds.gpu_percent)
        || sample.free_disk_gib < thresholds.free_disk_gib
}

/// `min(cores/2, ram_gib/4)` scaled by `(100 − current_usage%)/100`, further
/// reduced when the GPU is the limiting resource.
#[must_use]
pub fn recommended_instance_count(sample: &ResourceSample, cores: usize, total_ram_gib: f64) -> u32 {
    let by_cores = cores as f64 / 2.0;
    let by_ram = total_ram_gib / 4.0;
    let base = by_cores.min(by_ram);

    let current_usage = sample.cpu_percent.max(sample.ram_percent) as f64;
    let headroom_scale = (100.0 - current_usage).max(0.0) / 100.0;

    let mut recommended = base * headroom_scale;

    if let Some(gpu) = sample.gpu_percent {
        let gpu_scale = (100.0 - gpu as f64).max(0.0) / 100.0;
        recommended = recommended.min(base * gpu_scale);
    }

    recommended.floor().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(cpu: f32, ram: f32, gpu: Option<f32>, disk: f64) -> ResourceSample {
        ResourceSample {
            cpu_percent: cpu,
            ram_percent: ram,
            gpu_percent: gpu,
            free_disk_gib: disk,
        }
    }

    #[test]
    fn throttles_on_cpu_over_threshold() {
        let thresholds = ResourceThresholds::default();
        assert!(is_throttled(&sample(90.0, 10.0, None, 100.0), &thresholds));
        assert!(!is_throttled(&sample(50.0, 10.0, None, 100.0), &thresholds));
    }

    #[test]
    fn throttles_on_low_disk() {
        let thresholds = ResourceThresholds::default();
        assert!(is_throttled(&sample(10.0, 10.0, None, 5.0), &thresholds));
    }

    #[test]
    fn recommended_count_scales_down_with_usage() {
        let idle = sample(0.0, 0.0, None, 100.0);
        let busy = sample(90.0, 10.0, None, 100.0);
        assert!(recommended_instance_count(&idle, 16, 64.0) > recommended_instance_count(&busy, 16, 64.0));
    }

    #[test]
    fn gpu_as_limiting_resource_reduces_recommendation() {
        let no_gpu_load = sample(10.0, 10.0, Some(0.0), 100.0);
        let gpu_saturated = sample(10.0, 10.0, Some(99.0), 100.0);
        assert!(recommended_instance_count(&no_gpu_load, 16, 64.0) > recommended_instance_count(&gpu_saturated, 16, 64.0));
    }
}
