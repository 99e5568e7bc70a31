//! `docpipeline monitor [--json]`: a single resource sample, the throttle
//! verdict, and the recommended instance count for this host.

use std::sync::Arc;

use pipeline_monitor::{is_throttled, recommended_instance_count, NoopGpuSampler, ResourceMonitor};
use pipeline_utils::ExitCode;
use sysinfo::System;

use crate::args::MonitorArgs;

pub async fn run(config: &pipeline_config::Config, args: &MonitorArgs) -> ExitCode {
    let interval = std::time::Duration::from_secs(config.resource_sample_interval_seconds.max(1));
    let disk_paths = vec![config.work_store_root.clone()];
    let monitor = ResourceMonitor::spawn(interval, disk_paths, Arc::new(NoopGpuSampler));
    let sample = monitor.latest();
    let throttled = is_throttled(&sample, &config.resource_thresholds);

    let mut sys = System::new_all();
    sys.refresh_cpu_usage();
    sys.refresh_memory();
    let cores = sys.cpus().len();
    let total_ram_gib = sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0);
    let recommended = recommended_instance_count(&sample, cores, total_ram_gib);

    if args.json {
        let body = serde_json::json!({
            "cpu_percent": sample.cpu_percent,
            "ram_percent": sample.ram_percent,
            "gpu_percent": sample.gpu_percent,
            "free_disk_gib": sample.free_disk_gib,
            "throttled": throttled,
            "recommended_instance_count": recommended,
        });
        println!("{body}");
    } else {
        println!(
            "cpu {:.1}% ram {:.1}% free_disk {:.1}GiB throttled={} recommended_instances={}",
            sample.cpu_percent, sample.ram_percent, sample.free_disk_gib, throttled, recommended
        );
    }

    ExitCode::Success
}
