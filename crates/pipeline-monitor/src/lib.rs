//! Resource Monitor: periodic CPU/RAM/GPU/
//! disk sampling, a throttle signal, and a recommended-instance-count
//! formula, published to workers and launchers over a broadcast channel.

pub mod gpu;
pub mod sample;
pub mod service;
pub mod throttle;

pub use gpu::{FixedGpuSampler, GpuSampler, NoopGpuSampler};
pub use sample::ResourceSample;
pub use service::ResourceMonitor;
pub use throttle::{is_throttled, recommended_instance_count};
