//! Data models for FlexNAS API responses.
//!
//! - `SystemStatus`: CPU, memory and storage utilization summary
//! - `Volume`: a mounted storage volume with its usage

pub mod system;
pub mod volume;

pub use system::{HealthStatus, SystemStatus};
pub use volume::Volume;
