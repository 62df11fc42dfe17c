//! Audio subsystem module

pub mod device;
pub mod levels;

pub use device::{list_devices, AudioDeviceInfo};
pub use levels::{AudioLevel, LevelMonitor};
