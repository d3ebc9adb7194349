pub mod device_info;
pub mod frame;
pub mod sample;
pub mod scan;
pub mod ydlidar_models;

pub use device_info::{DeviceHealth, DeviceInfo};
pub use frame::Frame;
pub use sample::{RawSample, ANGLE_SHIFT, DISTANCE_SHIFT, MAX_SCAN_NODES};
pub use scan::{LaserScan, ScanConfig};
pub use ydlidar_models::{model_baud_rate, SampleRate, YdlidarModel};
