//! Caller supplied settings, loadable from a TOML file.

use crate::constants::MIN_ABNORMAL_CHECK_COUNT;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LidarConfig {
    /// Serial port such as `/dev/ttyUSB0` or `COM7`.
    pub serial_port: String,
    pub serial_baudrate: u32,
    /// Output one bucket per negotiated angular step instead of one per sample.
    pub fixed_resolution: bool,
    /// Rotate every sample by 180 degrees.
    pub reversion: bool,
    pub auto_reconnect: bool,
    /// Degrees.
    pub min_angle: f64,
    /// Degrees.
    pub max_angle: f64,
    /// Meters.
    pub min_range: f64,
    /// Meters.
    pub max_range: f64,
    /// Requested sampling rate in kHz (4, 8 or 9).
    pub sample_rate: u8,
    /// Requested rotation rate in Hz.
    pub scan_frequency: f64,
    /// Angular intervals `[from, to]` in degrees whose samples are dropped.
    pub ignore_array: Vec<[f64; 2]>,
    pub abnormal_check_count: usize,
    /// Theoretical angle between lidar zero and robot zero, in degrees.
    pub robot_lidar_difference: f64,
    /// Seconds added to the end-of-acquisition time stamp.
    pub offset_time: f64,
    pub calibration_file: PathBuf,
}

impl Default for LidarConfig {
    fn default() -> Self {
        LidarConfig {
            serial_port: String::new(),
            serial_baudrate: 230400,
            fixed_resolution: true,
            reversion: true,
            auto_reconnect: true,
            min_angle: -180.,
            max_angle: 180.,
            min_range: 0.08,
            max_range: 16.0,
            sample_rate: 9,
            scan_frequency: 10.,
            ignore_array: Vec::new(),
            abnormal_check_count: 4,
            robot_lidar_difference: 0.,
            offset_time: 0.,
            calibration_file: PathBuf::from("laserconfig.toml"),
        }
    }
}

impl LidarConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: LidarConfig = toml::from_str(&contents)?;
        Ok(config.normalized())
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Swaps inverted angle bounds and floors the abnormal check count.
    pub fn normalized(mut self) -> Self {
        if self.max_angle < self.min_angle {
            std::mem::swap(&mut self.min_angle, &mut self.max_angle);
        }
        self.abnormal_check_count = self.abnormal_check_count.max(MIN_ABNORMAL_CHECK_COUNT);
        self
    }
}
