#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Geometry and timing of a [`LaserScan`].
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanConfig {
    /// Angle of the first bucket in radian.
    pub min_angle: f32,
    /// Angle of the last bucket in radian.
    pub max_angle: f32,
    /// Angular width of one bucket in radian.
    pub angle_increment: f32,
    /// Time between two measurements in seconds.
    pub time_increment: f32,
    /// Time of one rotation in seconds.
    pub scan_time: f32,
    /// Shortest valid range in meters.
    pub min_range: f32,
    /// Longest valid range in meters.
    pub max_range: f32,
}

/// Struct to hold one lap of calibrated, angle-bucketed scan data.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LaserScan {
    /// Range per bucket in meters, 0 when the bucket holds no valid return.
    pub ranges: Vec<f32>,
    /// Return strength per bucket.
    pub intensities: Vec<f32>,
    pub config: ScanConfig,
    /// Start of the rotation in nanoseconds.
    pub self_time_stamp: u64,
    /// Start of the rotation in nanoseconds, system clock.
    pub system_time_stamp: u64,
}

impl LaserScan {
    /// Rotation rate this scan was taken at, in hertz.
    pub fn frequency(&self) -> f64 {
        if self.config.scan_time <= 0. {
            return 0.;
        }
        1.0 / (self.config.scan_time as f64)
    }

    /// Angle of bucket `index` in radian.
    pub fn bucket_angle(&self, index: usize) -> f32 {
        self.config.min_angle + (index as f32) * self.config.angle_increment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_angle() {
        let scan = LaserScan {
            ranges: vec![0.; 4],
            intensities: vec![0.; 4],
            config: ScanConfig {
                min_angle: -1.,
                max_angle: 1.,
                angle_increment: 0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(scan.bucket_angle(0), -1.);
        assert_eq!(scan.bucket_angle(2), 0.);
        assert_eq!(scan.bucket_angle(3), 0.5);
    }

    #[test]
    fn test_frequency() {
        let mut scan = LaserScan::default();
        assert_eq!(scan.frequency(), 0.);
        scan.config.scan_time = 0.125;
        assert_eq!(scan.frequency(), 8.);
    }
}
