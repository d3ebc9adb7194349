#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Right shift that drops the check bit from `angle_q6_checkbit`.
///
/// Bit layout of the angle word: `[15..1]` angle in 1/64 degree, `[0]` check bit.
pub const ANGLE_SHIFT: u16 = 1;

/// Right shift that turns `distance_q2` into the quantized range class code.
///
/// Bit layout of the distance word: `[15..2]` integral millimeters, `[1..0]` quarter millimeters.
pub const DISTANCE_SHIFT: u16 = 2;

/// Upper bound of samples in one rotation.
pub const MAX_SCAN_NODES: usize = 3600;

/// One measurement as delivered by the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawSample {
    /// Return strength.
    pub sync_quality: u8,
    /// Angle in 1/64 degree shifted left by one, check bit in bit 0.
    pub angle_q6_checkbit: u16,
    /// Distance in 1/4 millimeter.
    pub distance_q2: u16,
}

impl RawSample {
    pub fn new(sync_quality: u8, angle_q6_checkbit: u16, distance_q2: u16) -> RawSample {
        RawSample {
            sync_quality,
            angle_q6_checkbit,
            distance_q2,
        }
    }

    /// Packs a sample from a degree angle, setting the check bit.
    pub fn from_degree_and_q2(angle_degree: f64, distance_q2: u16, sync_quality: u8) -> RawSample {
        let q6 = (angle_degree * 64.).round() as u16;
        RawSample::new(sync_quality, (q6 << ANGLE_SHIFT) | 0x01, distance_q2)
    }

    pub fn angle_degree(&self) -> f64 {
        ((self.angle_q6_checkbit >> ANGLE_SHIFT) as f64) / 64.
    }

    pub fn range_mm(&self) -> f64 {
        (self.distance_q2 as f64) / 4.
    }

    /// Quantized distance used as the key of the noise tables.
    pub fn range_class_code(&self) -> u16 {
        self.distance_q2 >> DISTANCE_SHIFT
    }

    /// `false` for a no-return sample.
    pub fn has_return(&self) -> bool {
        self.distance_q2 != 0
    }

    pub fn intensity(&self) -> f32 {
        self.sync_quality as f32
    }
}
