// Noise tables, keyed by range class code (distance_q2 >> DISTANCE_SHIFT).
pub(crate) const UNIQUE_RANGE_CODES: [u16; 8] =
    [16000, 16210, 16220, 16300, 16310, 16320, 16330, 16340];
pub(crate) const MULTI_RANGE_CODES: [u16; 5] = [16100, 16110, 16120, 16130, 16200];
pub(crate) const SMALLER_RANGE_CODES: [u16; 1] = [16000];

pub(crate) const PINGPONG_RANGE_MM: f64 = 1000.;
pub(crate) const PINGPONG_LOOKAHEAD: usize = 3;
pub(crate) const MULTI_RANGE_LOOKBEHIND: usize = 3;
pub(crate) const EDGE_SAMPLES: usize = 3;

// Parallax between emitter and receiver.
pub(crate) const PARALLAX_BASELINE_MM: f64 = 21.8;
pub(crate) const PARALLAX_FOCAL_MM: f64 = 155.3;

pub(crate) const FREQUENCY_STABILITY_HZ: f64 = 0.03;
pub(crate) const JITTER_SNAP_NS: i128 = 2_000_000;

pub(crate) const CALIBRATION_SECTION: &str = "CALIBRATION";
pub(crate) const UNCALIBRATED_OFFSET_DEGREE: f64 = 179.6;
pub(crate) const UNCALIBRATED_EPSILON_DEGREE: f64 = 0.01;
pub(crate) const MIN_LINE_SUPPORT_M: f64 = 1.0;

pub(crate) const HEALTH_RETRY_DELAY_MS: u64 = 2000;
pub(crate) const HEALTH_SETTLE_DELAY_MS: u64 = 1000;
pub(crate) const INFO_RETRY_DELAY_MS: u64 = 2000;

// Firmware older than 2.34 lacks the bounce patterns the noise tables describe.
pub(crate) const FILTER_MIN_FIRMWARE: (u8, u8) = (2, 34);

pub(crate) const MAX_RATE_SET_ATTEMPTS: usize = 8;
pub(crate) const MAX_RATE_SET_FAILURES: usize = 3;

pub(crate) const MIN_SCAN_FREQUENCY_HZ: f64 = 5.;
pub(crate) const MAX_SCAN_FREQUENCY_HZ: f64 = 12.;
pub(crate) const COARSE_STEP_HZ: f64 = 1.0;
pub(crate) const COARSE_STEP_THRESHOLD_HZ: f64 = 0.95;
pub(crate) const FINE_STEP_HZ: f64 = 0.1;
pub(crate) const FINE_STEP_THRESHOLD_HZ: f64 = 0.09;
// Bucket count is computed against a rotation slightly slower than reported.
pub(crate) const BUCKET_FREQUENCY_MARGIN_HZ: f64 = 0.1;

pub(crate) const MIN_ABNORMAL_CHECK_COUNT: usize = 2;
pub(crate) const ABNORMAL_CHECK_BACKOFF_MS: u64 = 1000;

pub(crate) const DEFAULT_POINT_PERIOD_NS: u64 = 1_000_000_000 / 9000;
