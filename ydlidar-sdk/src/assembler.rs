//! Conversion of a raw rotation into a calibrated, angle-bucketed [`LaserScan`].

use crate::calibration::PointCache;
use crate::config::LidarConfig;
use crate::constants::{DEFAULT_POINT_PERIOD_NS, FREQUENCY_STABILITY_HZ, JITTER_SNAP_NS};
use crate::error::{Result, YDLidarError};
use crate::filter::{FilterDecisions, NoiseFilter};
use crate::link::NegotiationState;
use crate::numeric::{degree_to_radian, normalize_angle, parallax_correction, radian_to_degree};
use log::{debug, trace};
use std::f64::consts::PI;
use std::fmt::Write;
use ydlidar_frame::{Frame, LaserScan, RawSample, ScanConfig, MAX_SCAN_NODES};

pub const NOISE_LOG_TARGET: &str = "ydlidar_sdk::noise";

/// The last two raw frames, kept for the noise diagnostic dump.
///
/// Written once per processed frame through `&mut`, so a dump can never
/// observe a half-written slot.
#[derive(Clone, Debug, Default)]
pub struct RetainedFrames {
    slots: [Frame; 2],
    next: usize,
}

impl RetainedFrames {
    pub fn retain(&mut self, frame: &Frame) {
        self.slots[self.next].copy_from(frame);
        self.next = (self.next + 1) % self.slots.len();
    }

    pub fn slots(&self) -> &[Frame; 2] {
        &self.slots
    }
}

/// Output geometry and time stamps of one frame.
struct FrameGeometry {
    min_angle: f64,
    max_angle: f64,
    angle_increment: f64,
    n_buckets: usize,
}

pub struct ScanAssembler {
    filter: NoiseFilter,
    retained: RetainedFrames,
    point_period_ns: u64,
    last_end_ns: Option<u64>,
    last_frequency: f64,
}

impl ScanAssembler {
    pub fn new(filter: NoiseFilter) -> ScanAssembler {
        ScanAssembler {
            filter,
            retained: RetainedFrames::default(),
            point_period_ns: DEFAULT_POINT_PERIOD_NS,
            last_end_ns: None,
            last_frequency: 0.,
        }
    }

    pub fn filter(&self) -> &NoiseFilter {
        &self.filter
    }

    pub fn set_filter_enabled(&mut self, enabled: bool) {
        self.filter.set_enabled(enabled);
    }

    pub fn set_point_period_ns(&mut self, point_period_ns: u64) {
        self.point_period_ns = point_period_ns;
    }

    pub fn retained(&self) -> &RetainedFrames {
        &self.retained
    }

    /// Builds the output scan of one rotation.
    ///
    /// `acquired_end_ns` is the time the last sample arrived. Points with a
    /// valid range are appended to `capture` when it is given.
    pub fn assemble(
        &mut self,
        frame: &Frame,
        acquired_end_ns: u64,
        config: &LidarConfig,
        angle_offset_deg: f64,
        negotiation: &NegotiationState,
        mut capture: Option<&mut PointCache>,
    ) -> Result<LaserScan> {
        let count = frame.len();
        if count == 0 {
            return Err(YDLidarError::ScanGrab("empty frame".to_string()));
        }
        debug_assert!(count <= MAX_SCAN_NODES);
        self.retained.retain(frame);

        let scan_time_ns = self.point_period_ns * (count as u64 - 1);
        let start_ns = self.frame_start(acquired_end_ns, scan_time_ns, config.offset_time);
        let scan_time = scan_time_ns as f64 / 1e9;

        let geometry = frame_geometry(config, negotiation, count);
        let mut scan = LaserScan {
            ranges: vec![0.; geometry.n_buckets],
            intensities: vec![0.; geometry.n_buckets],
            config: ScanConfig {
                min_angle: geometry.min_angle as f32,
                max_angle: geometry.max_angle as f32,
                angle_increment: geometry.angle_increment as f32,
                time_increment: (scan_time / count as f64) as f32,
                scan_time: scan_time as f32,
                min_range: config.min_range as f32,
                max_range: config.max_range as f32,
            },
            self_time_stamp: start_ns,
            system_time_stamp: start_ns,
        };

        let decisions = self.filter.decide(frame.samples());
        for (i, sample) in frame.samples().iter().enumerate() {
            let (angle, range, intensity) =
                correct_sample(sample, decisions.is_filtered(i), angle_offset_deg, config);

            if angle < geometry.min_angle || angle > geometry.max_angle {
                continue;
            }
            let index = f64::ceil((angle - geometry.min_angle) / geometry.angle_increment);
            if index >= 0. && (index as usize) < geometry.n_buckets {
                scan.ranges[index as usize] = range as f32;
                scan.intensities[index as usize] = intensity;
            }

            if let Some(cache) = capture.as_deref_mut() {
                if range >= config.min_range {
                    cache.push(angle, range);
                }
            }
        }

        trace!(
            "Assembled {} samples into {} buckets, {} filtered",
            count,
            geometry.n_buckets,
            decisions.n_filtered()
        );
        Ok(scan)
    }

    /// Start time stamp of a frame, snapped onto the end of the previous frame
    /// when the gap between them is a small negative jitter.
    fn frame_start(&mut self, acquired_end_ns: u64, scan_time_ns: u64, offset_time: f64) -> u64 {
        let mut end = acquired_end_ns as i128 + (offset_time * 1e9) as i128
            - self.point_period_ns as i128;
        let mut start = end - scan_time_ns as i128;

        if let Some(last_end) = self.last_end_ns {
            let gap = start - last_end as i128;
            if gap > -JITTER_SNAP_NS && gap < 0 {
                start = last_end as i128;
                end = start + scan_time_ns as i128;
            }
        }

        self.last_end_ns = Some(end.max(0) as u64);
        start.max(0) as u64
    }

    /// Compares the rotation rate of `scan` with the previous one. Only a
    /// frame taken at a steady rate is used for line fitting.
    pub fn observe_frequency(&mut self, scan: &LaserScan) -> bool {
        let frequency = scan.frequency();
        let stable = (self.last_frequency - frequency).abs() < FREQUENCY_STABILITY_HZ;
        self.last_frequency = frequency;
        stable
    }

    /// Per-sample trace of the filter over both retained frames.
    ///
    /// Empty when the filter is disabled.
    pub fn noise_report(&self, angle_offset_deg: f64) -> String {
        let mut report = String::new();
        if !self.filter.is_enabled() {
            return report;
        }

        for (slot, frame) in self.retained.slots().iter().enumerate() {
            let decisions = self.filter.decide(frame.samples());
            render_noise_report(&mut report, frame.samples(), &decisions, angle_offset_deg);
            let _ = writeln!(report, "Save Noise Data[{}] is Finished.......", slot);
        }
        debug!(target: NOISE_LOG_TARGET, "{}", report);
        report
    }
}

fn frame_geometry(config: &LidarConfig, negotiation: &NegotiationState, count: usize) -> FrameGeometry {
    let (min_degree, max_degree) = if config.max_angle < config.min_angle {
        (config.max_angle, config.min_angle)
    } else {
        (config.min_angle, config.max_angle)
    };
    let min_angle = degree_to_radian(min_degree);
    let max_angle = degree_to_radian(max_degree);
    let n_buckets = if config.fixed_resolution {
        negotiation.bucket_count
    } else {
        count
    };
    FrameGeometry {
        min_angle,
        max_angle,
        angle_increment: (max_angle - min_angle) / (n_buckets as f64),
        n_buckets,
    }
}

/// Returns the output angle in radian, range in meters and intensity of one sample.
fn correct_sample(
    sample: &RawSample,
    filtered: bool,
    angle_offset_deg: f64,
    config: &LidarConfig,
) -> (f64, f64, f32) {
    let mut angle = degree_to_radian(sample.angle_degree() + angle_offset_deg);
    let mut range = sample.range_mm();
    let mut intensity = sample.intensity();
    let correction = parallax_correction(range);

    if filtered {
        range = 0.;
        intensity = 0.;
    }
    if range > 1. {
        angle += correction;
    }
    if config.reversion {
        angle += PI;
    }
    // Counterclockwise.
    angle = normalize_angle(2. * PI - angle);

    let ignored = config
        .ignore_array
        .iter()
        .any(|[from, to]| degree_to_radian(*from) <= angle && angle <= degree_to_radian(*to));
    if ignored {
        range = 0.;
    }

    if range > 0. {
        range /= 1000.;
    }
    if range > config.max_range || range < config.min_range {
        range = 0.;
        intensity = 0.;
    }
    (angle, range, intensity)
}

fn render_noise_report(
    report: &mut String,
    samples: &[RawSample],
    decisions: &FilterDecisions,
    angle_offset_deg: f64,
) {
    for (i, sample) in samples.iter().enumerate() {
        let angle = degree_to_radian(sample.angle_degree() + angle_offset_deg);
        let mut range = sample.range_mm();
        let correction = parallax_correction(range);
        let _ = writeln!(
            report,
            "[{}][F]a: {:.6}, d: {:.6}, c: {:.6}, f: 0",
            i,
            radian_to_degree(angle),
            range,
            radian_to_degree(correction)
        );

        let filtered = decisions.is_filtered(i);
        if filtered {
            range = 0.;
        }
        let applied = if range > 1. { correction } else { 0. };
        let _ = writeln!(
            report,
            "[{}][B]a: {:.6}, d: {:.6}, c: {:.6}, f: {}",
            i,
            radian_to_degree(angle + applied),
            range,
            radian_to_degree(applied),
            filtered as u8
        );
    }
}
