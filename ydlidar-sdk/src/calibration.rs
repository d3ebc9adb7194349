//! Zero-angle calibration against a known reference wall.
//!
//! While an offset capture is pending, every frame feeds its valid points into
//! a [`PointCache`]. On a frame taken at a stable rotation rate the cache is
//! handed to a [`LineEstimator`]; the longest line close enough to the expected
//! wall direction yields the correction, which is added to the offset and
//! persisted per serial number through a [`CalibrationStore`].

use crate::constants::{
    CALIBRATION_SECTION, MIN_LINE_SUPPORT_M, UNCALIBRATED_EPSILON_DEGREE,
    UNCALIBRATED_OFFSET_DEGREE,
};
use crate::error::{Result, YDLidarError};
use crate::numeric::{degree_to_radian, normalize_angle, radian_to_degree};
use log::{debug, info, warn};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_3, PI};
use std::fs;
use std::path::{Path, PathBuf};

/// Points of the current frame, in the layout line extraction expects.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCache {
    pub bearings: Vec<f64>,
    pub indices: Vec<usize>,
    pub ranges: Vec<f64>,
    pub xs: Vec<f64>,
    pub ys: Vec<f64>,
}

impl PointCache {
    pub fn push(&mut self, bearing: f64, range: f64) {
        self.indices.push(self.bearings.len());
        self.bearings.push(bearing);
        self.ranges.push(range);
        self.xs.push(f64::cos(bearing) * range);
        self.ys.push(f64::sin(bearing) * range);
    }

    pub fn clear(&mut self) {
        self.bearings.clear();
        self.indices.clear();
        self.ranges.clear();
        self.xs.clear();
        self.ys.clear();
    }

    pub fn len(&self) -> usize {
        self.bearings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bearings.is_empty()
    }
}

/// A straight segment found in a point cloud.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSegment {
    /// Direction of the line normal in radian.
    pub angle: f64,
    /// Support of the line in meters.
    pub distance: f64,
}

/// Fits straight segments to the points of one frame.
pub trait LineEstimator {
    fn set_points(&mut self, points: &PointCache);
    fn extract_lines(&mut self) -> Vec<LineSegment>;
}

/// Key/value persistence of offsets.
pub trait CalibrationStore {
    /// `Ok(None)` when nothing is stored under the key.
    fn load(&mut self, section: &str, key: &str) -> Result<Option<f64>>;
    fn save(&mut self, section: &str, key: &str, value: f64) -> Result<()>;
}

/// Offsets kept in a TOML file, one table per section.
///
/// ```toml
/// [CALIBRATION]
/// 201807110001000A = -1.25
/// ```
#[derive(Clone, Debug)]
pub struct TomlCalibrationStore {
    path: PathBuf,
}

impl TomlCalibrationStore {
    pub fn new<P: AsRef<Path>>(path: P) -> TomlCalibrationStore {
        TomlCalibrationStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<toml::Table> {
        if !self.path.exists() {
            return Ok(toml::Table::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        toml::from_str::<toml::Table>(&contents).map_err(|e| self.io_error(e))
    }

    fn io_error<E: std::fmt::Display>(&self, e: E) -> YDLidarError {
        YDLidarError::CalibrationIo(format!("{}: {}", self.path.display(), e))
    }
}

impl CalibrationStore for TomlCalibrationStore {
    fn load(&mut self, section: &str, key: &str) -> Result<Option<f64>> {
        let table = self.read_table()?;
        let value = table
            .get(section)
            .and_then(|s| s.as_table())
            .and_then(|s| s.get(key))
            .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)));
        Ok(value)
    }

    fn save(&mut self, section: &str, key: &str, value: f64) -> Result<()> {
        let mut table = self.read_table()?;
        let entry = table
            .entry(section.to_string())
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if !entry.is_table() {
            *entry = toml::Value::Table(toml::Table::new());
        }
        if let toml::Value::Table(s) = entry {
            s.insert(key.to_string(), toml::Value::Float(value));
        }
        let contents = toml::to_string(&table).map_err(|e| self.io_error(e))?;
        fs::write(&self.path, contents).map_err(|e| self.io_error(e))
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationState {
    pub angle_offset_deg: f64,
    pub is_corrected: bool,
    pub serial_number: String,
    /// Set while an offset capture waits for a qualifying line.
    pub start_offset_requested: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// No capture was pending, nothing was written.
    NotRequested,
}

/// Angle of a fitted line relative to the expected wall direction.
pub(crate) fn line_reference_angle(line_angle: f64, robot_lidar_difference: f64) -> f64 {
    normalize_angle(FRAC_PI_2 - line_angle - PI + robot_lidar_difference)
}

pub struct Calibrator {
    state: CalibrationState,
    cache: PointCache,
    store: Box<dyn CalibrationStore>,
    robot_lidar_difference_deg: f64,
}

impl Calibrator {
    pub fn new(store: Box<dyn CalibrationStore>, robot_lidar_difference_deg: f64) -> Calibrator {
        Calibrator {
            state: CalibrationState::default(),
            cache: PointCache::default(),
            store,
            robot_lidar_difference_deg,
        }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn angle_offset(&self) -> f64 {
        self.state.angle_offset_deg
    }

    /// `true` once an offset is in effect and no capture is pending.
    pub fn is_corrected(&self) -> bool {
        self.state.is_corrected && !self.state.start_offset_requested
    }

    pub fn is_capture_pending(&self) -> bool {
        self.state.start_offset_requested
    }

    pub fn set_robot_lidar_difference(&mut self, degree: f64) {
        self.robot_lidar_difference_deg = degree;
    }

    /// Loads the offset stored for `serial_number`.
    ///
    /// A missing entry, the uncalibrated sentinel or a store failure all leave
    /// the offset at zero and uncorrected.
    pub fn load(&mut self, serial_number: &str) -> CalibrationState {
        self.state.serial_number = serial_number.to_string();
        self.state.angle_offset_deg = 0.;
        self.state.is_corrected = false;

        match self.store.load(CALIBRATION_SECTION, serial_number) {
            Ok(Some(value)) => {
                if (value - UNCALIBRATED_OFFSET_DEGREE).abs() >= UNCALIBRATED_EPSILON_DEGREE {
                    self.state.angle_offset_deg = value;
                    self.state.is_corrected = true;
                }
                info!(
                    "Obtained the {} offset angle [{}] for lidar {}",
                    if self.state.is_corrected { "corrected" } else { "uncorrected" },
                    self.state.angle_offset_deg,
                    serial_number
                );
            }
            Ok(None) => info!("No offset angle stored for lidar {}", serial_number),
            Err(e) => warn!("Failed to load the offset angle of lidar {}: {}", serial_number, e),
        }
        self.state.clone()
    }

    pub fn request_offset_capture(&mut self) {
        info!("Offset capture requested for lidar {}", self.state.serial_number);
        self.state.start_offset_requested = true;
    }

    /// Drops the points of the previous frame.
    pub fn begin_cycle(&mut self) {
        self.cache.clear();
    }

    /// The cache to fill, only while a capture is pending.
    pub fn capture_cache(&mut self) -> Option<&mut PointCache> {
        if self.state.start_offset_requested {
            Some(&mut self.cache)
        } else {
            None
        }
    }

    pub fn cached_points(&self) -> &PointCache {
        &self.cache
    }

    /// Fits lines to the cached points and captures the offset from the best
    /// candidate. Returns `true` when a new offset was captured and saved.
    pub fn try_fit(&mut self, estimator: &mut dyn LineEstimator) -> bool {
        if !self.state.start_offset_requested {
            return false;
        }

        estimator.set_points(&self.cache);
        let lines = estimator.extract_lines();
        let difference = degree_to_radian(self.robot_lidar_difference_deg);
        let tolerance = (difference - FRAC_PI_3).abs();

        let best = lines
            .iter()
            .filter_map(|line| {
                let angle = line_reference_angle(line.angle, difference);
                if angle.abs() < tolerance && line.distance > MIN_LINE_SUPPORT_M {
                    Some((line.distance, angle))
                } else {
                    None
                }
            })
            .max_by(|a, b| a.0.total_cmp(&b.0));

        let Some((distance, angle)) = best else {
            debug!(
                "No reference line among {} candidates from {} points",
                lines.len(),
                self.cache.len()
            );
            return false;
        };

        self.state.angle_offset_deg += -radian_to_degree(angle);
        debug!(
            "Reference line found: support {:.3} m, deviation {:.4} deg",
            distance,
            radian_to_degree(angle)
        );
        matches!(self.save(), Ok(SaveOutcome::Saved))
    }

    /// Persists the current offset if a capture is pending.
    pub fn save(&mut self) -> Result<SaveOutcome> {
        if !self.state.start_offset_requested {
            return Ok(SaveOutcome::NotRequested);
        }

        let offset = self.state.angle_offset_deg;
        match self
            .store
            .save(CALIBRATION_SECTION, &self.state.serial_number, offset)
        {
            Ok(()) => {
                self.state.start_offset_requested = false;
                self.state.is_corrected = true;
                info!("Current robot offset correction value [{}] is saved", offset);
                Ok(SaveOutcome::Saved)
            }
            Err(e) => {
                self.state.is_corrected = false;
                warn!("Saving correction value [{}] failed: {}", offset, e);
                Err(e)
            }
        }
    }

    /// Forgets the offset and marks the serial uncalibrated in the store.
    pub fn reset(&mut self) -> Result<()> {
        self.state.angle_offset_deg = 0.;
        self.state.is_corrected = false;
        self.state.start_offset_requested = false;
        self.store.save(
            CALIBRATION_SECTION,
            &self.state.serial_number,
            UNCALIBRATED_OFFSET_DEGREE,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryStore, StubEstimator};

    const SERIAL: &str = "201807110001000A";

    fn calibrator(store: MemoryStore, difference: f64) -> Calibrator {
        let mut calibrator = Calibrator::new(Box::new(store), difference);
        calibrator.load(SERIAL);
        calibrator
    }

    // Line angle whose reference angle is `deviation` for a zero mounting difference.
    fn line_at(deviation: f64, distance: f64) -> LineSegment {
        LineSegment {
            angle: FRAC_PI_2 - PI - deviation,
            distance,
        }
    }

    #[test]
    fn test_load_sentinel() {
        let store = MemoryStore::with_value(SERIAL, 179.605);
        let calibrator = calibrator(store, 0.);
        assert_eq!(calibrator.angle_offset(), 0.);
        assert!(!calibrator.is_corrected());
    }

    #[test]
    fn test_load_stored_value() {
        let store = MemoryStore::with_value(SERIAL, 179.5);
        let calibrator = calibrator(store, 0.);
        assert_eq!(calibrator.angle_offset(), 179.5);
        assert!(calibrator.is_corrected());
        assert_eq!(calibrator.state().serial_number, SERIAL);
    }

    #[test]
    fn test_load_missing_and_failing() {
        let calibrator_missing = calibrator(MemoryStore::default(), 0.);
        assert!(!calibrator_missing.is_corrected());

        let calibrator_failing = calibrator(MemoryStore::failing(), 0.);
        assert_eq!(calibrator_failing.angle_offset(), 0.);
        assert!(!calibrator_failing.is_corrected());
    }

    #[test]
    fn test_capture_cache_only_while_requested() {
        let mut calibrator = calibrator(MemoryStore::default(), 0.);
        assert!(calibrator.capture_cache().is_none());
        calibrator.request_offset_capture();
        calibrator.capture_cache().unwrap().push(0.5, 2.0);
        assert_eq!(calibrator.cached_points().len(), 1);
        assert_eq!(calibrator.cached_points().indices, vec![0]);
        calibrator.begin_cycle();
        assert!(calibrator.cached_points().is_empty());
    }

    #[test]
    fn test_fit_picks_longest_qualifying_line() {
        let store = MemoryStore::default();
        let mut calibrator = calibrator(store.clone(), 0.);
        calibrator.request_offset_capture();
        assert!(!calibrator.is_corrected());

        let deviation = degree_to_radian(2.0);
        let mut estimator = StubEstimator::new(vec![
            line_at(degree_to_radian(1.0), 1.5),
            line_at(deviation, 3.0),
            // Longest, but off angle.
            line_at(degree_to_radian(80.0), 5.0),
            line_at(degree_to_radian(0.5), 0.9),
        ]);

        assert!(calibrator.try_fit(&mut estimator));
        assert!((calibrator.angle_offset() - (-2.0)).abs() < 1e-9);
        assert!(calibrator.is_corrected());
        assert!(!calibrator.is_capture_pending());
        let saved = store.value(SERIAL).unwrap();
        assert!((saved - (-2.0)).abs() < 1e-9);
    }

    #[test]
    fn test_fit_requires_support_above_one_meter() {
        let mut calibrator = calibrator(MemoryStore::default(), 0.);
        calibrator.request_offset_capture();
        let mut estimator = StubEstimator::new(vec![line_at(0.01, 1.0), line_at(0.02, 0.5)]);
        assert!(!calibrator.try_fit(&mut estimator));
        assert_eq!(calibrator.angle_offset(), 0.);
        assert!(calibrator.is_capture_pending());
    }

    #[test]
    fn test_fit_without_request_is_noop() {
        let mut calibrator = calibrator(MemoryStore::default(), 0.);
        let mut estimator = StubEstimator::new(vec![line_at(0.01, 3.0)]);
        assert!(!calibrator.try_fit(&mut estimator));
        assert_eq!(estimator.n_calls(), 0);
    }

    #[test]
    fn test_fit_save_failure_keeps_request() {
        let mut calibrator = calibrator(MemoryStore::failing(), 0.);
        calibrator.request_offset_capture();
        let mut estimator = StubEstimator::new(vec![line_at(degree_to_radian(1.0), 2.0)]);
        assert!(!calibrator.try_fit(&mut estimator));
        assert!(calibrator.is_capture_pending());
        assert!(!calibrator.state().is_corrected);
        assert!((calibrator.angle_offset() - (-1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_fit_with_mounting_difference() {
        // Lidar mounted at 90 degrees to the robot: tolerance |90 - 60| = 30 degrees.
        let mut calibrator = calibrator(MemoryStore::default(), 90.);
        calibrator.request_offset_capture();
        let difference = FRAC_PI_2;
        let deviation = degree_to_radian(-3.0);
        let line = LineSegment {
            angle: FRAC_PI_2 - PI + difference - deviation,
            distance: 2.0,
        };
        let mut estimator = StubEstimator::new(vec![line]);
        assert!(calibrator.try_fit(&mut estimator));
        assert!((calibrator.angle_offset() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_without_request() {
        let store = MemoryStore::default();
        let mut calibrator = calibrator(store.clone(), 0.);
        assert_eq!(calibrator.save().unwrap(), SaveOutcome::NotRequested);
        assert_eq!(store.value(SERIAL), None);
    }

    #[test]
    fn test_reset() {
        let store = MemoryStore::with_value(SERIAL, 3.5);
        let mut calibrator = calibrator(store.clone(), 0.);
        assert!(calibrator.is_corrected());
        calibrator.reset().unwrap();
        assert_eq!(calibrator.angle_offset(), 0.);
        assert!(!calibrator.is_corrected());
        assert_eq!(store.value(SERIAL), Some(179.6));
    }

    #[test]
    fn test_toml_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laserconfig.toml");
        let mut store = TomlCalibrationStore::new(&path);
        assert_eq!(store.path(), path.as_path());
        assert_eq!(store.load(CALIBRATION_SECTION, SERIAL).unwrap(), None);

        store.save(CALIBRATION_SECTION, SERIAL, -1.25).unwrap();
        store.save(CALIBRATION_SECTION, "0000", 179.6).unwrap();
        store.save("OTHER", SERIAL, 4.0).unwrap();

        let mut reopened = TomlCalibrationStore::new(&path);
        assert_eq!(reopened.load(CALIBRATION_SECTION, SERIAL).unwrap(), Some(-1.25));
        assert_eq!(reopened.load(CALIBRATION_SECTION, "0000").unwrap(), Some(179.6));
        assert_eq!(reopened.load("OTHER", SERIAL).unwrap(), Some(4.0));

        let mut calibrator = Calibrator::new(Box::new(reopened), 0.);
        calibrator.load("0000");
        assert!(!calibrator.is_corrected());
        calibrator.load(SERIAL);
        assert_eq!(calibrator.angle_offset(), -1.25);
    }

    #[test]
    fn test_toml_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("laserconfig.toml");
        fs::write(&path, "[CALIBRATION\nthis is not toml").unwrap();
        let mut store = TomlCalibrationStore::new(&path);
        assert!(matches!(
            store.load(CALIBRATION_SECTION, SERIAL),
            Err(YDLidarError::CalibrationIo(_))
        ));
    }
}
