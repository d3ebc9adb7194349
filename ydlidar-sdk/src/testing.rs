//! Test doubles shared by the unit tests.

use crate::calibration::{CalibrationStore, LineEstimator, LineSegment, PointCache};
use crate::error::{Result, YDLidarError};
use crate::source::{FrequencyStep, ScanSource};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use ydlidar_frame::{DeviceHealth, DeviceInfo, Frame, RawSample, SampleRate};

thread_local! {
    static DELAYS: RefCell<Vec<u64>> = const { RefCell::new(Vec::new()) };
}

/// Delay function that records instead of sleeping.
pub(crate) fn record_delay(ms: u64) {
    DELAYS.with(|delays| delays.borrow_mut().push(ms));
}

pub(crate) fn recorded_delays() -> Vec<u64> {
    DELAYS.with(|delays| delays.borrow().clone())
}

pub(crate) fn g4_info() -> DeviceInfo {
    DeviceInfo {
        model_number: 5,
        firmware_major_version: 2,
        firmware_minor_version: 34,
        hardware_version: 1,
        serial_number: [2, 0, 1, 8, 0, 7, 1, 1, 0, 0, 0, 1, 0, 0, 0, 10],
    }
}

/// One sample per degree, every one 2 m away.
pub(crate) fn full_turn() -> Frame {
    let samples: Vec<RawSample> = (0..360)
        .map(|degree| RawSample::from_degree_and_q2(degree as f64, 8000, 100))
        .collect();
    Frame::from_samples(&samples)
}

/// Scripted device. Replies queued in `health` and `info` are served first,
/// `None` standing for a failed query.
pub(crate) struct MockState {
    pub connected: bool,
    pub connected_port: String,
    pub fail_connect: bool,
    pub scanning: bool,
    pub health: VecDeque<Option<DeviceHealth>>,
    pub info: VecDeque<Option<DeviceInfo>>,
    pub default_info: DeviceInfo,
    /// `None` makes rate queries fail.
    pub sampling_rate: Option<SampleRate>,
    pub rate_stuck: bool,
    pub rate_set_fails: bool,
    pub n_rate_sets: usize,
    /// `None` makes frequency queries fail.
    pub frequency: Option<f64>,
    pub steps: Vec<FrequencyStep>,
    pub start_failures: usize,
    pub n_starts: usize,
    pub n_stops: usize,
    pub grab_failures: usize,
    pub frames: VecDeque<Frame>,
    pub default_frame: Frame,
    pub point_period_ns: u64,
    pub auto_reconnect: bool,
}

impl Default for MockState {
    fn default() -> Self {
        MockState {
            connected: false,
            connected_port: String::new(),
            fail_connect: false,
            scanning: false,
            health: VecDeque::new(),
            info: VecDeque::new(),
            default_info: g4_info(),
            sampling_rate: Some(SampleRate::Rate9K),
            rate_stuck: false,
            rate_set_fails: false,
            n_rate_sets: 0,
            frequency: Some(10.4),
            steps: Vec::new(),
            start_failures: 0,
            n_starts: 0,
            n_stops: 0,
            grab_failures: 0,
            frames: VecDeque::new(),
            default_frame: full_turn(),
            point_period_ns: 1_000_000_000 / 9000,
            auto_reconnect: false,
        }
    }
}

/// Clones share the same state, so a test keeps a handle after moving one in.
#[derive(Clone, Default)]
pub(crate) struct MockSource {
    inner: Arc<Mutex<MockState>>,
}

impl MockSource {
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap()
    }
}

fn next_rate(rate: SampleRate) -> SampleRate {
    match rate {
        SampleRate::Rate4K => SampleRate::Rate8K,
        SampleRate::Rate8K => SampleRate::Rate9K,
        SampleRate::Rate9K => SampleRate::Rate4K,
    }
}

impl ScanSource for MockSource {
    fn connect(&mut self, port_name: &str, _baud_rate: u32) -> Result<()> {
        let mut state = self.state();
        if state.fail_connect {
            return Err(YDLidarError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no such device",
            )));
        }
        state.connected = true;
        state.connected_port = port_name.to_string();
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.state();
        state.connected = false;
        state.scanning = false;
    }

    fn is_connected(&self) -> bool {
        self.state().connected
    }

    fn is_scanning(&self) -> bool {
        self.state().scanning
    }

    fn grab_frame(&mut self, frame: &mut Frame) -> Result<()> {
        let mut state = self.state();
        if state.grab_failures > 0 {
            state.grab_failures -= 1;
            return Err(YDLidarError::Timeout);
        }
        match state.frames.pop_front() {
            Some(next) => frame.copy_from(&next),
            None => frame.copy_from(&state.default_frame),
        }
        Ok(())
    }

    fn get_health(&mut self) -> Result<DeviceHealth> {
        match self.state().health.pop_front() {
            Some(Some(health)) => Ok(health),
            Some(None) => Err(YDLidarError::Timeout),
            None => Ok(DeviceHealth {
                status: DeviceHealth::STATUS_OK,
                error_code: 0,
            }),
        }
    }

    fn get_device_info(&mut self) -> Result<DeviceInfo> {
        let mut state = self.state();
        match state.info.pop_front() {
            Some(Some(info)) => Ok(info),
            Some(None) => Err(YDLidarError::Timeout),
            None => Ok(state.default_info.clone()),
        }
    }

    fn get_sampling_rate(&mut self) -> Result<SampleRate> {
        self.state().sampling_rate.ok_or(YDLidarError::Timeout)
    }

    fn set_sampling_rate(&mut self, _rate: SampleRate) -> Result<SampleRate> {
        let mut state = self.state();
        state.n_rate_sets += 1;
        if state.rate_set_fails {
            return Err(YDLidarError::Timeout);
        }
        let current = state.sampling_rate.ok_or(YDLidarError::Timeout)?;
        let reported = if state.rate_stuck {
            current
        } else {
            next_rate(current)
        };
        state.sampling_rate = Some(reported);
        Ok(reported)
    }

    fn get_scan_frequency(&mut self) -> Result<f64> {
        self.state().frequency.ok_or(YDLidarError::Timeout)
    }

    fn step_scan_frequency(&mut self, step: FrequencyStep) -> Result<f64> {
        let mut state = self.state();
        state.steps.push(step);
        let delta = match step {
            FrequencyStep::Up => 1.,
            FrequencyStep::UpFine => 0.1,
            FrequencyStep::Down => -1.,
            FrequencyStep::DownFine => -0.1,
        };
        let frequency = state.frequency.ok_or(YDLidarError::Timeout)? + delta;
        state.frequency = Some(frequency);
        Ok(frequency)
    }

    fn start_scan(&mut self) -> Result<()> {
        let mut state = self.state();
        state.n_starts += 1;
        if state.start_failures > 0 {
            state.start_failures -= 1;
            return Err(YDLidarError::Timeout);
        }
        state.scanning = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut state = self.state();
        state.n_stops += 1;
        state.scanning = false;
        Ok(())
    }

    fn point_period_ns(&self) -> u64 {
        self.state().point_period_ns
    }

    fn set_auto_reconnect(&mut self, enable: bool) {
        self.state().auto_reconnect = enable;
    }
}

/// Calibration store kept in memory. Clones share the same values.
#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    values: Arc<Mutex<HashMap<String, f64>>>,
    failing: bool,
}

impl MemoryStore {
    pub fn with_value(serial_number: &str, value: f64) -> MemoryStore {
        let store = MemoryStore::default();
        store
            .values
            .lock()
            .unwrap()
            .insert(entry_name(crate::constants::CALIBRATION_SECTION, serial_number), value);
        store
    }

    /// Every load and save fails.
    pub fn failing() -> MemoryStore {
        MemoryStore {
            failing: true,
            ..Default::default()
        }
    }

    pub fn value(&self, serial_number: &str) -> Option<f64> {
        self.values
            .lock()
            .unwrap()
            .get(&entry_name(crate::constants::CALIBRATION_SECTION, serial_number))
            .copied()
    }
}

fn entry_name(section: &str, key: &str) -> String {
    format!("{}.{}", section, key)
}

impl CalibrationStore for MemoryStore {
    fn load(&mut self, section: &str, key: &str) -> Result<Option<f64>> {
        if self.failing {
            return Err(YDLidarError::CalibrationIo("store unavailable".to_string()));
        }
        Ok(self.values.lock().unwrap().get(&entry_name(section, key)).copied())
    }

    fn save(&mut self, section: &str, key: &str, value: f64) -> Result<()> {
        if self.failing {
            return Err(YDLidarError::CalibrationIo("store unavailable".to_string()));
        }
        self.values
            .lock()
            .unwrap()
            .insert(entry_name(section, key), value);
        Ok(())
    }
}

/// Returns the same lines for every point set.
pub(crate) struct StubEstimator {
    lines: Vec<LineSegment>,
    n_calls: usize,
    n_points: usize,
}

impl StubEstimator {
    pub fn new(lines: Vec<LineSegment>) -> StubEstimator {
        StubEstimator {
            lines,
            n_calls: 0,
            n_points: 0,
        }
    }

    pub fn n_calls(&self) -> usize {
        self.n_calls
    }

    /// Size of the last point set handed over.
    pub fn n_points(&self) -> usize {
        self.n_points
    }
}

impl LineEstimator for StubEstimator {
    fn set_points(&mut self, points: &PointCache) {
        self.n_calls += 1;
        self.n_points = points.len();
    }

    fn extract_lines(&mut self) -> Vec<LineSegment> {
        self.n_calls += 1;
        self.lines.clone()
    }
}
