mod assembler;
mod calibration;
mod config;
mod constants;
mod error;
mod filter;
mod link;
mod numeric;
mod source;
mod time;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::assembler::{RetainedFrames, ScanAssembler, NOISE_LOG_TARGET};
pub use crate::calibration::{
    CalibrationState, CalibrationStore, Calibrator, LineEstimator, LineSegment, PointCache,
    SaveOutcome, TomlCalibrationStore,
};
pub use crate::config::LidarConfig;
pub use crate::error::{Result, YDLidarError};
pub use crate::filter::{FilterDecisions, NoiseFilter, NoiseTables};
pub use crate::link::{LinkManager, LinkState, NegotiationState};
pub use crate::source::{available_ports, FrequencyStep, ScanSource};
pub use ydlidar_frame::{
    DeviceHealth, DeviceInfo, Frame, LaserScan, RawSample, SampleRate, ScanConfig, YdlidarModel,
};

use log::{error, info};
use std::collections::BTreeMap;

/// A lidar behind `source`, producing one [`LaserScan`] per rotation.
///
/// # Example
///
/// ```ignore
/// let config = LidarConfig::from_file("lidar.toml")?;
/// let mut lidar = YDLidar::new(config, source, estimator);
/// lidar.initialize()?;
/// lidar.turn_on()?;
/// loop {
///     match lidar.do_process_simple() {
///         Ok(scan) => publish(scan),
///         Err(YDLidarError::NotReady { retry_after }) => std::thread::sleep(retry_after),
///         Err(e) if !e.is_fatal() => continue,
///         Err(e) => return Err(e),
///     }
/// }
/// ```
pub struct YDLidar<S: ScanSource, E: LineEstimator> {
    config: LidarConfig,
    link: LinkManager<S>,
    assembler: ScanAssembler,
    calibrator: Calibrator,
    estimator: E,
    frame: Frame,
}

impl<S: ScanSource, E: LineEstimator> YDLidar<S, E> {
    /// Offsets are persisted to `config.calibration_file`.
    pub fn new(config: LidarConfig, source: S, estimator: E) -> YDLidar<S, E> {
        let store = TomlCalibrationStore::new(&config.calibration_file);
        YDLidar::with_store(config, source, estimator, Box::new(store))
    }

    pub fn with_store(
        config: LidarConfig,
        source: S,
        estimator: E,
        store: Box<dyn CalibrationStore>,
    ) -> YDLidar<S, E> {
        let config = config.normalized();
        let calibrator = Calibrator::new(store, config.robot_lidar_difference);
        YDLidar {
            config,
            link: LinkManager::new(source),
            assembler: ScanAssembler::new(NoiseFilter::new(true)),
            calibrator,
            estimator,
            frame: Frame::new(),
        }
    }

    /// Replaces the function used to wait between bring-up retries.
    pub fn set_delay(&mut self, delay: fn(u64)) {
        self.link.set_delay(delay);
    }

    pub fn config(&self) -> &LidarConfig {
        &self.config
    }

    pub fn link(&self) -> &LinkManager<S> {
        &self.link
    }

    pub fn estimator(&self) -> &E {
        &self.estimator
    }

    pub fn calibration_state(&self) -> &CalibrationState {
        self.calibrator.state()
    }

    /// Connects, checks the device, negotiates the scan parameters and loads
    /// the stored angle offset of the device.
    pub fn initialize(&mut self) -> Result<()> {
        let info = self.link.bring_up(&self.config).map_err(|e| {
            error!("Error initializing YDLIDAR scanner: {}", e);
            e
        })?;
        self.assembler.set_filter_enabled(self.link.filter_enabled());
        self.calibrator.load(&info.serial_string());
        Ok(())
    }

    /// Starts scanning. Does nothing when already scanning.
    pub fn turn_on(&mut self) -> Result<()> {
        self.link.start(&self.config)?;
        self.assembler.set_point_period_ns(self.link.point_period_ns());
        Ok(())
    }

    pub fn turn_off(&mut self) {
        self.link.stop();
    }

    /// Grabs one rotation and turns it into a scan.
    ///
    /// `NotReady` carries how long to wait before polling again. A failed grab
    /// is reported as `ScanGrab` and the next call may succeed.
    pub fn do_process_simple(&mut self) -> Result<LaserScan> {
        if !self.link.is_ready() {
            return Err(YDLidarError::NotReady {
                retry_after: self.link.retry_after(),
            });
        }

        self.calibrator.begin_cycle();
        self.link.grab_frame(&mut self.frame)?;
        let acquired_end_ns = time::now_ns();

        let angle_offset = self.calibrator.angle_offset();
        let scan = self.assembler.assemble(
            &self.frame,
            acquired_end_ns,
            &self.config,
            angle_offset,
            self.link.negotiation(),
            self.calibrator.capture_cache(),
        )?;

        if self.assembler.observe_frequency(&scan) && self.calibrator.try_fit(&mut self.estimator)
        {
            info!(
                "Angle offset of lidar {} is now {}",
                self.calibrator.state().serial_number,
                self.calibrator.angle_offset()
            );
        }
        Ok(scan)
    }

    /// Starts capturing points for a new angle offset. The reference wall has
    /// to be in front of the robot until [`is_angle_offset_corrected`] holds.
    ///
    /// [`is_angle_offset_corrected`]: YDLidar::is_angle_offset_corrected
    pub fn request_offset_capture(&mut self) {
        self.calibrator.request_offset_capture();
    }

    pub fn reset_angle_offset(&mut self) -> Result<()> {
        self.calibrator.reset()
    }

    /// Degrees.
    pub fn angle_offset(&self) -> f64 {
        self.calibrator.angle_offset()
    }

    pub fn is_angle_offset_corrected(&self) -> bool {
        self.calibrator.is_corrected()
    }

    /// Filter trace of the last two frames, also logged to [`NOISE_LOG_TARGET`].
    pub fn save_noise_data(&self) -> String {
        self.assembler.noise_report(self.calibrator.angle_offset())
    }

    pub fn check_hardware(&self) -> bool {
        self.link.is_ready()
    }

    pub fn set_reversion(&mut self, reversion: bool) {
        self.config.reversion = reversion;
    }

    /// Degrees.
    pub fn set_robot_lidar_difference(&mut self, degree: f64) {
        self.config.robot_lidar_difference = degree;
        self.calibrator.set_robot_lidar_difference(degree);
    }

    pub fn lidar_port_list() -> Result<BTreeMap<String, String>> {
        available_ports()
    }
}

impl<S: ScanSource, E: LineEstimator> Drop for YDLidar<S, E> {
    fn drop(&mut self) {
        self.link.disconnect();
    }
}
