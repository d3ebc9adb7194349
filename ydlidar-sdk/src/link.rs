//! Device bring-up and parameter negotiation.
//!
//! Bring-up walks strictly through
//! `Disconnected -> Connected -> HealthChecked -> InfoValidated ->
//! FilterConfigured -> RateNegotiated -> FrequencyNegotiated`, and a
//! successful [`LinkManager::start`] reaches `ScanningReady`.

use crate::config::LidarConfig;
use crate::constants::{
    ABNORMAL_CHECK_BACKOFF_MS, BUCKET_FREQUENCY_MARGIN_HZ, COARSE_STEP_HZ,
    COARSE_STEP_THRESHOLD_HZ, DEFAULT_POINT_PERIOD_NS, FILTER_MIN_FIRMWARE, FINE_STEP_HZ,
    FINE_STEP_THRESHOLD_HZ, HEALTH_RETRY_DELAY_MS, HEALTH_SETTLE_DELAY_MS, INFO_RETRY_DELAY_MS,
    MAX_RATE_SET_ATTEMPTS, MAX_RATE_SET_FAILURES, MAX_SCAN_FREQUENCY_HZ,
    MIN_ABNORMAL_CHECK_COUNT, MIN_SCAN_FREQUENCY_HZ,
};
use crate::error::{Result, YDLidarError};
use crate::numeric::normalize_port_name;
use crate::source::{FrequencyStep, ScanSource};
use crate::time::sleep_ms;
use log::{debug, error, info, warn};
use std::time::Duration;
use ydlidar_frame::{model_baud_rate, DeviceHealth, DeviceInfo, Frame, SampleRate, YdlidarModel};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LinkState {
    Disconnected,
    Connected,
    HealthChecked,
    InfoValidated,
    FilterConfigured,
    RateNegotiated,
    FrequencyNegotiated,
    ScanningReady,
}

/// Parameters settled with the device during bring-up.
#[derive(Clone, Debug, PartialEq)]
pub struct NegotiationState {
    pub sample_rate: SampleRate,
    /// Logical rotation rate, model offset removed.
    pub scan_frequency_hz: f64,
    /// Output buckets in fixed resolution mode.
    pub bucket_count: usize,
    pub bucket_angle_deg: f64,
}

impl Default for NegotiationState {
    fn default() -> Self {
        NegotiationState {
            sample_rate: SampleRate::Rate9K,
            scan_frequency_hz: 10.,
            bucket_count: SampleRate::Rate9K.bucket_count(),
            bucket_angle_deg: SampleRate::Rate9K.bucket_angle_degree(),
        }
    }
}

pub struct LinkManager<S: ScanSource> {
    source: S,
    state: LinkState,
    negotiation: NegotiationState,
    port_name: String,
    baud_rate: u32,
    device_info: Option<DeviceInfo>,
    model: Option<YdlidarModel>,
    frequency_offset: f64,
    filter_enabled: bool,
    scanning: bool,
    point_period_ns: u64,
    delay: fn(u64),
    probe: Frame,
}

impl<S: ScanSource> LinkManager<S> {
    pub fn new(source: S) -> LinkManager<S> {
        LinkManager {
            source,
            state: LinkState::Disconnected,
            negotiation: NegotiationState::default(),
            port_name: String::new(),
            baud_rate: 0,
            device_info: None,
            model: None,
            frequency_offset: YdlidarModel::G4.frequency_offset(),
            filter_enabled: true,
            scanning: false,
            point_period_ns: DEFAULT_POINT_PERIOD_NS,
            delay: sleep_ms,
            probe: Frame::new(),
        }
    }

    /// Replaces the function used to wait between retries.
    pub fn set_delay(&mut self, delay: fn(u64)) {
        self.delay = delay;
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn negotiation(&self) -> &NegotiationState {
        &self.negotiation
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    pub fn model(&self) -> Option<YdlidarModel> {
        self.model
    }

    pub fn filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    pub fn point_period_ns(&self) -> u64 {
        self.point_period_ns
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn require(&self, state: LinkState) -> Result<()> {
        if self.state < state {
            return Err(YDLidarError::NotConnected);
        }
        Ok(())
    }

    pub fn connect(&mut self, port_name: &str, baud_rate: u32) -> Result<()> {
        if self.source.is_connected() {
            self.state = self.state.max(LinkState::Connected);
            return Ok(());
        }

        let port_name = normalize_port_name(port_name);
        if let Err(e) = self.source.connect(&port_name, baud_rate) {
            error!(
                "Cannot bind to the specified serial port [{}] and baudrate [{}]: {}",
                port_name, baud_rate, e
            );
            return Err(YDLidarError::Transport {
                port: port_name,
                baud_rate,
                reason: e.to_string(),
            });
        }
        self.port_name = port_name;
        self.baud_rate = baud_rate;
        self.state = LinkState::Connected;
        Ok(())
    }

    fn query_health(&mut self) -> Result<DeviceHealth> {
        if let Err(e) = self.source.stop() {
            debug!("Stop before health query failed: {}", e);
        }
        self.source.get_health()
    }

    /// Queries device health. An internal fault is fatal, anything else is
    /// retried twice and then tolerated.
    pub fn check_health(&mut self) -> Result<Option<DeviceHealth>> {
        self.require(LinkState::Connected)?;
        let retry_delays = [HEALTH_RETRY_DELAY_MS, HEALTH_SETTLE_DELAY_MS];

        for attempt in 0..=retry_delays.len() {
            if attempt > 0 {
                (self.delay)(retry_delays[attempt - 1]);
            }
            match self.query_health() {
                Ok(health) if health.is_internal_fault() => {
                    error!("Lidar internal error detected. Please reboot the device to retry.");
                    return Err(YDLidarError::DeviceFault(health.status));
                }
                Ok(health) if health.is_ok() => {
                    info!("Lidar running correctly! The health status: good");
                    self.state = LinkState::HealthChecked;
                    return Ok(Some(health));
                }
                Ok(health) => warn!(
                    "Lidar health status is bad: {}, error code {:#06x}",
                    health.status, health.error_code
                ),
                Err(e) => warn!("Cannot retrieve the lidar health: {}", e),
            }
        }

        warn!("Continuing without a good health report");
        self.state = LinkState::HealthChecked;
        Ok(None)
    }

    fn query_info(&mut self) -> Result<(DeviceInfo, YdlidarModel)> {
        let info = self.source.get_device_info()?;
        let model = YdlidarModel::from_model_number(info.model_number)
            .ok_or(YDLidarError::UnsupportedModel(info.model_number))?;
        Ok((info, model))
    }

    /// Reads model, firmware and serial number, retrying once.
    pub fn validate_info(&mut self) -> Result<DeviceInfo> {
        self.require(LinkState::HealthChecked)?;

        let (info, model) = match self.query_info() {
            Ok(found) => found,
            Err(e) => {
                warn!("Device information check failed: {}. Retrying.", e);
                (self.delay)(INFO_RETRY_DELAY_MS);
                self.query_info().map_err(|e| {
                    error!("Device information check failed: {}", e);
                    match e {
                        YDLidarError::UnsupportedModel(_) => e,
                        other => YDLidarError::DeviceInfoUnavailable(other.to_string()),
                    }
                })?
            }
        };

        self.frequency_offset = model.frequency_offset();
        self.model = Some(model);
        if self.baud_rate != 0 && self.baud_rate != model_baud_rate(model) {
            warn!(
                "{} expects {} baud, connected at {}",
                model.name(),
                model_baud_rate(model),
                self.baud_rate
            );
        }
        info!(
            "Connection established in [{}][{}]: firmware version {}.{}, hardware version {}, model {}, serial {}",
            self.port_name,
            self.baud_rate,
            info.firmware_major_version,
            info.firmware_minor_version,
            info.hardware_version,
            model.name(),
            info.serial_string()
        );
        self.device_info = Some(info.clone());
        self.state = LinkState::InfoValidated;
        Ok(info)
    }

    /// Disables the noise filter on firmware older than 2.34.
    pub fn configure_filter(&mut self) -> Result<bool> {
        self.require(LinkState::InfoValidated)?;
        let firmware = self
            .device_info
            .as_ref()
            .map(|info| (info.firmware_major_version, info.firmware_minor_version))
            .ok_or(YDLidarError::NotConnected)?;

        self.filter_enabled = firmware >= FILTER_MIN_FIRMWARE;
        info!("Current FilterNoise Flag: {}", self.filter_enabled);
        self.state = LinkState::FilterConfigured;
        Ok(self.filter_enabled)
    }

    /// Switches the device to `target_khz`.
    ///
    /// Re-issues the set command until the device reports the target, for at
    /// most 8 attempts, giving up after more than 3 failures in a row.
    /// `NegotiationPartial` means the device kept another rate; the rate it
    /// last reported is in effect either way.
    pub fn negotiate_sample_rate(&mut self, target_khz: u8) -> Result<SampleRate> {
        self.require(LinkState::FilterConfigured)?;
        self.negotiation = NegotiationState {
            scan_frequency_hz: self.negotiation.scan_frequency_hz,
            ..NegotiationState::default()
        };
        self.state = LinkState::RateNegotiated;

        let mut reported = match self.source.get_sampling_rate() {
            Ok(rate) => rate,
            Err(e) => {
                warn!("Cannot read the sampling rate: {}", e);
                return Err(YDLidarError::NegotiationPartial(format!(
                    "sampling rate unreadable, assuming {}K",
                    self.negotiation.sample_rate.khz()
                )));
            }
        };
        let target = SampleRate::from_khz(target_khz).unwrap_or(reported);

        let mut attempts = 0;
        let mut failures = 0;
        while reported != target {
            attempts += 1;
            match self.source.set_sampling_rate(target) {
                Ok(rate) => {
                    reported = rate;
                    failures = 0;
                }
                Err(e) => {
                    failures += 1;
                    debug!("Set sampling rate failed ({} in a row): {}", failures, e);
                    if failures > MAX_RATE_SET_FAILURES {
                        break;
                    }
                }
            }
            if attempts >= MAX_RATE_SET_ATTEMPTS {
                break;
            }
        }

        self.negotiation.sample_rate = reported;
        self.negotiation.bucket_count = reported.bucket_count();
        self.negotiation.bucket_angle_deg = reported.bucket_angle_degree();
        info!("Current Sampling Rate : {}K", reported.khz());

        if reported != target {
            return Err(YDLidarError::NegotiationPartial(format!(
                "sampling rate stays at {}K instead of {}K",
                reported.khz(),
                target.khz()
            )));
        }
        Ok(reported)
    }

    /// Applies one adjustment, remembering what the device reports.
    fn step(&mut self, step: FrequencyStep, last_read: &mut Option<f64>) {
        match self.source.step_scan_frequency(step) {
            Ok(frequency) => *last_read = Some(frequency),
            Err(e) => debug!("Scan frequency step {:?} failed: {}", step, e),
        }
    }

    /// Brings the rotation rate to `target_hz`.
    ///
    /// The device runs at the reported frequency minus the model offset, so the
    /// request is shifted by the offset, checked against the supported range and
    /// approached in 1 Hz then 0.1 Hz steps. The result is read back from the
    /// device and the bucket geometry is recomputed from it.
    pub fn negotiate_scan_frequency(&mut self, target_hz: f64) -> Result<f64> {
        self.require(LinkState::RateNegotiated)?;
        let offset = self.frequency_offset;
        let adjusted = target_hz + offset;
        let mut last_read: Option<f64> = None;
        let mut partial: Option<String> = None;

        if MIN_SCAN_FREQUENCY_HZ - offset <= adjusted && adjusted <= MAX_SCAN_FREQUENCY_HZ + offset
        {
            match self.source.get_scan_frequency() {
                Ok(current) => {
                    last_read = Some(current);
                    let mut hz = adjusted - current;
                    if hz > 0. {
                        while hz > COARSE_STEP_THRESHOLD_HZ {
                            self.step(FrequencyStep::Up, &mut last_read);
                            hz -= COARSE_STEP_HZ;
                        }
                        while hz > FINE_STEP_THRESHOLD_HZ {
                            self.step(FrequencyStep::UpFine, &mut last_read);
                            hz -= FINE_STEP_HZ;
                        }
                    } else {
                        while hz < -COARSE_STEP_THRESHOLD_HZ {
                            self.step(FrequencyStep::Down, &mut last_read);
                            hz += COARSE_STEP_HZ;
                        }
                        while hz < -FINE_STEP_THRESHOLD_HZ {
                            self.step(FrequencyStep::DownFine, &mut last_read);
                            hz += FINE_STEP_HZ;
                        }
                    }
                }
                Err(e) => partial = Some(format!("cannot read the scan frequency: {}", e)),
            }
        } else {
            warn!("Current scan frequency [{}] is out of range", target_hz);
            partial = Some(format!("scan frequency {} Hz is out of range", target_hz));
        }

        match self.source.get_scan_frequency() {
            Ok(frequency) => last_read = Some(frequency),
            Err(e) => warn!("Cannot read back the scan frequency: {}", e),
        }
        let device_frequency = last_read.unwrap_or(adjusted);
        if partial.is_none() && (device_frequency - adjusted).abs() > FINE_STEP_HZ + 1e-6 {
            partial = Some(format!(
                "device runs at {} Hz instead of {} Hz",
                device_frequency - offset,
                target_hz
            ));
        }

        let frequency = device_frequency - offset;
        self.negotiation.scan_frequency_hz = frequency;
        let usable = frequency - BUCKET_FREQUENCY_MARGIN_HZ;
        if usable > 0. {
            let samples_per_second = self.negotiation.sample_rate.khz() as f64 * 1000.;
            self.negotiation.bucket_count = (samples_per_second / usable) as usize;
            self.negotiation.bucket_angle_deg = 360. / self.negotiation.bucket_count as f64;
        }
        self.state = LinkState::FrequencyNegotiated;
        info!("Current Scan Frequency: {}Hz", frequency);

        match partial {
            Some(reason) => Err(YDLidarError::NegotiationPartial(reason)),
            None => Ok(frequency),
        }
    }

    /// Connects, checks the device and negotiates sampling rate and frequency.
    pub fn bring_up(&mut self, config: &LidarConfig) -> Result<DeviceInfo> {
        self.connect(&config.serial_port, config.serial_baudrate)?;
        self.check_health()?;
        let info = self.validate_info()?;
        self.configure_filter()?;
        tolerate_partial(self.negotiate_sample_rate(config.sample_rate))?;
        tolerate_partial(self.negotiate_scan_frequency(config.scan_frequency))?;
        Ok(info)
    }

    /// Tries to grab a frame up to `retries` times (at least 2), backing off
    /// one more second per attempt. Returns `true` when every attempt failed.
    pub fn detect_abnormal(&mut self, retries: usize) -> bool {
        let retries = retries.max(MIN_ABNORMAL_CHECK_COUNT);
        for attempt in 0..retries {
            if attempt > 0 {
                (self.delay)(attempt as u64 * ABNORMAL_CHECK_BACKOFF_MS);
            }
            match self.source.grab_frame(&mut self.probe) {
                Ok(()) => return false,
                Err(e) => debug!("Abnormal check {} failed: {}", attempt, e),
            }
        }
        true
    }

    pub fn start(&mut self, config: &LidarConfig) -> Result<()> {
        if self.scanning && self.source.is_scanning() {
            return Ok(());
        }
        self.require(LinkState::FrequencyNegotiated)?;

        if let Err(first) = self.source.start_scan() {
            warn!("Failed to start scan mode: {}. Retrying.", first);
            if let Err(e) = self.source.start_scan() {
                if let Err(stop_error) = self.source.stop() {
                    debug!("Stop after failed start failed: {}", stop_error);
                }
                error!("Failed to start scan mode: {}", e);
                self.scanning = false;
                return Err(YDLidarError::StartFailed(e.to_string()));
            }
        }

        if self.detect_abnormal(config.abnormal_check_count) {
            if let Err(e) = self.source.stop() {
                debug!("Stop after abnormal check failed: {}", e);
            }
            error!("Failed to turn on the Lidar, because the lidar is blocked or the lidar hardware is faulty.");
            self.scanning = false;
            return Err(YDLidarError::AbnormalScan);
        }

        self.point_period_ns = self.source.point_period_ns();
        self.scanning = true;
        self.source.set_auto_reconnect(config.auto_reconnect);
        self.state = LinkState::ScanningReady;
        info!("Now YDLIDAR is scanning ......");
        Ok(())
    }

    /// Stops scanning. Always issues the stop command.
    pub fn stop(&mut self) {
        if let Err(e) = self.source.stop() {
            warn!("Stop command failed: {}", e);
        }
        if self.scanning {
            info!("Now YDLIDAR Scanning has stopped ......");
        }
        self.scanning = false;
        if self.state == LinkState::ScanningReady {
            self.state = LinkState::FrequencyNegotiated;
        }
    }

    pub fn disconnect(&mut self) {
        self.source.disconnect();
        self.scanning = false;
        self.state = LinkState::Disconnected;
    }

    pub fn is_ready(&self) -> bool {
        self.scanning && self.source.is_scanning()
    }

    /// Half a rotation period, the wait before polling a device that is not ready.
    pub fn retry_after(&self) -> Duration {
        let frequency = self.negotiation.scan_frequency_hz;
        if frequency <= 0. {
            return Duration::from_millis(ABNORMAL_CHECK_BACKOFF_MS);
        }
        Duration::from_millis((1000. / (2. * frequency)) as u64)
    }

    pub fn grab_frame(&mut self, frame: &mut Frame) -> Result<()> {
        self.source.grab_frame(frame).map_err(|e| match e {
            YDLidarError::ScanGrab(_) => e,
            other => YDLidarError::ScanGrab(other.to_string()),
        })
    }
}

/// Logs and absorbs the non-fatal outcome of a negotiation step.
fn tolerate_partial<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if !e.is_fatal() => {
            warn!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
