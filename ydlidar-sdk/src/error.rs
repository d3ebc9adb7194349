use std::io;
use std::time::Duration;

/// Result type alias
pub type Result<T> = std::result::Result<T, YDLidarError>;

#[derive(Debug, thiserror::Error)]
pub enum YDLidarError {
    #[error("Cannot bind to the serial port [{port}] at {baud_rate} baud: {reason}")]
    Transport {
        port: String,
        baud_rate: u32,
        reason: String,
    },
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Not connected to a device")]
    NotConnected,
    // Last two bits are reserved and should be ignored.
    #[error("Device internal error detected. Status = {0:#010b}. Reboot the device to retry.")]
    DeviceFault(u8),
    #[error("The model #{0} is not supported")]
    UnsupportedModel(u8),
    #[error("Cannot retrieve the device information: {0}")]
    DeviceInfoUnavailable(String),
    #[error("Negotiation did not converge: {0}")]
    NegotiationPartial(String),
    #[error("The lidar is blocked or its hardware is faulty")]
    AbnormalScan,
    #[error("Failed to start scanning: {0}")]
    StartFailed(String),
    #[error("Failed to grab scan data: {0}")]
    ScanGrab(String),
    #[error("Lidar is not scanning, retry after {retry_after:?}")]
    NotReady { retry_after: Duration },
    #[error("Calibration store error: {0}")]
    CalibrationIo(String),
    #[error("Operation timed out")]
    Timeout,
    #[error("Invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("Cannot serialize configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}

impl YDLidarError {
    /// Errors after which bring-up cannot continue without outside action.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            YDLidarError::NegotiationPartial(_)
                | YDLidarError::ScanGrab(_)
                | YDLidarError::NotReady { .. }
                | YDLidarError::CalibrationIo(_)
                | YDLidarError::Timeout
        )
    }
}
