use crate::error::Result;
use serialport::SerialPortType;
use std::collections::BTreeMap;
use ydlidar_frame::{DeviceHealth, DeviceInfo, Frame, SampleRate};

/// Scan frequency adjustment commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrequencyStep {
    /// +1 Hz
    Up,
    /// +0.1 Hz
    UpFine,
    /// -1 Hz
    Down,
    /// -0.1 Hz
    DownFine,
}

/// The physical link to the device.
///
/// Implementations own the serial transport and the packet framing. Every
/// call blocks until the device answered or the implementation gave up.
pub trait ScanSource {
    fn connect(&mut self, port_name: &str, baud_rate: u32) -> Result<()>;
    fn disconnect(&mut self);
    fn is_connected(&self) -> bool;
    fn is_scanning(&self) -> bool;

    /// Replaces the contents of `frame` with the samples of one full rotation.
    fn grab_frame(&mut self, frame: &mut Frame) -> Result<()>;

    fn get_health(&mut self) -> Result<DeviceHealth>;
    fn get_device_info(&mut self) -> Result<DeviceInfo>;

    fn get_sampling_rate(&mut self) -> Result<SampleRate>;
    /// Issues one set-rate command and returns the rate the device reports afterwards.
    fn set_sampling_rate(&mut self, rate: SampleRate) -> Result<SampleRate>;

    /// Frequency the device reports, in hertz.
    fn get_scan_frequency(&mut self) -> Result<f64>;
    /// Issues one adjustment and returns the frequency the device reports afterwards.
    fn step_scan_frequency(&mut self, step: FrequencyStep) -> Result<f64>;

    fn start_scan(&mut self) -> Result<()>;
    fn stop(&mut self) -> Result<()>;

    /// Time between two samples in nanoseconds.
    fn point_period_ns(&self) -> u64;
    fn set_auto_reconnect(&mut self, enable: bool);
}

impl<S: ScanSource + ?Sized> ScanSource for Box<S> {
    fn connect(&mut self, port_name: &str, baud_rate: u32) -> Result<()> {
        (**self).connect(port_name, baud_rate)
    }
    fn disconnect(&mut self) {
        (**self).disconnect()
    }
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
    fn is_scanning(&self) -> bool {
        (**self).is_scanning()
    }
    fn grab_frame(&mut self, frame: &mut Frame) -> Result<()> {
        (**self).grab_frame(frame)
    }
    fn get_health(&mut self) -> Result<DeviceHealth> {
        (**self).get_health()
    }
    fn get_device_info(&mut self) -> Result<DeviceInfo> {
        (**self).get_device_info()
    }
    fn get_sampling_rate(&mut self) -> Result<SampleRate> {
        (**self).get_sampling_rate()
    }
    fn set_sampling_rate(&mut self, rate: SampleRate) -> Result<SampleRate> {
        (**self).set_sampling_rate(rate)
    }
    fn get_scan_frequency(&mut self) -> Result<f64> {
        (**self).get_scan_frequency()
    }
    fn step_scan_frequency(&mut self, step: FrequencyStep) -> Result<f64> {
        (**self).step_scan_frequency(step)
    }
    fn start_scan(&mut self) -> Result<()> {
        (**self).start_scan()
    }
    fn stop(&mut self) -> Result<()> {
        (**self).stop()
    }
    fn point_period_ns(&self) -> u64 {
        (**self).point_period_ns()
    }
    fn set_auto_reconnect(&mut self, enable: bool) {
        (**self).set_auto_reconnect(enable)
    }
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let product = usb.product.clone().unwrap_or_default();
            let manufacturer = usb.manufacturer.clone().unwrap_or_default();
            format!(
                "{} {} ({:04X}:{:04X})",
                manufacturer, product, usb.vid, usb.pid
            )
            .trim()
            .to_string()
        }
        SerialPortType::PciPort => "PCI".to_string(),
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        SerialPortType::Unknown => "Unknown".to_string(),
    }
}

/// Serial ports the OS reports, by name, with a short description.
pub fn available_ports() -> Result<BTreeMap<String, String>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .iter()
        .map(|p| (p.port_name.clone(), describe(&p.port_type)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe(&SerialPortType::PciPort), "PCI");
        assert_eq!(describe(&SerialPortType::BluetoothPort), "Bluetooth");
        assert_eq!(describe(&SerialPortType::Unknown), "Unknown");
    }
}
