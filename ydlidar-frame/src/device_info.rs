#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceInfo {
    pub model_number: u8,
    pub firmware_major_version: u8,
    pub firmware_minor_version: u8,
    pub hardware_version: u8,
    pub serial_number: [u8; 16],
}

impl DeviceInfo {
    /// Splits the 16-bit firmware word the device reports into major and minor.
    pub fn from_firmware_word(
        model_number: u8,
        firmware_version: u16,
        hardware_version: u8,
        serial_number: [u8; 16],
    ) -> DeviceInfo {
        DeviceInfo {
            model_number,
            firmware_major_version: (firmware_version >> 8) as u8,
            firmware_minor_version: (firmware_version & 0xff) as u8,
            hardware_version,
            serial_number,
        }
    }

    /// Serial number as printed on the device: every byte as uppercase hex, no padding.
    ///
    /// Distinct serials can render alike (`[0x1, 0x23]` and `[0x12, 0x3]` are
    /// both "123"). The unpadded form is kept because it keys existing
    /// calibration files.
    pub fn serial_string(&self) -> String {
        self.serial_number
            .iter()
            .map(|e| format!("{:X}", e))
            .collect::<Vec<_>>()
            .concat()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceHealth {
    /// 0 is good, 2 is an internal fault.
    pub status: u8,
    pub error_code: u16,
}

impl DeviceHealth {
    pub const STATUS_OK: u8 = 0;
    pub const STATUS_INTERNAL_FAULT: u8 = 2;

    pub fn is_ok(&self) -> bool {
        self.status == Self::STATUS_OK
    }

    pub fn is_internal_fault(&self) -> bool {
        self.status == Self::STATUS_INTERNAL_FAULT
    }
}
