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
    /// Serial number as printed on the device label.
    pub fn serial_string(&self) -> String {
        self.serial_number
            .iter()
            .map(|d| char::from(b'0' + (d % 10)))
            .collect()
    }
}

/// Status values of [`DeviceHealth::status`].
pub const HEALTH_STATUS_OK: u8 = 0x0;
pub const HEALTH_STATUS_WARNING: u8 = 0x1;
pub const HEALTH_STATUS_ERROR: u8 = 0x2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceHealth {
    pub status: u8,
    pub error_code: u16,
}

impl DeviceHealth {
    pub fn is_error(&self) -> bool {
        self.status == HEALTH_STATUS_ERROR
    }
}

/// Target scan frequency, in 0.01 Hz.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScanFrequency {
    pub frequency: u32,
}

impl ScanFrequency {
    pub fn hz(&self) -> f64 {
        f64::from(self.frequency) / 100.
    }
}

/// Sampling rate code. The meaning of each code depends on the model
/// (0 = 4K, 1 = 8K, 2 = 9K, ... for the G4 family).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SamplingRate {
    pub rate: u8,
}

/// Zero offset angle stored in the device, in 1/4 degree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OffsetAngle {
    pub angle: i32,
}

impl OffsetAngle {
    pub fn degrees(&self) -> f64 {
        f64::from(self.angle) / 4.
    }
}
