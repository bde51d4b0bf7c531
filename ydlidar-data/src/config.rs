use crate::ydlidar_models::{LidarType, YdlidarModel};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_HEART_BEAT: Duration = Duration::from_millis(1000);
pub const MAX_SCAN_NODES: usize = 3600;
pub const DEFAULT_TIMEOUT_COUNT: usize = 1;
pub const DEFAULT_PACKAGE_SAMPLE_MAX: u8 = 0x80;

/// Driver settings. Set them before `connect`; the acquisition thread takes a
/// copy when scanning starts.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DriverConfig {
    /// The device does not answer commands, only streams samples.
    pub single_channel: bool,
    pub lidar_type: LidarType,
    /// Applies the triangulation angle correction to every sample. Off by
    /// default; `for_model` turns it on for triangulation devices.
    pub angle_correction: bool,
    /// Sample words carry an intensity byte (3 bytes instead of 2).
    pub intensities: bool,
    /// Motor power is switched with the DTR line. Overridden by the model
    /// reported in the device info, when known.
    pub motor_dtr: bool,
    pub auto_reconnect: bool,
    pub reconnect_retries: u32,
    pub reconnect_backoff: Duration,
    /// Timeout of command replies.
    pub timeout: Duration,
    /// Upper bound for decoding one package in the acquisition loop.
    pub package_timeout: Duration,
    /// Consecutive package timeouts tolerated before the link is considered lost.
    pub timeout_count_limit: usize,
    /// Consecutive corrupted packages tolerated before the link is considered lost.
    pub max_decode_errors: usize,
    pub heart_beat: bool,
    pub heart_beat_interval: Duration,
    /// Capacity of one revolution.
    pub max_scan_nodes: usize,
    /// Largest sample count a package may announce.
    pub max_package_samples: u8,
    /// Samples per second, used to timestamp samples inside a package.
    pub sample_rate: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            single_channel: false,
            lidar_type: LidarType::Triangle,
            angle_correction: false,
            intensities: false,
            motor_dtr: false,
            auto_reconnect: true,
            reconnect_retries: 3,
            reconnect_backoff: Duration::from_millis(100),
            timeout: DEFAULT_TIMEOUT,
            package_timeout: DEFAULT_TIMEOUT / 2,
            timeout_count_limit: DEFAULT_TIMEOUT_COUNT,
            max_decode_errors: 64,
            heart_beat: false,
            heart_beat_interval: DEFAULT_HEART_BEAT,
            max_scan_nodes: MAX_SCAN_NODES,
            max_package_samples: DEFAULT_PACKAGE_SAMPLE_MAX,
            sample_rate: 5000,
        }
    }
}

impl DriverConfig {
    /// Settings matching a known model.
    pub fn for_model(model: YdlidarModel) -> DriverConfig {
        DriverConfig {
            single_channel: model.single_channel(),
            lidar_type: model.lidar_type(),
            angle_correction: model.lidar_type() == LidarType::Triangle,
            intensities: model.intensities(),
            motor_dtr: model.supports_motor_dtr(),
            ..Default::default()
        }
    }

    /// Time between two consecutive samples.
    pub fn point_time(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.sample_rate.max(1)))
    }
}
