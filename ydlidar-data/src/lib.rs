pub mod config;
pub mod device_info;
pub mod flags;
pub mod sample;
pub mod scan;
pub mod state;
pub mod ydlidar_models;

pub use config::DriverConfig;
pub use device_info::{DeviceHealth, DeviceInfo, OffsetAngle, SamplingRate, ScanFrequency};
pub use flags::InterferenceFlag;
pub use sample::Sample;
pub use scan::Scan;
pub use state::ConnectionState;
pub use ydlidar_models::{model_baud_rate, LidarType, YdlidarModel};
