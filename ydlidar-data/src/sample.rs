use crate::flags::InterferenceFlag;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Full turn in the device's q6 angle unit (1/64 degree).
pub const ANGLE_Q6_FULL_TURN: u16 = 360 * 64;

/// One range reading.
///
/// Angles are kept in the device's native fixed point format (1/64 degree,
/// in `[0, ANGLE_Q6_FULL_TURN)`). Distances are quarter millimetres (q2) for
/// every device type.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Sample {
    /// Set on the first sample of a revolution.
    pub sync: bool,
    /// Angle in 1/64 degree.
    pub angle_q6: u16,
    /// Distance in 1/4 mm. Zero means no return.
    pub distance: u32,
    /// Return strength, when the device reports intensities.
    pub quality: Option<u8>,
    /// Interference status of the returned signal.
    pub flag: InterferenceFlag,
    /// Capture time in nanoseconds since the UNIX epoch.
    pub stamp: u64,
    /// Scan frequency in 0.1 Hz reported with the revolution start, 0 otherwise.
    pub scan_frequency: u8,
}

impl Sample {
    /// Angle in degrees.
    pub fn angle_degrees(&self) -> f64 {
        f64::from(self.angle_q6) / 64.
    }

    /// Angle in radian.
    pub fn angle_radian(&self) -> f64 {
        self.angle_degrees().to_radians()
    }

    pub fn distance_mm(&self) -> f64 {
        f64::from(self.distance) / 4.
    }

    pub fn has_return(&self) -> bool {
        self.distance != 0
    }
}
