use crate::sample::Sample;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Struct to hold one lap of lidar scan data.
///
/// Samples are in arrival order: the first one carries the sync flag.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Scan {
    pub samples: Vec<Sample>,
    /// Capture time of the first sample, ns since the UNIX epoch.
    pub stamp: u64,
    /// Scan frequency in 0.1 Hz as reported by the device, 0 if unknown.
    pub scan_frequency: u8,
}

impl Scan {
    pub fn from_samples(samples: Vec<Sample>) -> Scan {
        let (stamp, scan_frequency) = samples
            .first()
            .map(|s| (s.stamp, s.scan_frequency))
            .unwrap_or((0, 0));
        Scan {
            samples,
            stamp,
            scan_frequency,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Scan frequency in Hz, if the device reported one.
    pub fn frequency_hz(&self) -> Option<f64> {
        match self.scan_frequency {
            0 => None,
            f => Some(f64::from(f) / 10.),
        }
    }

    pub fn angles_radian(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(Sample::angle_radian)
    }

    pub fn distances(&self) -> impl Iterator<Item = u32> + '_ {
        self.samples.iter().map(|s| s.distance)
    }
}
