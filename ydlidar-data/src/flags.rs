#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Interference flag carried in the low two bits of an intensity sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InterferenceFlag {
    /// The signal has the interference of specular reflection
    SpecularReflection,
    /// The signal is interfered by ambient light
    AmbientLight,
    /// Interference was not observed
    #[default]
    Nothing,
}

impl InterferenceFlag {
    /// Decodes the two flag bits of a distance word.
    pub fn from_bits(value: u8) -> InterferenceFlag {
        match value & 0x03 {
            2 => InterferenceFlag::SpecularReflection,
            3 => InterferenceFlag::AmbientLight,
            _ => InterferenceFlag::Nothing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bits() {
        assert_eq!(InterferenceFlag::from_bits(2), InterferenceFlag::SpecularReflection);
        assert_eq!(InterferenceFlag::from_bits(3), InterferenceFlag::AmbientLight);
        assert_eq!(InterferenceFlag::from_bits(1), InterferenceFlag::Nothing);
        // upper bits belong to the distance
        assert_eq!(InterferenceFlag::from_bits(0xFE), InterferenceFlag::SpecularReflection);
    }
}
