#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Ranging principle of the device. Triangulation devices need a distance
/// dependent angle correction; ToF devices report plain millimetres when
/// the sample word has no intensity flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LidarType {
    #[default]
    Triangle,
    Tof,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum YdlidarModel {
    X2,
    X4,
    S2,
    S4,
    S4B,
    G4,
    G4Pro,
    G6,
    TG15,
    TG30,
    TG50,
    TMiniPro,
}

impl YdlidarModel {
    /// Maps the model byte of a device info reply.
    /// Single channel models (X2, S2) never answer the query.
    pub fn from_model_number(number: u8) -> Option<YdlidarModel> {
        match number {
            4 => Some(YdlidarModel::S4),
            5 => Some(YdlidarModel::G4),
            6 => Some(YdlidarModel::X4),
            7 => Some(YdlidarModel::G4Pro),
            11 => Some(YdlidarModel::S4B),
            12 => Some(YdlidarModel::S2),
            13 => Some(YdlidarModel::G6),
            100 => Some(YdlidarModel::TG15),
            101 => Some(YdlidarModel::TG30),
            102 => Some(YdlidarModel::TG50),
            150 => Some(YdlidarModel::TMiniPro),
            _ => None,
        }
    }

    pub fn lidar_type(self) -> LidarType {
        match self {
            YdlidarModel::TG15
            | YdlidarModel::TG30
            | YdlidarModel::TG50
            | YdlidarModel::TMiniPro => LidarType::Tof,
            _ => LidarType::Triangle,
        }
    }

    /// Motor is powered through the DTR line of the serial adapter.
    pub fn supports_motor_dtr(self) -> bool {
        matches!(
            self,
            YdlidarModel::X4 | YdlidarModel::S4 | YdlidarModel::S4B
        )
    }

    /// The device only transmits; it does not answer commands.
    pub fn single_channel(self) -> bool {
        matches!(self, YdlidarModel::X2 | YdlidarModel::S2)
    }

    /// Sample words carry an intensity byte.
    pub fn intensities(self) -> bool {
        matches!(
            self,
            YdlidarModel::S4B | YdlidarModel::G6 | YdlidarModel::TMiniPro
        )
    }
}

pub fn model_baud_rate(model: YdlidarModel) -> u32 {
    match model {
        YdlidarModel::X2 | YdlidarModel::S2 | YdlidarModel::S4 => 115_200,
        YdlidarModel::X4 => 128_000,
        YdlidarModel::S4B => 153_600,
        YdlidarModel::G4 | YdlidarModel::G4Pro | YdlidarModel::TMiniPro => 230_400,
        YdlidarModel::G6 | YdlidarModel::TG15 | YdlidarModel::TG30 | YdlidarModel::TG50 => {
            512_000
        }
    }
}
