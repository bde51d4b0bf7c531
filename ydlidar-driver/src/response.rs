use crate::constants::{
    HEADER_SIZE, LIDAR_ANS_LENGTH_DEVHEALTH, LIDAR_ANS_LENGTH_DEVINFO, LIDAR_ANS_LENGTH_FREQUENCY,
    LIDAR_ANS_LENGTH_HEART_BEAT, LIDAR_ANS_LENGTH_OFFSET_ANGLE, LIDAR_ANS_LENGTH_SAMPLING_RATE,
    LIDAR_ANS_SYNC_BYTE1, LIDAR_ANS_SYNC_BYTE2,
};
use crate::error::{Result, YDLidarError};
use crate::numeric::to_string;
use ydlidar_data::{DeviceHealth, DeviceInfo, OffsetAngle, SamplingRate, ScanFrequency};

/// Envelope of every reply to a command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Payload size, low 30 bits of the size field.
    pub size: u32,
    /// Top two bits of the size field. 1 means the answer repeats (scan stream).
    pub sub_type: u8,
    pub type_code: u8,
}

impl ResponseHeader {
    pub(crate) fn parse(header: &[u8]) -> Result<ResponseHeader> {
        if header.len() != HEADER_SIZE {
            return Err(YDLidarError::InvalidHeaderLength(header.len()));
        }
        if header[0..2] != [LIDAR_ANS_SYNC_BYTE1, LIDAR_ANS_SYNC_BYTE2] {
            return Err(YDLidarError::InvalidMagicNumber(to_string(&header[0..2])));
        }
        let field = u32::from_le_bytes([header[2], header[3], header[4], header[5]]);
        Ok(ResponseHeader {
            size: field & 0x3FFF_FFFF,
            sub_type: (field >> 30) as u8,
            type_code: header[6],
        })
    }

    /// Checks the answer type and that the payload holds at least `min_size` bytes.
    pub(crate) fn expect(&self, type_code: u8, min_size: Option<usize>) -> Result<()> {
        if self.type_code != type_code {
            return Err(YDLidarError::InvalidTypeCode(
                type_code.into(),
                self.type_code.into(),
            ));
        }
        if let Some(len) = min_size {
            if (self.size as usize) < len {
                return Err(YDLidarError::InvalidResponseLength(len, self.size as usize));
            }
        }
        Ok(())
    }
}

fn body<const N: usize>(data: &[u8]) -> Result<[u8; N]> {
    data.get(..N)
        .and_then(|b| b.try_into().ok())
        .ok_or(YDLidarError::InvalidResponseLength(N, data.len()))
}

pub(crate) fn parse_device_info(data: &[u8]) -> Result<DeviceInfo> {
    let info = body::<LIDAR_ANS_LENGTH_DEVINFO>(data)?;
    let mut serial_number = [0u8; 16];
    serial_number.copy_from_slice(&info[4..20]);
    Ok(DeviceInfo {
        model_number: info[0],
        firmware_major_version: info[2],
        firmware_minor_version: info[1],
        hardware_version: info[3],
        serial_number,
    })
}

pub(crate) fn parse_device_health(data: &[u8]) -> Result<DeviceHealth> {
    let health = body::<LIDAR_ANS_LENGTH_DEVHEALTH>(data)?;
    Ok(DeviceHealth {
        status: health[0],
        error_code: u16::from_le_bytes([health[1], health[2]]),
    })
}

pub(crate) fn parse_scan_frequency(data: &[u8]) -> Result<ScanFrequency> {
    let frequency = body::<LIDAR_ANS_LENGTH_FREQUENCY>(data)?;
    Ok(ScanFrequency {
        frequency: u32::from_le_bytes(frequency),
    })
}

pub(crate) fn parse_sampling_rate(data: &[u8]) -> Result<SamplingRate> {
    let rate = body::<LIDAR_ANS_LENGTH_SAMPLING_RATE>(data)?;
    Ok(SamplingRate { rate: rate[0] })
}

pub(crate) fn parse_offset_angle(data: &[u8]) -> Result<OffsetAngle> {
    let angle = body::<LIDAR_ANS_LENGTH_OFFSET_ANGLE>(data)?;
    Ok(OffsetAngle {
        angle: i32::from_le_bytes(angle),
    })
}

pub(crate) fn parse_heart_beat(data: &[u8]) -> Result<bool> {
    let enable = body::<LIDAR_ANS_LENGTH_HEART_BEAT>(data)?;
    Ok(enable[0] != 0)
}
