pub(crate) const HEADER_SIZE: usize = 7;
pub(crate) const PACKET_HEADER_SIZE: usize = 10;

pub(crate) const LIDAR_CMD_SYNC_BYTE: u8 = 0xA5;
pub(crate) const LIDAR_CMDFLAG_HAS_PAYLOAD: u8 = 0x80;
pub(crate) const LIDAR_ANS_SYNC_BYTE1: u8 = 0xA5;
pub(crate) const LIDAR_ANS_SYNC_BYTE2: u8 = 0x5A;
pub(crate) const PACKET_SYNC_BYTE1: u8 = 0xAA;
pub(crate) const PACKET_SYNC_BYTE2: u8 = 0x55;
/// `AA 55` read as a little endian word, the seed of the package checksum.
pub(crate) const PACKET_HEADER_WORD: u16 = 0x55AA;

pub(crate) const LIDAR_CMD_FORCE_STOP: u8 = 0x00;
pub(crate) const LIDAR_CMD_STOP: u8 = 0x65;
pub(crate) const LIDAR_CMD_SCAN: u8 = 0x60;
pub(crate) const LIDAR_CMD_FORCE_SCAN: u8 = 0x61;
pub(crate) const LIDAR_CMD_RESET: u8 = 0x80;
pub(crate) const LIDAR_CMD_GET_DEVICE_INFO: u8 = 0x90;
pub(crate) const LIDAR_CMD_GET_DEVICE_HEALTH: u8 = 0x92;
pub(crate) const LIDAR_CMD_GET_OFFSET_ANGLE: u8 = 0x93;
pub(crate) const LIDAR_CMD_SET_AIMSPEED_ADDMIC: u8 = 0x09;
pub(crate) const LIDAR_CMD_SET_AIMSPEED_DISMIC: u8 = 0x0A;
pub(crate) const LIDAR_CMD_SET_AIMSPEED_ADD: u8 = 0x0B;
pub(crate) const LIDAR_CMD_SET_AIMSPEED_DIS: u8 = 0x0C;
pub(crate) const LIDAR_CMD_GET_AIMSPEED: u8 = 0x0D;
pub(crate) const LIDAR_CMD_SET_SAMPLING_RATE: u8 = 0xD0;
pub(crate) const LIDAR_CMD_GET_SAMPLING_RATE: u8 = 0xD1;
pub(crate) const LIDAR_CMD_SET_HEART_BEAT: u8 = 0xD9;

pub(crate) const LIDAR_ANS_TYPE_DEVINFO: u8 = 0x4;
pub(crate) const LIDAR_ANS_LENGTH_DEVINFO: usize = 20;
pub(crate) const LIDAR_ANS_TYPE_DEVHEALTH: u8 = 0x6;
pub(crate) const LIDAR_ANS_LENGTH_DEVHEALTH: usize = 3;
pub(crate) const LIDAR_ANS_TYPE_MEASUREMENT: u8 = 0x81;
pub(crate) const LIDAR_ANS_LENGTH_FREQUENCY: usize = 4;
pub(crate) const LIDAR_ANS_LENGTH_SAMPLING_RATE: usize = 1;
pub(crate) const LIDAR_ANS_LENGTH_OFFSET_ANGLE: usize = 4;
pub(crate) const LIDAR_ANS_LENGTH_HEART_BEAT: usize = 1;

/// Package type bit marking the start of a revolution.
pub(crate) const PACKAGE_RING_START: u8 = 0x01;
/// Angle fields carry a check bit that is always set.
pub(crate) const ANGLE_CHECK_BIT: u16 = 0x01;

/// Slice of a blocking read, so that the stop flag is observed often.
pub(crate) const READ_SLICE_MS: u64 = 10;
pub(crate) const READ_CHUNK_SIZE: usize = 512;
