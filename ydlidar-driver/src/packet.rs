use crate::constants::{
    ANGLE_CHECK_BIT, PACKAGE_RING_START, PACKET_HEADER_SIZE, PACKET_HEADER_WORD,
    PACKET_SYNC_BYTE1, PACKET_SYNC_BYTE2,
};
use crate::error::{Result, YDLidarError};
use crate::numeric::{correct_angle, le_u16, to_angle_q6, wrap_q6};
use log::{trace, warn};
use std::collections::VecDeque;
use std::time::Duration;
use ydlidar_data::sample::ANGLE_Q6_FULL_TURN;
use ydlidar_data::{DriverConfig, InterferenceFlag, LidarType, Sample};

/// Settings of a [`PacketDecoder`].
#[derive(Clone, Debug, PartialEq)]
pub struct DecoderConfig {
    /// Sample words are 3 bytes (quality + distance) instead of 2.
    pub intensity: bool,
    /// ToF devices send plain millimetres in 2-byte sample words.
    pub lidar_type: LidarType,
    pub angle_correction: bool,
    /// Largest valid sample count of a package.
    pub max_samples: u8,
    /// Wire time of one byte, used to date the package.
    pub byte_time: Duration,
    /// Time between two samples.
    pub point_time: Duration,
}

impl DecoderConfig {
    pub fn from_driver_config(config: &DriverConfig, byte_time: Duration) -> DecoderConfig {
        DecoderConfig {
            intensity: config.intensities,
            lidar_type: config.lidar_type,
            angle_correction: config.angle_correction,
            max_samples: config.max_package_samples,
            byte_time,
            point_time: config.point_time(),
        }
    }

    /// Converts a 2-byte sample word to quarter millimetres.
    fn distance_q2(&self, word: u16) -> u32 {
        match self.lidar_type {
            LidarType::Triangle => u32::from(word),
            LidarType::Tof => u32::from(word) << 2,
        }
    }

    fn sample_size(&self) -> usize {
        if self.intensity {
            3
        } else {
            2
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig::from_driver_config(&DriverConfig::default(), Duration::ZERO)
    }
}

/// Running counters of a decoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Times bytes had to be skipped to find the next package header.
    pub resyncs: u64,
    pub checksum_errors: u64,
    /// Packages with an impossible sample count or a missing angle check bit.
    pub invalid_packages: u64,
    pub packages: u64,
}

/// One validated sample package.
#[derive(Clone, Debug, PartialEq)]
pub struct Package {
    pub package_type: u8,
    /// Raw angle fields, check bit included.
    pub first_angle: u16,
    pub last_angle: u16,
    pub checksum: u16,
    pub samples: Vec<Sample>,
}

impl Package {
    pub fn is_ring_start(&self) -> bool {
        is_beginning_of_cycle(self.package_type)
    }
}

pub(crate) fn is_beginning_of_cycle(package_type: u8) -> bool {
    package_type & PACKAGE_RING_START == PACKAGE_RING_START
}

fn is_packet_header(element0: u8, element1: u8) -> bool {
    element0 == PACKET_SYNC_BYTE1 && element1 == PACKET_SYNC_BYTE2
}

fn scan_index(idx: usize, sample_size: usize) -> usize {
    PACKET_HEADER_SIZE + idx * sample_size
}

fn n_scan_samples(packet: &[u8]) -> usize {
    packet[3] as usize
}

/// XOR of the header words and every sample word.
pub(crate) fn calc_checksum(packet: &[u8], intensity: bool) -> u16 {
    let sample_size = if intensity { 3 } else { 2 };
    let mut checksum: u16 = PACKET_HEADER_WORD;
    checksum ^= le_u16(packet[4], packet[5]);
    for i in 0..n_scan_samples(packet) {
        let idx = scan_index(i, sample_size);
        if intensity {
            checksum ^= u16::from(packet[idx]);
            checksum ^= le_u16(packet[idx + 1], packet[idx + 2]);
        } else {
            checksum ^= le_u16(packet[idx], packet[idx + 1]);
        }
    }
    checksum ^= le_u16(packet[2], packet[3]);
    checksum ^= le_u16(packet[6], packet[7]);
    checksum
}

pub(crate) fn err_if_checksum_mismatched(packet: &[u8], intensity: bool) -> Result<()> {
    let calculated = calc_checksum(packet, intensity);
    let expected = le_u16(packet[8], packet[9]);
    match calculated != expected {
        true => Err(YDLidarError::ChecksumMismatch(expected, calculated)),
        false => Ok(()),
    }
}

/// Incremental decoder of the sample stream.
///
/// Bytes are pushed as they arrive and packages are pulled out once
/// complete. Corrupted packages are dropped and counted; the decoder then
/// resynchronizes on the next `AA 55` marker.
pub struct PacketDecoder {
    config: DecoderConfig,
    buffer: VecDeque<u8>,
    stats: DecoderStats,
    consecutive_errors: usize,
}

impl PacketDecoder {
    pub fn new(config: DecoderConfig) -> PacketDecoder {
        PacketDecoder {
            config,
            buffer: VecDeque::new(),
            stats: DecoderStats::default(),
            consecutive_errors: 0,
        }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Corrupted packages seen since the last valid one.
    pub fn consecutive_errors(&self) -> usize {
        self.consecutive_errors
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend(data);
    }

    /// Drops buffered bytes, keeping the counters.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.consecutive_errors = 0;
    }

    /// Returns the next valid package, or `None` when more bytes are needed.
    /// `stamp` is the receive time (ns) of the last pushed byte.
    pub fn next_package(&mut self, stamp: u64) -> Option<Package> {
        loop {
            if !self.sync() {
                return None;
            }
            if self.buffer.len() < PACKET_HEADER_SIZE {
                return None;
            }

            let n = self.buffer[3];
            if n == 0 || n > self.config.max_samples {
                self.reject_invalid(format!("sample count {}", n));
                continue;
            }
            let first = le_u16(self.buffer[4], self.buffer[5]);
            let last = le_u16(self.buffer[6], self.buffer[7]);
            if first & ANGLE_CHECK_BIT == 0 || last & ANGLE_CHECK_BIT == 0 {
                self.reject_invalid(format!("angle check bit {:04X} {:04X}", first, last));
                continue;
            }

            let size = scan_index(n as usize, self.config.sample_size());
            if self.buffer.len() < size {
                return None;
            }
            let packet: Vec<u8> = self.buffer.range(..size).copied().collect();
            if let Err(e) = err_if_checksum_mismatched(&packet, self.config.intensity) {
                warn!("{}", e);
                self.stats.checksum_errors += 1;
                self.reject();
                continue;
            }

            self.buffer.drain(..size);
            self.stats.packages += 1;
            self.consecutive_errors = 0;
            return Some(self.build_package(&packet, stamp));
        }
    }

    /// Moves the buffer front to a package header. Returns false when no
    /// header is buffered yet.
    fn sync(&mut self) -> bool {
        let found = (0..self.buffer.len().saturating_sub(1))
            .find(|&i| is_packet_header(self.buffer[i], self.buffer[i + 1]));
        let skip = match found {
            Some(i) => i,
            // keep a trailing first sync byte, its partner may be on the way
            None => match self.buffer.back() {
                Some(&PACKET_SYNC_BYTE1) => self.buffer.len() - 1,
                _ => self.buffer.len(),
            },
        };
        if skip > 0 {
            trace!("Skipping {} bytes", skip);
            self.buffer.drain(..skip);
            self.stats.resyncs += 1;
        }
        found.is_some()
    }

    fn reject_invalid(&mut self, reason: String) {
        warn!("Dropping package: {}", reason);
        self.stats.invalid_packages += 1;
        self.reject();
    }

    /// Drops the sync marker of a bad package so that the next scan starts
    /// right after it.
    fn reject(&mut self) {
        self.buffer.drain(..2);
        self.stats.resyncs += 1;
        self.consecutive_errors += 1;
    }

    fn build_package(&self, packet: &[u8], stamp: u64) -> Package {
        let package_type = packet[2];
        let n = n_scan_samples(packet);
        let first_angle = le_u16(packet[4], packet[5]);
        let last_angle = le_u16(packet[6], packet[7]);
        let checksum = le_u16(packet[8], packet[9]);

        let first_q6 = f64::from(to_angle_q6(first_angle));
        let last_q6 = f64::from(to_angle_q6(last_angle));
        // forward distance, unwrapped across 0 degree
        let interval = if n > 1 {
            wrap_q6(last_q6 - first_q6) / ((n - 1) as f64)
        } else {
            0.
        };

        let ring_start = is_beginning_of_cycle(package_type);
        let sample_size = self.config.sample_size();
        let byte_time = self.config.byte_time.as_nanos() as u64;
        let point_time = self.config.point_time.as_nanos() as u64;
        let package_stamp = stamp.saturating_sub(byte_time * packet.len() as u64);

        let samples = (0..n)
            .map(|i| {
                let idx = scan_index(i, sample_size);
                let (quality, distance, flag) = if self.config.intensity {
                    let word = le_u16(packet[idx + 1], packet[idx + 2]);
                    (
                        Some(packet[idx]),
                        u32::from(word & 0xFFFC),
                        InterferenceFlag::from_bits(word as u8),
                    )
                } else {
                    let word = le_u16(packet[idx], packet[idx + 1]);
                    (None, self.config.distance_q2(word), InterferenceFlag::Nothing)
                };

                let mut angle = wrap_q6(first_q6 + interval * i as f64);
                if self.config.angle_correction {
                    angle = correct_angle(angle, f64::from(distance) / 4.);
                }

                let sync = ring_start && i == 0;
                Sample {
                    sync,
                    angle_q6: (angle as u16).min(ANGLE_Q6_FULL_TURN - 1),
                    distance,
                    quality,
                    flag,
                    stamp: package_stamp.saturating_sub(point_time * (n - 1 - i) as u64),
                    scan_frequency: if sync { package_type >> 1 } else { 0 },
                }
            })
            .collect();

        Package {
            package_type,
            first_angle,
            last_angle,
            checksum,
            samples,
        }
    }
}
